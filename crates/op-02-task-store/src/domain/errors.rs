//! # Store Errors

use shared_types::{TaskStatus, TransitionError};
use thiserror::Error;

/// Errors returned by every [`TaskStore`](crate::TaskStore) backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Key is absent (task, block, checkpoint or operator-set config).
    #[error("Not found: {what}")]
    NotFound { what: String },

    /// Status change not permitted by the task lifecycle.
    #[error("Invalid status transition for task {task_id}: {from} -> {to}")]
    InvalidStatusTransition {
        task_id: String,
        from: TaskStatus,
        to: TaskStatus,
    },

    /// Stored bytes could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Underlying database failure.
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Store was closed; no further operations are accepted.
    #[error("Store is closed")]
    Closed,
}

impl StoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        StoreError::NotFound { what: what.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub(crate) fn transition(task_id: &str, err: TransitionError) -> Self {
        StoreError::InvalidStatusTransition {
            task_id: task_id.to_string(),
            from: err.from,
            to: err.to,
        }
    }
}
