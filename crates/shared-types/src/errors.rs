//! # Error Types
//!
//! Errors for the shared entities themselves (status machine, id parsing).

use crate::entities::TaskStatus;
use thiserror::Error;

/// A task status change that the lifecycle does not allow.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid task status transition: {from} -> {to}")]
pub struct TransitionError {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

/// Failure to parse a textual identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Status string is not one of the four lifecycle states.
    #[error("Unknown task status: {0}")]
    UnknownStatus(String),
}
