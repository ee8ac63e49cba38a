//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Chain**: `ChainId`, `BlockInfo`, `RawLog`
//! - **Tasks**: `TaskId`, `Task`, `TaskStatus`, `OperatorSetId`

use crate::errors::{ParseError, TransitionError};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

pub use alloy_primitives::{Address, B256};

// =============================================================================
// CLUSTER A: THE CHAIN
// =============================================================================

/// A 32-byte block / transaction / event hash.
pub type Hash = B256;

/// Numeric chain identifier (EIP-155 style).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChainId(pub u64);

impl ChainId {
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ChainId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Lightweight block record kept only for reorg bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub number: u64,
    pub hash: Hash,
    pub parent_hash: Hash,
    /// Unix seconds.
    pub timestamp: u64,
    pub chain_id: ChainId,
}

impl BlockInfo {
    /// True when `self` directly extends `parent`.
    pub fn extends(&self, parent: &BlockInfo) -> bool {
        self.number == parent.number + 1 && self.parent_hash == parent.hash
    }
}

/// An event log exactly as returned by the chain node.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLog {
    /// Emitting contract.
    pub address: Address,
    /// Topic 0 is the event selector for non-anonymous events.
    pub topics: Vec<Hash>,
    #[serde_as(as = "Bytes")]
    pub data: Vec<u8>,
    pub block_number: u64,
    pub block_hash: Hash,
    pub transaction_hash: Hash,
    pub log_index: u64,
}

// =============================================================================
// CLUSTER B: TASKS
// =============================================================================

/// Identifier of a weighted operator cohort within an AVS.
pub type OperatorSetId = u32;

/// Opaque task identifier, unique per AVS. Usually the `0x`-hex task hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Canonical id for a task announced by its 32-byte hash.
    pub fn from_hash(hash: &Hash) -> Self {
        Self(format!("0x{}", hex::encode(hash.as_slice())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Lifecycle state of a task.
///
/// ```text
/// Pending ──→ Processing ──→ Completed
///    │            ├──→ Pending (released after a restart)
///    └────────────┴──→ Failed
/// ```
///
/// `Pending → Processing` is the only way in, so a claim succeeds once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Completed and Failed are never left again.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Tasks in these states are picked up by a recovery pass.
    pub fn is_recoverable(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Processing)
    }

    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Failed)
                | (Processing, Pending)
                | (Processing, Completed)
                | (Processing, Failed)
        )
    }

    /// Validate a transition, returning the new state on success.
    pub fn transition(self, next: TaskStatus) -> Result<TaskStatus, TransitionError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(TransitionError { from: self, to: next })
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(ParseError::UnknownStatus(other.to_string())),
        }
    }
}

/// A unit of work emitted by a chain event.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    /// Owning AVS.
    pub avs_address: Address,
    pub chain_id: ChainId,
    /// Cohort that must attest to the result.
    pub operator_set_id: OperatorSetId,
    pub source_block_number: u64,
    pub block_hash: Hash,
    /// Transaction that emitted the creating event.
    pub transaction_hash: Hash,
    #[serde_as(as = "Bytes")]
    pub payload: Vec<u8>,
    /// `None` means the task never expires.
    pub deadline_unix_seconds: Option<u64>,
    pub status: TaskStatus,
    /// Wall clock at discovery, unix seconds.
    pub created_at_unix_seconds: u64,
}

impl Task {
    /// True once `now` is at or past the deadline.
    pub fn is_expired_at(&self, now_unix_seconds: u64) -> bool {
        self.deadline_unix_seconds
            .is_some_and(|deadline| now_unix_seconds >= deadline)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(unix_now())
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }
}

/// Current wall clock in unix seconds. Clamps to zero before the epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
