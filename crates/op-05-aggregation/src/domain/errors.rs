//! # Aggregation Errors

use alloy_primitives::Address;
use shared_types::TaskId;
use thiserror::Error;

/// Low-level signature failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignatureError {
    /// Bytes are not a valid signature or key encoding.
    #[error("Invalid signature format")]
    InvalidFormat,

    /// Signature does not verify against the key.
    #[error("Signature verification failed")]
    VerificationFailed,

    /// ECDSA signature with S in the upper half of the curve order (EIP-2).
    #[error("Malleable signature: S value too high")]
    MalleableSignature,

    #[error("Invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    #[error("Public key recovery failed")]
    RecoveryFailed,

    /// Recovered signer is not the operator that sent the result.
    #[error("Signer mismatch: expected {expected}, recovered {actual}")]
    SignerMismatch { expected: Address, actual: Address },

    /// ECDSA operator-identity signature missing or invalid.
    #[error("Authentication signature does not bind operator {operator}")]
    AuthenticationFailed { operator: Address },

    #[error("Cannot aggregate an empty set")]
    EmptyAggregation,

    /// blst rejected a point while aggregating.
    #[error("BLS aggregation failed")]
    AggregationFailed,
}

/// Errors produced by a task result aggregator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AggregationError {
    #[error("Operator {operator} is not in the operator set")]
    UnknownOperator { operator: Address },

    #[error("Operator {operator} already signed")]
    DuplicateSignature { operator: Address },

    #[error("Invalid signature from operator {operator}: {reason}")]
    InvalidSignature {
        operator: Address,
        reason: SignatureError,
    },

    #[error("Task {task_id} expired at {deadline}")]
    TaskExpired { task_id: TaskId, deadline: u64 },

    #[error(
        "Threshold not met: signed {signed_weight} of {total_weight}, need {threshold_bips} bips"
    )]
    ThresholdNotMet {
        signed_weight: u64,
        total_weight: u64,
        threshold_bips: u16,
    },

    /// Bound block context was cancelled (reorg or shutdown).
    #[error("Aggregation for task {task_id} cancelled")]
    Cancelled { task_id: TaskId },

    /// Result names a different task, AVS or operator set.
    #[error("Result does not belong to this task: {field} differs")]
    TaskMismatch { field: &'static str },

    #[error("Invalid aggregator configuration: {0}")]
    InvalidConfig(String),

    /// Combining accepted signatures into certificate material failed.
    #[error("Failed to build certificate: {0}")]
    Certificate(SignatureError),
}

impl AggregationError {
    /// Label for the `result` dimension of the signatures metric.
    pub fn metric_label(&self) -> &'static str {
        match self {
            AggregationError::UnknownOperator { .. } => "unknown_operator",
            AggregationError::DuplicateSignature { .. } => "duplicate",
            AggregationError::InvalidSignature { .. } => "invalid",
            AggregationError::TaskExpired { .. } => "expired",
            AggregationError::ThresholdNotMet { .. } => "threshold_not_met",
            AggregationError::Cancelled { .. } => "cancelled",
            AggregationError::TaskMismatch { .. } => "task_mismatch",
            AggregationError::InvalidConfig(_) => "invalid_config",
            AggregationError::Certificate(_) => "certificate",
        }
    }

    /// The aggregator can never reach a certificate after this error.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AggregationError::TaskExpired { .. }
                | AggregationError::Cancelled { .. }
                | AggregationError::InvalidConfig(_)
                | AggregationError::Certificate(_)
        )
    }
}
