//! # Poller Errors
//!
//! | Class | Variants | Reaction |
//! |-------|----------|----------|
//! | Transient | `Client` | retried next tick |
//! | Fatal | `Store`, `ReorgTooDeep`, `InvalidConfig` | poller stops |
//! | Per-item | decode and enqueue failures | logged, never surfaced |

use op_02_task_store::StoreError;
use shared_types::ChainId;
use thiserror::Error;

/// Failure talking to a chain node.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChainClientError {
    #[error("RPC request failed: {0}")]
    Rpc(String),

    #[error("Block {0} not available")]
    BlockNotFound(u64),

    #[error("Request timed out")]
    Timeout,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PollerError {
    #[error("Chain client error: {0}")]
    Client(#[from] ChainClientError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// No common ancestor within the configured depth.
    #[error("Reorg at block {block_number} on chain {chain_id} deeper than {max_depth} blocks")]
    ReorgTooDeep {
        chain_id: ChainId,
        block_number: u64,
        max_depth: u64,
    },

    #[error("Invalid poller configuration: {0}")]
    InvalidConfig(String),
}

impl PollerError {
    /// Fatal errors stop the poll loop; others are retried next tick.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PollerError::Client(_))
    }

    /// Short label for the `kind` metric dimension.
    pub fn kind(&self) -> &'static str {
        if self.is_fatal() {
            "fatal"
        } else {
            "transient"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatality_classes() {
        assert!(!PollerError::from(ChainClientError::Timeout).is_fatal());
        assert!(PollerError::from(StoreError::Closed).is_fatal());
        assert!(PollerError::ReorgTooDeep {
            chain_id: ChainId(1),
            block_number: 10,
            max_depth: 2
        }
        .is_fatal());
    }
}
