//! # Outbound Ports
//!
//! The poller's only view of a chain node. Wire-level RPC lives outside this
//! crate; tests use `MockChainClient`.

pub use crate::domain::errors::ChainClientError;
use alloy_primitives::Address;
use async_trait::async_trait;
use shared_types::{BlockInfo, RawLog};

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current head of the canonical chain.
    async fn latest_block_number(&self) -> Result<u64, ChainClientError>;

    /// Canonical block at `number`.
    async fn block_by_number(&self, number: u64) -> Result<BlockInfo, ChainClientError>;

    /// Logs emitted by `address` in the inclusive block range, in chain order.
    async fn get_logs(
        &self,
        address: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, ChainClientError>;
}
