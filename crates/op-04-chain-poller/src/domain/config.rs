//! # Poller Configuration
//!
//! Deserializable with serde; everything except the chain, AVS and watch list
//! has a default. Durations are given in milliseconds.

use super::errors::PollerError;
use serde::{Deserialize, Serialize};
use shared_types::{Address, ChainId};
use std::time::Duration;

pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_REORG_DEPTH: u64 = 10;
pub const DEFAULT_BLOCK_HISTORY_SIZE: u64 = 100;
pub const DEFAULT_ENQUEUE_TIMEOUT: Duration = Duration::from_millis(100);
pub const DEFAULT_MAX_BLOCKS_PER_TICK: u64 = 50;
pub const DEFAULT_TASK_CREATED_EVENT: &str = "TaskCreated";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerConfig {
    pub chain_id: ChainId,
    /// AVS whose tasks this poller ingests.
    pub avs_address: Address,
    /// Contracts whose logs are fetched every block.
    pub watched_contracts: Vec<Address>,

    #[serde(with = "duration_millis", default = "default_polling_interval")]
    pub polling_interval: Duration,
    #[serde(default = "default_max_reorg_depth")]
    pub max_reorg_depth: u64,
    /// Blocks kept in the store behind the last processed one.
    #[serde(default = "default_block_history_size")]
    pub block_history_size: u64,
    #[serde(default = "default_true")]
    pub reorg_check_enabled: bool,
    #[serde(with = "duration_millis", default = "default_enqueue_timeout")]
    pub enqueue_timeout: Duration,
    /// Catch-up bound: most blocks processed in one tick.
    #[serde(default = "default_max_blocks_per_tick")]
    pub max_blocks_per_tick: u64,
    #[serde(default = "default_task_created_event")]
    pub task_created_event: String,
}

fn default_polling_interval() -> Duration {
    DEFAULT_POLLING_INTERVAL
}
fn default_max_reorg_depth() -> u64 {
    DEFAULT_MAX_REORG_DEPTH
}
fn default_block_history_size() -> u64 {
    DEFAULT_BLOCK_HISTORY_SIZE
}
fn default_true() -> bool {
    true
}
fn default_enqueue_timeout() -> Duration {
    DEFAULT_ENQUEUE_TIMEOUT
}
fn default_max_blocks_per_tick() -> u64 {
    DEFAULT_MAX_BLOCKS_PER_TICK
}
fn default_task_created_event() -> String {
    DEFAULT_TASK_CREATED_EVENT.to_string()
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

impl PollerConfig {
    pub fn new(chain_id: ChainId, avs_address: Address, watched_contracts: Vec<Address>) -> Self {
        Self {
            chain_id,
            avs_address,
            watched_contracts,
            polling_interval: DEFAULT_POLLING_INTERVAL,
            max_reorg_depth: DEFAULT_MAX_REORG_DEPTH,
            block_history_size: DEFAULT_BLOCK_HISTORY_SIZE,
            reorg_check_enabled: true,
            enqueue_timeout: DEFAULT_ENQUEUE_TIMEOUT,
            max_blocks_per_tick: DEFAULT_MAX_BLOCKS_PER_TICK,
            task_created_event: default_task_created_event(),
        }
    }

    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    pub fn with_max_reorg_depth(mut self, depth: u64) -> Self {
        self.max_reorg_depth = depth;
        self
    }

    pub fn with_block_history_size(mut self, size: u64) -> Self {
        self.block_history_size = size;
        self
    }

    pub fn with_reorg_check(mut self, enabled: bool) -> Self {
        self.reorg_check_enabled = enabled;
        self
    }

    pub fn with_max_blocks_per_tick(mut self, max: u64) -> Self {
        self.max_blocks_per_tick = max;
        self
    }

    pub fn validate(&self) -> Result<(), PollerError> {
        let invalid = |msg: &str| Err(PollerError::InvalidConfig(msg.to_string()));

        if self.polling_interval.is_zero() {
            return invalid("polling_interval must be non-zero");
        }
        if self.watched_contracts.is_empty() {
            return invalid("watched_contracts must not be empty");
        }
        if self.max_reorg_depth == 0 {
            return invalid("max_reorg_depth must be non-zero");
        }
        if self.block_history_size == 0 {
            return invalid("block_history_size must be non-zero");
        }
        // The ancestor search reads `max_reorg_depth + 1` stored blocks.
        if self.block_history_size <= self.max_reorg_depth {
            return invalid("block_history_size must exceed max_reorg_depth");
        }
        if self.max_blocks_per_tick == 0 {
            return invalid("max_blocks_per_tick must be non-zero");
        }
        Ok(())
    }
}
