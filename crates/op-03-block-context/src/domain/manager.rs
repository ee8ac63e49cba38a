//! # Block Context Manager
//!
//! ```text
//! root token (process)
//!   └── manager token
//!         ├── block 93 ──→ task work
//!         ├── block 94
//!         └── block 95
//! ```
//!
//! Cancelling a block cancels everything derived from it. Cancelling the
//! manager (shutdown) or the root cancels every block.

use super::context::BlockContext;
use operator_telemetry::BLOCK_CONTEXTS_LIVE;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use shared_types::Task;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Configuration for the block context manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockContextConfig {
    /// How often finished contexts are reaped.
    #[serde(with = "duration_millis")]
    pub sweep_interval: Duration,
}

impl Default for BlockContextConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(30),
        }
    }
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

pub struct BlockContextManager {
    token: CancellationToken,
    contexts: RwLock<HashMap<u64, Arc<BlockContext>>>,
    config: BlockContextConfig,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl BlockContextManager {
    /// Create a manager whose contexts all derive from `parent`.
    pub fn new(parent: &CancellationToken, config: BlockContextConfig) -> Arc<Self> {
        Arc::new(Self {
            token: parent.child_token(),
            contexts: RwLock::new(HashMap::new()),
            config,
            sweeper: Mutex::new(None),
        })
    }

    /// Create a manager and start its background sweep.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(parent: &CancellationToken, config: BlockContextConfig) -> Arc<Self> {
        let manager = Self::new(parent, config);
        manager.spawn_sweeper();
        manager
    }

    fn spawn_sweeper(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let token = self.token.clone();
        let period = self.config.sweep_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // First tick fires immediately; nothing to reap yet.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(manager) = weak.upgrade() else { break };
                        let reaped = manager.sweep();
                        if reaped > 0 {
                            debug!(reaped, "Swept finished block contexts");
                        }
                    }
                }
            }
            debug!("Block context sweeper stopped");
        });

        *self.sweeper.lock() = Some(handle);
    }

    /// Context for `block_number`, created on first request.
    ///
    /// The deadline is taken from the task that creates the context; later
    /// callers for the same block share that instance. After shutdown the
    /// returned context is already cancelled and is not tracked.
    pub fn get_context(&self, block_number: u64, task: &Task) -> Arc<BlockContext> {
        if let Some(ctx) = self.contexts.read().get(&block_number) {
            return Arc::clone(ctx);
        }

        let mut contexts = self.contexts.write();
        if let Some(ctx) = contexts.get(&block_number) {
            return Arc::clone(ctx);
        }

        let ctx = Arc::new(BlockContext::new(
            block_number,
            self.token.child_token(),
            task.deadline_unix_seconds,
        ));
        if self.token.is_cancelled() {
            return ctx;
        }
        contexts.insert(block_number, Arc::clone(&ctx));
        BLOCK_CONTEXTS_LIVE.set(contexts.len() as f64);
        debug!(
            block_number,
            deadline = ?task.deadline_unix_seconds,
            "Block context created"
        );
        ctx
    }

    /// Cancel and forget a block's context. Unknown blocks are a no-op.
    pub fn cancel_block(&self, block_number: u64) {
        let removed = {
            let mut contexts = self.contexts.write();
            let removed = contexts.remove(&block_number);
            BLOCK_CONTEXTS_LIVE.set(contexts.len() as f64);
            removed
        };
        if let Some(ctx) = removed {
            ctx.cancel();
            debug!(block_number, "Block context cancelled");
        }
    }

    /// Drop contexts that are cancelled, or past their deadline with no
    /// holder left outside the map. Returns how many were removed.
    ///
    /// A block's context deadline comes from its first task, so an expired
    /// context may still scope later tasks of the same block. Those stay
    /// tracked until released so `cancel_block` still reaches them.
    pub fn sweep(&self) -> usize {
        let mut contexts = self.contexts.write();
        let before = contexts.len();
        contexts.retain(|_, ctx| {
            !(ctx.is_cancelled() || (ctx.is_expired() && Arc::strong_count(ctx) == 1))
        });
        BLOCK_CONTEXTS_LIVE.set(contexts.len() as f64);
        before - contexts.len()
    }

    /// Cancel every live context and stop the sweep.
    pub fn shutdown(&self) {
        self.token.cancel();
        let drained: Vec<_> = self.contexts.write().drain().collect();
        BLOCK_CONTEXTS_LIVE.set(0.0);
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
        info!(cancelled = drained.len(), "Block context manager shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Tracked block numbers, ascending.
    pub fn live_blocks(&self) -> Vec<u64> {
        let mut blocks: Vec<u64> = self.contexts.read().keys().copied().collect();
        blocks.sort_unstable();
        blocks
    }

    pub fn len(&self) -> usize {
        self.contexts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.read().is_empty()
    }
}

impl Drop for BlockContextManager {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.abort();
        }
    }
}
