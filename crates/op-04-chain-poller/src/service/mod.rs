//! # Chain Poller Service
//!
//! One long-lived task per `(AVS, chain)`:
//!
//! ```text
//! recover() ──→ loop { tick ──→ head ──→ for n in last+1..=head:
//!                        block(n) ──→ reorg check ──→ logs (fan-out)
//!                        ──→ decode ──→ save Pending ──→ enqueue
//!                        ──→ save BlockInfo ──→ checkpoint = n }
//! ```
//!
//! A block is committed (stored and checkpointed) only after all of its logs
//! were handled, so a crash mid-block replays the block. Task creation is
//! idempotent per task id, which makes the replay harmless.

mod recovery;
mod reorg;

pub use recovery::RecoveryReport;

use crate::domain::config::PollerConfig;
use crate::domain::errors::PollerError;
use crate::domain::task_event::task_from_event;
use crate::ports::ChainClient;
use crate::queue::TaskSender;
use futures::future::join_all;
use op_01_log_decoder::LogDecoder;
use op_02_task_store::TaskStore;
use op_03_block_context::BlockContextManager;
use operator_telemetry::{
    log_block_event, log_task_event, HistogramTimer, BLOCKS_PROCESSED, LAST_PROCESSED_BLOCK,
    LOG_DECODE_FAILURES, POLL_ERRORS, POLL_TICK_DURATION, TASKS_DISCOVERED, TASKS_DROPPED,
};
use parking_lot::RwLock;
use shared_types::{unix_now, BlockInfo, RawLog};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a single tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Head has not moved past the last observed block.
    Idle,
    /// Blocks `from..=to` were committed.
    Processed { from: u64, to: u64, tasks: usize },
    /// A reorg rolled the checkpoint back to `ancestor`.
    Reorged { ancestor: u64, abandoned: u64 },
}

enum BlockOutcome {
    Committed { tasks: usize },
    Reorged { ancestor: u64, abandoned: u64 },
}

pub struct ChainPoller {
    config: PollerConfig,
    client: Arc<dyn ChainClient>,
    store: Arc<dyn TaskStore>,
    decoder: LogDecoder,
    contexts: Arc<BlockContextManager>,
    sender: TaskSender,
    /// Highest block fully processed this run; `None` before the first one.
    last_observed: Arc<RwLock<Option<u64>>>,
    /// Set by the first recovery pass or tick. Only a pass before either
    /// releases orphaned `Processing` tasks.
    recovered: AtomicBool,
    chain_label: String,
}

impl ChainPoller {
    pub fn new(
        config: PollerConfig,
        client: Arc<dyn ChainClient>,
        store: Arc<dyn TaskStore>,
        decoder: LogDecoder,
        contexts: Arc<BlockContextManager>,
        sender: TaskSender,
    ) -> Result<Self, PollerError> {
        config.validate()?;
        for address in &config.watched_contracts {
            if !decoder.knows_contract(address) {
                warn!(contract = %address, "Watched contract has no registered ABI");
            }
        }
        let chain_label = config.chain_id.to_string();
        Ok(Self {
            config,
            client,
            store,
            decoder,
            contexts,
            sender,
            last_observed: Arc::new(RwLock::new(None)),
            recovered: AtomicBool::new(false),
            chain_label,
        })
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    pub fn last_observed_block(&self) -> Option<u64> {
        *self.last_observed.read()
    }

    /// Run until `cancel` fires or a fatal error occurs. Recovery completes
    /// before the first tick.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), PollerError> {
        let report = self.recover().await?;
        info!(
            chain_id = %self.config.chain_id,
            avs = %self.config.avs_address,
            enqueued = report.enqueued,
            expired = report.expired,
            deferred = report.deferred,
            resume_from = ?self.last_observed_block(),
            "Chain poller started"
        );

        let mut ticker = tokio::time::interval(self.config.polling_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(chain_id = %self.config.chain_id, "Chain poller stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        POLL_ERRORS
                            .with_label_values(&[self.chain_label.as_str(), e.kind()])
                            .inc();
                        if e.is_fatal() {
                            error!(chain_id = %self.config.chain_id, error = %e, "Chain poller failed");
                            return Err(e);
                        }
                        warn!(chain_id = %self.config.chain_id, error = %e, "Poll tick failed, retrying next interval");
                    }
                }
            }
        }
    }

    /// Spawn [`run`](Self::run) on the tokio runtime.
    pub fn spawn(
        self,
        cancel: CancellationToken,
    ) -> (ChainPollerHandle, JoinHandle<Result<(), PollerError>>) {
        let handle = ChainPollerHandle {
            last_observed: Arc::clone(&self.last_observed),
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(async move { self.run(cancel).await });
        (handle, task)
    }

    /// One poll tick. Errors leave the checkpoint at the last committed block.
    pub async fn poll_once(&self) -> Result<TickOutcome, PollerError> {
        let _timer = HistogramTimer::new(&POLL_TICK_DURATION);
        // Tasks may be claimed from here on; recovery must not release them.
        self.recovered.store(true, Ordering::Release);
        let head = self.client.latest_block_number().await?;

        let (from, to) = match self.last_observed_block() {
            None => (head, head),
            Some(last) if head <= last => return Ok(TickOutcome::Idle),
            Some(last) => (last + 1, head.min(last + self.config.max_blocks_per_tick)),
        };

        let mut tasks = 0;
        for number in from..=to {
            match self.process_block(number).await? {
                BlockOutcome::Committed { tasks: created } => tasks += created,
                BlockOutcome::Reorged {
                    ancestor,
                    abandoned,
                } => return Ok(TickOutcome::Reorged { ancestor, abandoned }),
            }
        }

        if to > from {
            debug!(chain_id = %self.config.chain_id, from, to, head, "Caught up");
        }
        Ok(TickOutcome::Processed { from, to, tasks })
    }

    async fn process_block(&self, number: u64) -> Result<BlockOutcome, PollerError> {
        let block = self.client.block_by_number(number).await?;

        if self.config.reorg_check_enabled {
            if let Some((ancestor, abandoned)) = self.check_reorg(&block).await? {
                return Ok(BlockOutcome::Reorged {
                    ancestor,
                    abandoned,
                });
            }
        }

        let logs = self.fetch_logs(number).await?;
        let mut tasks = 0;
        for log in &logs {
            if self.handle_log(log, &block).await? {
                tasks += 1;
            }
        }

        self.commit_block(&block)?;
        Ok(BlockOutcome::Committed { tasks })
    }

    /// Logs of every watched contract for one block. All requests run
    /// concurrently; any failure fails the whole block.
    async fn fetch_logs(&self, number: u64) -> Result<Vec<RawLog>, PollerError> {
        let requests = self
            .config
            .watched_contracts
            .iter()
            .map(|address| self.client.get_logs(*address, number, number));

        let mut logs = Vec::new();
        for result in join_all(requests).await {
            logs.extend(result?);
        }
        Ok(logs)
    }

    /// Returns true when a new task was created.
    async fn handle_log(&self, raw: &RawLog, block: &BlockInfo) -> Result<bool, PollerError> {
        let decoded = match self.decoder.decode(raw) {
            Ok(decoded) => decoded,
            Err(e) if e.is_uninteresting() => {
                LOG_DECODE_FAILURES
                    .with_label_values(&["uninteresting"])
                    .inc();
                debug!(
                    block_number = raw.block_number,
                    log_index = raw.log_index,
                    reason = %e,
                    "Skipping log"
                );
                return Ok(false);
            }
            Err(e) => {
                LOG_DECODE_FAILURES.with_label_values(&["unpack"]).inc();
                warn!(
                    chain_id = %self.config.chain_id,
                    block_number = raw.block_number,
                    log_index = raw.log_index,
                    error = %e,
                    "Failed to decode log"
                );
                return Ok(false);
            }
        };

        if decoded.event_name != self.config.task_created_event {
            return Ok(false);
        }

        let task = match task_from_event(&decoded, block, unix_now()) {
            Ok(task) => task,
            Err(e) => {
                LOG_DECODE_FAILURES.with_label_values(&["unpack"]).inc();
                warn!(
                    chain_id = %self.config.chain_id,
                    block_number = block.number,
                    error = %e,
                    "Malformed task-creation event"
                );
                return Ok(false);
            }
        };

        if task.avs_address != self.config.avs_address {
            log_task_event!(debug, "Ignoring task for another AVS", task);
            return Ok(false);
        }

        if !self.store.save_pending_task(&task)? {
            log_task_event!(debug, "Task already known", task);
            return Ok(false);
        }
        TASKS_DISCOVERED
            .with_label_values(&[self.chain_label.as_str()])
            .inc();

        self.contexts.get_context(block.number, &task);

        let announced = task.clone();
        match self
            .sender
            .send_timeout(task, self.config.enqueue_timeout)
            .await
        {
            Ok(()) => log_task_event!(info, "Task enqueued", announced),
            Err(e) => {
                TASKS_DROPPED
                    .with_label_values(&[self.chain_label.as_str(), e.reason()])
                    .inc();
                log_task_event!(
                    warn,
                    "Task not enqueued, left pending for recovery",
                    announced,
                    reason = e.reason()
                );
            }
        }
        Ok(true)
    }

    fn commit_block(&self, block: &BlockInfo) -> Result<(), PollerError> {
        let avs = &self.config.avs_address;
        let chain_id = self.config.chain_id;

        self.store.save_block(avs, block)?;
        if let Some(expired) = block.number.checked_sub(self.config.block_history_size) {
            self.store.delete_block(avs, chain_id, expired)?;
        }
        self.store
            .set_last_processed_block(avs, chain_id, block.number)?;
        *self.last_observed.write() = Some(block.number);

        BLOCKS_PROCESSED
            .with_label_values(&[self.chain_label.as_str()])
            .inc();
        LAST_PROCESSED_BLOCK
            .with_label_values(&[self.chain_label.as_str()])
            .set(block.number as f64);
        log_block_event!(debug, "Block committed", chain_id, block.number);
        Ok(())
    }
}

/// Observes and stops a spawned poller.
#[derive(Clone)]
pub struct ChainPollerHandle {
    last_observed: Arc<RwLock<Option<u64>>>,
    cancel: CancellationToken,
}

impl ChainPollerHandle {
    pub fn last_observed_block(&self) -> Option<u64> {
        *self.last_observed.read()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
