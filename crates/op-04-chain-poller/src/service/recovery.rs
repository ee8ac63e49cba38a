//! # Startup Recovery
//!
//! Resume from the persisted checkpoint and re-offer `Pending` tasks.
//! Never blocks on the queue: what does not fit stays in the store for the
//! next pass.
//!
//! `Processing` tasks found by the first pass of a poller were orphaned by a
//! previous process and are released back to `Pending`. Later passes run
//! beside live workers and leave `Processing` tasks alone. A task re-offered
//! while still queued is handed out once, because dequeue claims it with
//! `Pending → Processing`.

use super::ChainPoller;
use crate::domain::errors::PollerError;
use crate::queue::EnqueueError;
use op_02_task_store::StoreError;
use operator_telemetry::{log_task_event, TASKS_RECOVERED};
use shared_types::{unix_now, Task, TaskStatus};
use std::sync::atomic::Ordering;
use tracing::{debug, info};

/// Result of one recovery pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Put back on the queue.
    pub enqueued: usize,
    /// Past deadline, marked `Failed`.
    pub expired: usize,
    /// Orphaned `Processing` tasks moved back to `Pending` (first pass only).
    pub released: usize,
    /// Queue full or closed; left in the store.
    pub deferred: usize,
}

impl ChainPoller {
    /// Recover persisted state. Safe to call again while the poller runs and
    /// workers hold claimed tasks.
    pub async fn recover(&self) -> Result<RecoveryReport, PollerError> {
        let avs = &self.config.avs_address;
        let chain_id = self.config.chain_id;

        match self.store.get_last_processed_block(avs, chain_id) {
            Ok(checkpoint) => {
                let mut last = self.last_observed.write();
                if last.is_none() {
                    *last = Some(checkpoint);
                    info!(%chain_id, checkpoint, "Resuming from checkpoint");
                }
            }
            Err(e) if e.is_not_found() => {
                debug!(%chain_id, "No checkpoint, starting at head");
            }
            Err(e) => return Err(e.into()),
        }

        let now = unix_now();
        let mut report = RecoveryReport::default();

        let startup = !self.recovered.swap(true, Ordering::AcqRel);

        for mut task in self.store.list_pending_tasks_for_avs(avs)? {
            if task.chain_id != chain_id {
                continue;
            }

            if task.status == TaskStatus::Processing {
                if !startup || !self.release(&task)? {
                    continue;
                }
                report.released += 1;
                task.status = TaskStatus::Pending;
            }

            if task.is_expired_at(now) {
                match self
                    .store
                    .update_task_status(avs, &task.task_id, TaskStatus::Failed)
                {
                    Ok(_) => {
                        report.expired += 1;
                        self.record_recovery("expired");
                        log_task_event!(info, "Expired task failed during recovery", task);
                    }
                    // Finished or removed concurrently.
                    Err(StoreError::InvalidStatusTransition { .. })
                    | Err(StoreError::NotFound { .. }) => {}
                    Err(e) => return Err(e.into()),
                }
                continue;
            }

            self.contexts.get_context(task.source_block_number, &task);
            match self.sender.try_send(task) {
                Ok(()) => {
                    report.enqueued += 1;
                    self.record_recovery("enqueued");
                }
                Err(EnqueueError::Full(task)) => {
                    report.deferred += 1;
                    self.record_recovery("deferred");
                    log_task_event!(debug, "Queue full, task left for next pass", task);
                }
                Err(EnqueueError::Closed(task)) => {
                    report.deferred += 1;
                    self.record_recovery("deferred");
                    log_task_event!(warn, "Queue closed during recovery", task);
                }
            }
        }

        Ok(report)
    }

    /// `Processing → Pending`. False when the task moved on meanwhile.
    fn release(&self, task: &Task) -> Result<bool, PollerError> {
        match self.store.update_task_status(
            &self.config.avs_address,
            &task.task_id,
            TaskStatus::Pending,
        ) {
            Ok(_) => {
                self.record_recovery("released");
                log_task_event!(info, "Released orphaned task", task);
                Ok(true)
            }
            Err(StoreError::InvalidStatusTransition { .. }) | Err(StoreError::NotFound { .. }) => {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn record_recovery(&self, outcome: &str) {
        TASKS_RECOVERED
            .with_label_values(&[self.chain_label.as_str(), outcome])
            .inc();
    }
}
