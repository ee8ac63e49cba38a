//! # Task Aggregation Driver
//!
//! Drives one task from the queue to a submitted certificate:
//!
//! ```text
//! claim (Processing) → operator-set config + roster → aggregator bound to
//! the block context → results until quorum → certificate → submit
//! → Completed
//! ```
//!
//! Any failure before a successful submission marks the task `Failed`.
//! Individual bad signatures are rejected and counted, never fatal.

use crate::domain::aggregator::{AggregatorParams, TaskResultAggregator};
use crate::domain::certificate::Certificate;
use crate::domain::errors::AggregationError;
use crate::domain::scheme::{AggregationScheme, TaskResult};
use crate::ports::{CertificateSubmitter, OperatorSetError, OperatorSetProvider, SubmitError};
use op_02_task_store::{CurveType, StoreError, TaskStore};
use op_03_block_context::BlockContextManager;
use operator_telemetry::{log_task_event, TASK_OUTCOMES};
use shared_types::{unix_now, OperatorSetId, Task, TaskId, TaskStatus};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Aggregation(#[from] AggregationError),

    #[error(transparent)]
    OperatorSet(#[from] OperatorSetError),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error("Operator set {operator_set_id} is configured for {actual}, driver handles {expected}")]
    CurveMismatch {
        operator_set_id: OperatorSetId,
        expected: CurveType,
        actual: CurveType,
    },

    #[error("Result stream for task {task_id} closed before quorum")]
    StreamClosed { task_id: TaskId },
}

pub struct TaskAggregationDriver<S: AggregationScheme> {
    store: Arc<dyn TaskStore>,
    contexts: Arc<BlockContextManager>,
    operators: Arc<dyn OperatorSetProvider<S::Key>>,
    submitter: Arc<dyn CertificateSubmitter<S::Material>>,
    _scheme: PhantomData<S>,
}

impl<S: AggregationScheme> TaskAggregationDriver<S> {
    pub fn new(
        store: Arc<dyn TaskStore>,
        contexts: Arc<BlockContextManager>,
        operators: Arc<dyn OperatorSetProvider<S::Key>>,
        submitter: Arc<dyn CertificateSubmitter<S::Material>>,
    ) -> Self {
        Self {
            store,
            contexts,
            operators,
            submitter,
            _scheme: PhantomData,
        }
    }

    /// Aggregate `results` for `task` and submit the certificate.
    ///
    /// On success the task is `Completed`; on any error it is `Failed`
    /// unless it was already terminal or removed by a reorg.
    pub async fn drive(
        &self,
        task: &Task,
        results: &mut mpsc::Receiver<TaskResult<S::Proof>>,
    ) -> Result<Certificate<S::Material>, DriverError> {
        match self.aggregate(task, results).await {
            Ok(certificate) => {
                self.store
                    .update_task_status(&task.avs_address, &task.task_id, TaskStatus::Completed)?;
                TASK_OUTCOMES.with_label_values(&["completed"]).inc();
                log_task_event!(
                    info,
                    "Task completed",
                    task,
                    signers = certificate.signers.len(),
                    signed_weight = certificate.signed_weight
                );
                Ok(certificate)
            }
            Err(e) => {
                log_task_event!(warn, "Task aggregation failed", task, error = %e);
                self.mark_failed(task);
                Err(e)
            }
        }
    }

    async fn aggregate(
        &self,
        task: &Task,
        results: &mut mpsc::Receiver<TaskResult<S::Proof>>,
    ) -> Result<Certificate<S::Material>, DriverError> {
        self.claim(task)?;

        let config = self
            .store
            .get_operator_set_config(&task.avs_address, task.operator_set_id)?;
        if config.curve != S::CURVE {
            return Err(DriverError::CurveMismatch {
                operator_set_id: task.operator_set_id,
                expected: S::CURVE,
                actual: config.curve,
            });
        }

        let snapshot = self
            .operators
            .operator_set(task.avs_address, task.operator_set_id)
            .await?;

        // Held until the aggregation ends so the sweep keeps the context
        // reachable by `cancel_block`.
        let block = self.contexts.get_context(task.source_block_number, task);
        let token = block.child_token();
        let aggregator = TaskResultAggregator::<S>::new(
            AggregatorParams::for_task(task, snapshot.reference_timestamp, config.threshold_bips),
            snapshot.operators,
        )?
        .with_cancellation(token.clone());

        let deadline = until_deadline(task.deadline_unix_seconds);
        tokio::pin!(deadline);

        while !aggregator.signing_threshold_met() {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    return Err(AggregationError::Cancelled {
                        task_id: task.task_id.clone(),
                    }
                    .into());
                }
                _ = &mut deadline => {
                    return Err(AggregationError::TaskExpired {
                        task_id: task.task_id.clone(),
                        deadline: task.deadline_unix_seconds.unwrap_or_default(),
                    }
                    .into());
                }
                next = results.recv() => {
                    let Some(result) = next else {
                        return Err(DriverError::StreamClosed {
                            task_id: task.task_id.clone(),
                        });
                    };
                    // Rejections are logged and counted by the aggregator.
                    if let Err(e) = aggregator.process_new_signature(&result) {
                        if e.is_terminal() {
                            return Err(e.into());
                        }
                    }
                }
            }
        }

        let certificate = aggregator.generate_final_certificate()?;
        self.submitter.submit(&certificate).await?;
        Ok(certificate)
    }

    /// Claim a `Pending` task. A `Processing` one was claimed by the queue
    /// that handed it over.
    fn claim(&self, task: &Task) -> Result<(), StoreError> {
        match self
            .store
            .update_task_status(&task.avs_address, &task.task_id, TaskStatus::Processing)
        {
            Ok(_)
            | Err(StoreError::InvalidStatusTransition {
                from: TaskStatus::Processing,
                ..
            }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Returns whether the task was moved to `Failed`.
    fn mark_failed(&self, task: &Task) -> bool {
        match self
            .store
            .update_task_status(&task.avs_address, &task.task_id, TaskStatus::Failed)
        {
            Ok(_) => {
                TASK_OUTCOMES.with_label_values(&["failed"]).inc();
                true
            }
            // Deleted by a reorg, or already terminal.
            Err(StoreError::NotFound { .. }) | Err(StoreError::InvalidStatusTransition { .. }) => {
                false
            }
            Err(e) => {
                warn!(task_id = %task.task_id, error = %e, "Failed to mark task failed");
                false
            }
        }
    }
}

/// Resolves at the deadline; never without one.
async fn until_deadline(deadline_unix_seconds: Option<u64>) {
    match deadline_unix_seconds {
        Some(deadline) => {
            let remaining = deadline.saturating_sub(unix_now());
            tokio::time::sleep(Duration::from_secs(remaining)).await;
        }
        None => std::future::pending::<()>().await,
    }
}
