//! # Bounded Task Queue
//!
//! Hand-off from the poller to whatever drives aggregation. The receiver
//! claims each task in the store (`Pending → Processing`) as it is dequeued,
//! so a task dropped between store and queue is recovered on restart.

use op_02_task_store::{StoreError, TaskStore};
use shared_types::{Task, TaskStatus};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::SendTimeoutError, error::TryRecvError, error::TrySendError};
use tracing::debug;

#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("Task queue full")]
    Full(Box<Task>),

    #[error("Task queue closed")]
    Closed(Box<Task>),
}

impl EnqueueError {
    pub fn reason(&self) -> &'static str {
        match self {
            EnqueueError::Full(_) => "queue_full",
            EnqueueError::Closed(_) => "queue_closed",
        }
    }

    pub fn into_task(self) -> Task {
        match self {
            EnqueueError::Full(task) | EnqueueError::Closed(task) => *task,
        }
    }
}

/// Create a queue holding at most `capacity` tasks.
///
/// # Panics
///
/// If `capacity` is zero.
pub fn task_queue(capacity: usize, store: Arc<dyn TaskStore>) -> (TaskSender, TaskReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (TaskSender { tx, capacity }, TaskReceiver { rx, store })
}

#[derive(Clone, Debug)]
pub struct TaskSender {
    tx: mpsc::Sender<Task>,
    capacity: usize,
}

impl TaskSender {
    /// Enqueue without waiting.
    pub fn try_send(&self, task: Task) -> Result<(), EnqueueError> {
        self.tx.try_send(task).map_err(|e| match e {
            TrySendError::Full(task) => EnqueueError::Full(Box::new(task)),
            TrySendError::Closed(task) => EnqueueError::Closed(Box::new(task)),
        })
    }

    /// Enqueue, waiting at most `timeout` for a free slot.
    pub async fn send_timeout(&self, task: Task, timeout: Duration) -> Result<(), EnqueueError> {
        self.tx
            .send_timeout(task, timeout)
            .await
            .map_err(|e| match e {
                SendTimeoutError::Timeout(task) => EnqueueError::Full(Box::new(task)),
                SendTimeoutError::Closed(task) => EnqueueError::Closed(Box::new(task)),
            })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.tx.capacity()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

pub struct TaskReceiver {
    rx: mpsc::Receiver<Task>,
    store: Arc<dyn TaskStore>,
}

impl TaskReceiver {
    /// Wait for the next claimable task.
    ///
    /// Returns `Ok(None)` once every sender is gone and the queue is drained.
    pub async fn next_task(&mut self) -> Result<Option<Task>, StoreError> {
        while let Some(task) = self.rx.recv().await {
            if let Some(claimed) = self.claim(task)? {
                return Ok(Some(claimed));
            }
        }
        Ok(None)
    }

    /// Non-blocking variant of [`next_task`](Self::next_task).
    pub fn try_next_task(&mut self) -> Result<Option<Task>, StoreError> {
        loop {
            match self.rx.try_recv() {
                Ok(task) => {
                    if let Some(claimed) = self.claim(task)? {
                        return Ok(Some(claimed));
                    }
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return Ok(None),
            }
        }
    }

    /// Move the task `Pending → Processing`. `None` when another consumer
    /// claimed it first, or it finished or vanished while queued.
    fn claim(&self, task: Task) -> Result<Option<Task>, StoreError> {
        match self.store.update_task_status(
            &task.avs_address,
            &task.task_id,
            TaskStatus::Processing,
        ) {
            Ok(claimed) => Ok(Some(claimed)),
            Err(StoreError::InvalidStatusTransition { from, .. }) => {
                debug!(task_id = %task.task_id, status = %from, "Skipping task claimed elsewhere or finished");
                Ok(None)
            }
            Err(StoreError::NotFound { .. }) => {
                debug!(task_id = %task.task_id, "Skipping deleted task");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Stop accepting new tasks; queued ones can still be drained.
    pub fn close(&mut self) {
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_task;
    use op_02_task_store::InMemoryTaskStore;

    fn setup(capacity: usize) -> (Arc<InMemoryTaskStore>, TaskSender, TaskReceiver) {
        let store = Arc::new(InMemoryTaskStore::new());
        let (tx, rx) = task_queue(capacity, store.clone());
        (store, tx, rx)
    }

    #[tokio::test]
    async fn test_dequeue_claims_task() {
        let (store, tx, mut rx) = setup(4);
        let task = sample_task("0x01", None);
        store.save_pending_task(&task).unwrap();
        tx.try_send(task.clone()).unwrap();

        let claimed = rx.next_task().await.unwrap().unwrap();
        assert_eq!(claimed.status, TaskStatus::Processing);
        assert_eq!(
            store.get_task(&task.avs_address, &task.task_id).unwrap().status,
            TaskStatus::Processing
        );
    }

    #[tokio::test]
    async fn test_terminal_tasks_are_skipped() {
        let (store, tx, mut rx) = setup(4);
        let done = sample_task("0x01", None);
        let live = sample_task("0x02", None);
        for t in [&done, &live] {
            store.save_pending_task(t).unwrap();
            tx.try_send(t.clone()).unwrap();
        }
        store
            .update_task_status(&done.avs_address, &done.task_id, TaskStatus::Failed)
            .unwrap();

        let next = rx.next_task().await.unwrap().unwrap();
        assert_eq!(next.task_id, live.task_id);
    }

    #[tokio::test]
    async fn test_task_queued_twice_is_claimed_once() {
        let (store, tx, mut rx) = setup(4);
        let task = sample_task("0x01", None);
        store.save_pending_task(&task).unwrap();
        tx.try_send(task.clone()).unwrap();
        tx.try_send(task).unwrap();

        assert!(rx.try_next_task().unwrap().is_some());
        assert!(rx.try_next_task().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_processing_task_is_not_handed_out() {
        let (store, tx, mut rx) = setup(4);
        let task = sample_task("0x01", None);
        store.save_pending_task(&task).unwrap();
        store
            .update_task_status(&task.avs_address, &task.task_id, TaskStatus::Processing)
            .unwrap();
        tx.try_send(task).unwrap();
        assert!(rx.try_next_task().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_full_queue_returns_task() {
        let (_store, tx, _rx) = setup(1);
        tx.try_send(sample_task("0x01", None)).unwrap();
        let err = tx.try_send(sample_task("0x02", None)).unwrap_err();
        assert_eq!(err.reason(), "queue_full");
        assert_eq!(err.into_task().task_id.as_str(), "0x02");
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_timeout_gives_up() {
        let (_store, tx, _rx) = setup(1);
        tx.try_send(sample_task("0x01", None)).unwrap();
        let err = tx
            .send_timeout(sample_task("0x02", None), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, EnqueueError::Full(_)));
    }

    #[tokio::test]
    async fn test_closed_when_senders_dropped() {
        let (_store, tx, mut rx) = setup(1);
        drop(tx);
        assert_eq!(rx.next_task().await.unwrap(), None);
    }
}
