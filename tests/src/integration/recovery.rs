//! # Restart Recovery
//!
//! Tasks persisted before a shutdown are re-offered after reopening the
//! durable store; expired ones are failed instead.

#[cfg(test)]
mod tests {
    use super::super::support::{Pipeline, CHAIN};
    use op_02_task_store::{RocksDbConfig, RocksDbTaskStore, TaskStore};
    use op_04_chain_poller::test_utils::{sample_task, MockChainClient, TEST_AVS};
    use op_04_chain_poller::TickOutcome;
    use shared_types::{TaskId, TaskStatus};
    use std::path::Path;
    use std::sync::Arc;

    fn open(path: &Path) -> Arc<dyn TaskStore> {
        Arc::new(RocksDbTaskStore::open(RocksDbConfig::for_testing(path)).unwrap())
    }

    #[tokio::test]
    async fn test_restart_resumes_pending_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockChainClient::new(CHAIN, 20));

        let (first, second) = {
            let p = Pipeline::with(client.clone(), open(dir.path()), 16);
            let first = p.emit_task(20, 0x31, 0, 0);
            let second = p.emit_task(20, 0x32, 0, 0);
            p.poller.poll_once().await.unwrap();
            assert_eq!(p.poller.last_observed_block(), Some(20));

            p.store.save_pending_task(&sample_task("0xexpired", Some(1))).unwrap();
            p.store.close().unwrap();
            (first, second)
        };

        let mut p = Pipeline::with(client, open(dir.path()), 16);
        let report = p.poller.recover().await.unwrap();
        assert_eq!(report.enqueued, 2);
        assert_eq!(report.expired, 1);
        assert_eq!(report.deferred, 0);
        assert_eq!(p.poller.last_observed_block(), Some(20));
        assert_eq!(p.status(&TaskId::new("0xexpired")), TaskStatus::Failed);

        // Checkpoint already covers the head.
        assert_eq!(p.poller.poll_once().await.unwrap(), TickOutcome::Idle);

        for _ in 0..2 {
            let task = p.queue.try_next_task().unwrap().unwrap();
            let mut results = p.results(&task, b"42", &[&p.a, &p.b]);
            p.driver.drive(&task, &mut results).await.unwrap();
        }
        assert!(p.queue.try_next_task().unwrap().is_none());
        assert_eq!(p.status(&first), TaskStatus::Completed);
        assert_eq!(p.status(&second), TaskStatus::Completed);
        assert_eq!(p.submitter.count(), 2);

        p.store.close().unwrap();
    }

    #[tokio::test]
    async fn test_completed_tasks_are_not_recovered() {
        let dir = tempfile::tempdir().unwrap();
        let client = Arc::new(MockChainClient::new(CHAIN, 5));

        let done = {
            let mut p = Pipeline::with(client.clone(), open(dir.path()), 16);
            let done = p.emit_task(5, 0x41, 0, 0);
            p.poller.poll_once().await.unwrap();
            let task = p.queue.next_task().await.unwrap().unwrap();
            let mut results = p.results(&task, b"42", &[&p.a, &p.b]);
            p.driver.drive(&task, &mut results).await.unwrap();
            p.store.close().unwrap();
            done
        };

        let mut p = Pipeline::with(client, open(dir.path()), 16);
        let report = p.poller.recover().await.unwrap();
        assert_eq!(report.enqueued + report.expired + report.deferred, 0);
        assert!(p.queue.try_next_task().unwrap().is_none());
        assert_eq!(p.status(&done), TaskStatus::Completed);
        assert_eq!(
            p.store.get_last_processed_block(&TEST_AVS, CHAIN).unwrap(),
            5
        );
    }
}
