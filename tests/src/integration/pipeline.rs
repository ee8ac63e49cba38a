//! # Chain Event → Certificate
//!
//! A `TaskCreated` log travels through decoding, persistence, the bounded
//! queue and aggregation until a certificate is submitted and the task is
//! `Completed`.

#[cfg(test)]
mod tests {
    use super::super::support::{Pipeline, CHAIN};
    use op_02_task_store::{CurveType, InMemoryTaskStore, OperatorSetConfig, TaskStore};
    use op_04_chain_poller::test_utils::{MockChainClient, TEST_AVS};
    use op_04_chain_poller::{RecoveryReport, TickOutcome};
    use op_05_aggregation::test_utils::{
        snapshot, EcdsaTestOperator, RecordingSubmitter, REFERENCE_TIMESTAMP,
    };
    use op_05_aggregation::{
        verify_certificate, Bls, DriverError, Ecdsa, EcdsaMaterial, SigningContext,
        StaticOperatorSets, TaskAggregationDriver,
    };
    use shared_types::{TaskId, TaskStatus};
    use std::sync::Arc;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_task_event_produces_certificate() {
        let mut p = Pipeline::new(10);
        let task_id = p.emit_task(10, 0x01, 0, 0);

        assert_eq!(
            p.poller.poll_once().await.unwrap(),
            TickOutcome::Processed {
                from: 10,
                to: 10,
                tasks: 1
            }
        );
        assert_eq!(p.status(&task_id), TaskStatus::Pending);

        let task = p.queue.next_task().await.unwrap().unwrap();
        assert_eq!(task.task_id, task_id);
        assert_eq!(task.chain_id, CHAIN);
        assert_eq!(task.source_block_number, 10);
        assert_eq!(p.status(&task_id), TaskStatus::Processing);

        let mut results = p.results(&task, b"42", &[&p.a, &p.b]);
        let certificate = p.driver.drive(&task, &mut results).await.unwrap();

        assert_eq!(p.status(&task_id), TaskStatus::Completed);
        assert_eq!(certificate.task_id, task_id);
        assert_eq!(certificate.signed_weight, 10_000);
        assert!(certificate.is_signer(&p.a.address()));
        assert!(certificate.is_signer(&p.b.address()));
        assert!(verify_certificate::<Bls>(&certificate));
        assert_eq!(p.submitter.count(), 1);

        // Nothing left for a recovery pass.
        let report = p.poller.recover().await.unwrap();
        assert_eq!(report.enqueued + report.expired + report.deferred, 0);
    }

    #[tokio::test]
    async fn test_single_operator_below_threshold_fails_task() {
        let mut p = Pipeline::new(10);
        let task_id = p.emit_task(10, 0x02, 0, 0);
        p.poller.poll_once().await.unwrap();
        let task = p.queue.next_task().await.unwrap().unwrap();

        // A alone holds 6000 of 10000, short of 6667 bips.
        let mut results = p.results(&task, b"42", &[&p.a]);
        let err = p.driver.drive(&task, &mut results).await.unwrap_err();

        assert!(matches!(err, DriverError::StreamClosed { .. }));
        assert_eq!(p.status(&task_id), TaskStatus::Failed);
        assert_eq!(p.submitter.count(), 0);
    }

    #[tokio::test]
    async fn test_replayed_block_does_not_duplicate_completed_task() {
        let mut p = Pipeline::new(10);
        let task_id = p.emit_task(10, 0x03, 0, 0);
        p.poller.poll_once().await.unwrap();
        let task = p.queue.next_task().await.unwrap().unwrap();
        let mut results = p.results(&task, b"42", &[&p.a, &p.b]);
        p.driver.drive(&task, &mut results).await.unwrap();

        // A second process over the same chain and store sees block 10 again.
        let mut replay = Pipeline::with(p.client.clone(), p.store.clone(), 16);
        replay.store.set_last_processed_block(&TEST_AVS, CHAIN, 9).unwrap();
        replay.poller.recover().await.unwrap();
        replay.poller.poll_once().await.unwrap();

        assert!(replay.queue.try_next_task().unwrap().is_none());
        assert_eq!(replay.status(&task_id), TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_queue_overflow_is_picked_up_by_recovery() {
        let mut p = Pipeline::with(
            Arc::new(MockChainClient::new(CHAIN, 10)),
            Arc::new(InMemoryTaskStore::new()),
            1,
        );
        let first = p.emit_task(10, 0x11, 0, 0);
        let second = p.emit_task(10, 0x12, 0, 0);
        p.poller.poll_once().await.unwrap();

        let task = p.queue.try_next_task().unwrap().unwrap();
        assert_eq!(task.task_id, first);
        assert!(p.queue.try_next_task().unwrap().is_none());
        assert_eq!(p.status(&second), TaskStatus::Pending);

        // The first task is still claimed; only the dropped one comes back.
        let report = p.poller.recover().await.unwrap();
        assert_eq!(report.enqueued, 1);
        assert_eq!(report.released, 0);
        let next = p.queue.try_next_task().unwrap().unwrap();
        assert_eq!(next.task_id, second);
        assert!(p.queue.try_next_task().unwrap().is_none());

        let mut results = p.results(&task, b"42", &[&p.a, &p.b]);
        p.driver.drive(&task, &mut results).await.unwrap();
        let mut results = p.results(&next, b"42", &[&p.b, &p.a]);
        p.driver.drive(&next, &mut results).await.unwrap();
        assert_eq!(p.status(&first), TaskStatus::Completed);
        assert_eq!(p.status(&second), TaskStatus::Completed);
        assert_eq!(p.submitter.count(), 2);
    }

    #[tokio::test]
    async fn test_manual_recovery_alongside_live_work() {
        let mut p = Pipeline::new(10);
        let task_id = p.emit_task(10, 0x05, 0, 0);
        p.poller.poll_once().await.unwrap();

        // Still queued: offered again but handed out once.
        assert_eq!(p.poller.recover().await.unwrap().enqueued, 1);
        let task = p.queue.try_next_task().unwrap().unwrap();
        assert_eq!(task.task_id, task_id);
        assert!(p.queue.try_next_task().unwrap().is_none());

        // Being aggregated: left alone.
        let ctx = SigningContext::for_task(&task, REFERENCE_TIMESTAMP);
        let (tx, mut results) = mpsc::channel(4);
        tx.send(p.a.result(&ctx, b"42")).await.unwrap();
        let (outcome, report) = tokio::join!(p.driver.drive(&task, &mut results), async {
            tokio::task::yield_now().await;
            assert_eq!(p.status(&task_id), TaskStatus::Processing);
            let report = p.poller.recover().await.unwrap();
            tx.send(p.b.result(&ctx, b"42")).await.unwrap();
            report
        });

        assert_eq!(report, RecoveryReport::default());
        assert_eq!(outcome.unwrap().task_id, task_id);
        assert_eq!(p.status(&task_id), TaskStatus::Completed);
        assert!(p.queue.try_next_task().unwrap().is_none());
        assert_eq!(p.submitter.count(), 1);
    }

    #[tokio::test]
    async fn test_ecdsa_operator_set_uses_ecdsa_driver() {
        let mut p = Pipeline::new(10);
        p.store
            .save_operator_set_config(&TEST_AVS, 1, &OperatorSetConfig::new(CurveType::Ecdsa, 5000))
            .unwrap();
        let x = EcdsaTestOperator::random(1);
        let y = EcdsaTestOperator::random(1);
        let operators = StaticOperatorSets::new().with(
            TEST_AVS,
            snapshot(1, vec![x.operator.clone(), y.operator.clone()]),
        );
        let submitter = Arc::new(RecordingSubmitter::<EcdsaMaterial>::new());
        let ecdsa_driver = TaskAggregationDriver::<Ecdsa>::new(
            p.store.clone(),
            p.contexts.clone(),
            Arc::new(operators),
            submitter.clone(),
        );

        let task_id = p.emit_task(10, 0x21, 1, 0);
        p.poller.poll_once().await.unwrap();
        let task = p.queue.next_task().await.unwrap().unwrap();
        assert_eq!(task.operator_set_id, 1);

        let config = p
            .store
            .get_operator_set_config(&task.avs_address, task.operator_set_id)
            .unwrap();
        assert_eq!(config.curve, CurveType::Ecdsa);

        // One of two equal-weight operators meets 5000 bips.
        let ctx = SigningContext::for_task(&task, REFERENCE_TIMESTAMP);
        let (tx, mut rx) = mpsc::channel(1);
        tx.send(y.result(&ctx, b"42")).await.unwrap();

        let certificate = ecdsa_driver.drive(&task, &mut rx).await.unwrap();
        assert_eq!(certificate.signers.len(), 1);
        assert!(verify_certificate::<Ecdsa>(&certificate));
        assert_eq!(submitter.count(), 1);
        assert_eq!(p.status(&task_id), TaskStatus::Completed);

        // The BLS driver refuses the same operator set.
        let mut other = task.clone();
        other.task_id = TaskId::new("0xbls-driver");
        p.store.save_pending_task(&other).unwrap();
        let mut empty = p.results(&other, b"42", &[]);
        assert!(matches!(
            p.driver.drive(&other, &mut empty).await,
            Err(DriverError::CurveMismatch { .. })
        ));
    }
}
