//! # Reorgs vs. In-Flight Aggregation
//!
//! Reorganizing a task's source block cancels its block context, which stops
//! any aggregation still running for it. The task is discarded and picked up
//! again from the canonical fork.

#[cfg(test)]
mod tests {
    use super::super::support::Pipeline;
    use op_04_chain_poller::test_utils::TEST_AVS;
    use op_04_chain_poller::TickOutcome;
    use op_05_aggregation::test_utils::REFERENCE_TIMESTAMP;
    use op_05_aggregation::{AggregationError, DriverError, SigningContext};
    use shared_types::TaskStatus;

    /// Pipeline that has committed blocks 90..=95.
    async fn pipeline_at_95() -> Pipeline {
        let p = Pipeline::new(90);
        p.poller.poll_once().await.unwrap();
        p.client.extend_to(95);
        p.poller.poll_once().await.unwrap();
        p
    }

    #[tokio::test]
    async fn test_reorg_cancels_in_flight_aggregation() {
        let mut p = pipeline_at_95().await;
        p.client.extend_to(96);
        let task_id = p.emit_task(96, 0x96, 0, 0);
        p.poller.poll_once().await.unwrap();
        let task = p.queue.next_task().await.unwrap().unwrap();
        assert_eq!(task.source_block_number, 96);

        // Only A answers before the reorg; the stream stays open.
        let (tx, mut results) = tokio::sync::mpsc::channel(4);
        let ctx = SigningContext::for_task(&task, REFERENCE_TIMESTAMP);
        tx.send(p.a.result(&ctx, b"42")).await.unwrap();

        let (outcome, tick) = tokio::join!(p.driver.drive(&task, &mut results), async {
            tokio::task::yield_now().await;
            p.client.reorg_from(96);
            p.client.extend_to(97);
            p.poller.poll_once().await
        });

        assert_eq!(
            tick.unwrap(),
            TickOutcome::Reorged {
                ancestor: 95,
                abandoned: 1
            }
        );
        assert!(matches!(
            outcome,
            Err(DriverError::Aggregation(AggregationError::Cancelled { .. }))
        ));
        assert!(p
            .store
            .get_task(&TEST_AVS, &task_id)
            .unwrap_err()
            .is_not_found());
        assert_eq!(p.submitter.count(), 0);
        drop(tx);

        // Same task re-emitted on the canonical fork completes normally.
        let again = p.emit_task(97, 0x96, 0, 0);
        assert_eq!(again, task_id);
        p.poller.poll_once().await.unwrap();
        let task = p.queue.next_task().await.unwrap().unwrap();
        assert_eq!(task.source_block_number, 97);

        let mut results = p.results(&task, b"42", &[&p.a, &p.b]);
        let certificate = p.driver.drive(&task, &mut results).await.unwrap();
        assert_eq!(certificate.task_id, task_id);
        assert_eq!(p.status(&task_id), TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_completed_task_survives_reorg() {
        let mut p = pipeline_at_95().await;
        p.client.extend_to(96);
        let task_id = p.emit_task(96, 0x61, 0, 0);
        p.poller.poll_once().await.unwrap();
        let task = p.queue.next_task().await.unwrap().unwrap();
        let mut results = p.results(&task, b"42", &[&p.a, &p.b]);
        p.driver.drive(&task, &mut results).await.unwrap();

        p.client.reorg_from(96);
        p.client.extend_to(97);
        assert!(matches!(
            p.poller.poll_once().await.unwrap(),
            TickOutcome::Reorged { ancestor: 95, .. }
        ));

        // The certificate was already submitted; nothing to undo here.
        assert_eq!(p.status(&task_id), TaskStatus::Completed);
        assert!(p.queue.try_next_task().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_tasks_of_untouched_blocks_keep_running() {
        let mut p = pipeline_at_95().await;
        p.client.extend_to(96);
        let kept = p.emit_task(96, 0x71, 0, 0);
        p.poller.poll_once().await.unwrap();
        p.client.extend_to(97);
        let dropped = p.emit_task(97, 0x72, 0, 0);
        p.poller.poll_once().await.unwrap();

        let kept_task = p.queue.next_task().await.unwrap().unwrap();
        assert_eq!(kept_task.task_id, kept);

        p.client.reorg_from(97);
        p.client.extend_to(98);
        assert_eq!(
            p.poller.poll_once().await.unwrap(),
            TickOutcome::Reorged {
                ancestor: 96,
                abandoned: 1
            }
        );
        assert!(p.store.get_task(&TEST_AVS, &dropped).unwrap_err().is_not_found());

        let mut results = p.results(&kept_task, b"42", &[&p.a, &p.b]);
        p.driver.drive(&kept_task, &mut results).await.unwrap();
        assert_eq!(p.status(&kept), TaskStatus::Completed);
        assert!(!p.contexts.live_blocks().contains(&97));
    }
}
