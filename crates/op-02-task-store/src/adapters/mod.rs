//! # Store Backends

pub mod memory;
#[cfg(feature = "rocksdb")]
pub mod rocksdb;

/// Behaviour every backend must share, run against each one.
#[cfg(test)]
pub(crate) mod conformance {
    use crate::domain::entities::{CurveType, OperatorSetConfig};
    use crate::domain::errors::StoreError;
    use crate::ports::TaskStore;
    use shared_types::{Address, BlockInfo, ChainId, Task, TaskId, TaskStatus, B256};

    pub fn task(id: &str, avs: Address) -> Task {
        Task {
            task_id: TaskId::new(id),
            avs_address: avs,
            chain_id: ChainId(1),
            operator_set_id: 0,
            source_block_number: 10,
            block_hash: B256::repeat_byte(10),
            transaction_hash: B256::repeat_byte(11),
            payload: b"payload".to_vec(),
            deadline_unix_seconds: None,
            status: TaskStatus::Pending,
            created_at_unix_seconds: 1_700_000_000,
        }
    }

    pub fn block(number: u64) -> BlockInfo {
        BlockInfo {
            number,
            hash: B256::from(number_word(number)),
            parent_hash: B256::from(number_word(number.saturating_sub(1))),
            timestamp: 1_700_000_000 + number * 12,
            chain_id: ChainId(1),
        }
    }

    fn number_word(n: u64) -> [u8; 32] {
        let mut word = [0u8; 32];
        word[24..].copy_from_slice(&n.to_be_bytes());
        word
    }

    pub fn idempotent_task_creation(store: &dyn TaskStore) {
        let avs = Address::repeat_byte(1);
        let original = task("0xaa", avs);
        assert!(store.save_pending_task(&original).unwrap());

        store
            .update_task_status(&avs, &original.task_id, TaskStatus::Processing)
            .unwrap();

        let mut replay = original.clone();
        replay.payload = b"different".to_vec();
        assert!(!store.save_pending_task(&replay).unwrap());

        let stored = store.get_task(&avs, &original.task_id).unwrap();
        assert_eq!(stored.status, TaskStatus::Processing);
        assert_eq!(stored.payload, original.payload);
    }

    pub fn status_lifecycle(store: &dyn TaskStore) {
        let avs = Address::repeat_byte(1);
        let t = task("0xbb", avs);
        store.save_pending_task(&t).unwrap();

        let err = store
            .update_task_status(&avs, &t.task_id, TaskStatus::Completed)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidStatusTransition { .. }));

        store
            .update_task_status(&avs, &t.task_id, TaskStatus::Processing)
            .unwrap();
        // A second claim loses.
        let err = store
            .update_task_status(&avs, &t.task_id, TaskStatus::Processing)
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidStatusTransition {
                from: TaskStatus::Processing,
                ..
            }
        ));
        let done = store
            .update_task_status(&avs, &t.task_id, TaskStatus::Completed)
            .unwrap();
        assert_eq!(done.status, TaskStatus::Completed);

        assert!(store
            .update_task_status(&avs, &t.task_id, TaskStatus::Pending)
            .is_err());

        let missing = store
            .update_task_status(&avs, &TaskId::new("0xnone"), TaskStatus::Processing)
            .unwrap_err();
        assert!(missing.is_not_found());

        store.delete_task(&avs, &t.task_id).unwrap();
        assert!(store.get_task(&avs, &t.task_id).unwrap_err().is_not_found());
    }

    pub fn pending_listing_scoped_to_avs(store: &dyn TaskStore) {
        let mine = Address::repeat_byte(1);
        let other = Address::repeat_byte(2);
        for id in ["0x01", "0x02", "0x03"] {
            store.save_pending_task(&task(id, mine)).unwrap();
        }
        store.save_pending_task(&task("0x09", other)).unwrap();

        store
            .update_task_status(&mine, &TaskId::new("0x02"), TaskStatus::Processing)
            .unwrap();
        store
            .update_task_status(&mine, &TaskId::new("0x03"), TaskStatus::Failed)
            .unwrap();

        let listed: Vec<String> = store
            .list_pending_tasks_for_avs(&mine)
            .unwrap()
            .into_iter()
            .map(|t| t.task_id.to_string())
            .collect();
        assert_eq!(listed, vec!["0x01".to_string(), "0x02".to_string()]);
    }

    pub fn block_window(store: &dyn TaskStore) {
        let avs = Address::repeat_byte(1);
        for n in 90..=95 {
            store.save_block(&avs, &block(n)).unwrap();
        }
        assert_eq!(store.get_block(&avs, ChainId(1), 93).unwrap(), block(93));
        assert!(store
            .get_block(&avs, ChainId(2), 93)
            .unwrap_err()
            .is_not_found());
        assert!(store
            .get_block(&Address::repeat_byte(2), ChainId(1), 93)
            .unwrap_err()
            .is_not_found());

        store.delete_block(&avs, ChainId(1), 95).unwrap();
        store.delete_block(&avs, ChainId(1), 95).unwrap();
        assert!(store
            .get_block(&avs, ChainId(1), 95)
            .unwrap_err()
            .is_not_found());

        let mut replacement = block(94);
        replacement.hash = B256::repeat_byte(0xee);
        store.save_block(&avs, &replacement).unwrap();
        assert_eq!(
            store.get_block(&avs, ChainId(1), 94).unwrap().hash,
            B256::repeat_byte(0xee)
        );
    }

    pub fn checkpoint(store: &dyn TaskStore) {
        let avs = Address::repeat_byte(1);
        assert!(store
            .get_last_processed_block(&avs, ChainId(1))
            .unwrap_err()
            .is_not_found());
        store.set_last_processed_block(&avs, ChainId(1), 100).unwrap();
        store.set_last_processed_block(&avs, ChainId(1), 93).unwrap();
        assert_eq!(store.get_last_processed_block(&avs, ChainId(1)).unwrap(), 93);
        assert!(store.get_last_processed_block(&avs, ChainId(5)).is_err());
    }

    pub fn operator_set_config(store: &dyn TaskStore) {
        let avs = Address::repeat_byte(1);
        let config = OperatorSetConfig::new(CurveType::Bls12381, 6667);
        store.save_operator_set_config(&avs, 3, &config).unwrap();
        assert_eq!(store.get_operator_set_config(&avs, 3).unwrap(), config);
        assert!(store
            .get_operator_set_config(&avs, 4)
            .unwrap_err()
            .is_not_found());
    }

    pub fn closed_store_rejects_operations(store: &dyn TaskStore) {
        let avs = Address::repeat_byte(1);
        store.close().unwrap();
        assert_eq!(
            store.save_pending_task(&task("0x01", avs)),
            Err(StoreError::Closed)
        );
        assert_eq!(
            store.get_last_processed_block(&avs, ChainId(1)),
            Err(StoreError::Closed)
        );
    }
}
