//! # In-Memory Store
//!
//! Reference backend. One `RwLock` over all maps, so a status update is a
//! single critical section.

use crate::domain::entities::OperatorSetConfig;
use crate::domain::errors::StoreError;
use crate::ports::TaskStore;
use parking_lot::RwLock;
use shared_types::{Address, BlockInfo, ChainId, OperatorSetId, Task, TaskId, TaskStatus};
use std::collections::{BTreeMap, HashMap};

#[derive(Default)]
struct Inner {
    closed: bool,
    tasks: BTreeMap<(Address, TaskId), Task>,
    blocks: BTreeMap<(Address, ChainId, u64), BlockInfo>,
    checkpoints: HashMap<(Address, ChainId), u64>,
    operator_sets: HashMap<(Address, OperatorSetId), OperatorSetConfig>,
}

impl Inner {
    fn open(&self) -> Result<&Self, StoreError> {
        if self.closed {
            Err(StoreError::Closed)
        } else {
            Ok(self)
        }
    }

    fn open_mut(&mut self) -> Result<&mut Self, StoreError> {
        if self.closed {
            Err(StoreError::Closed)
        } else {
            Ok(self)
        }
    }
}

#[derive(Default)]
pub struct InMemoryTaskStore {
    inner: RwLock<Inner>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blocks across all AVS/chain pairs.
    pub fn block_count(&self) -> usize {
        self.inner.read().blocks.len()
    }

    pub fn task_count(&self) -> usize {
        self.inner.read().tasks.len()
    }
}

impl TaskStore for InMemoryTaskStore {
    fn save_block(&self, avs: &Address, block: &BlockInfo) -> Result<(), StoreError> {
        let mut guard = self.inner.write();
        guard
            .open_mut()?
            .blocks
            .insert((*avs, block.chain_id, block.number), block.clone());
        Ok(())
    }

    fn get_block(
        &self,
        avs: &Address,
        chain_id: ChainId,
        number: u64,
    ) -> Result<BlockInfo, StoreError> {
        let guard = self.inner.read();
        guard
            .open()?
            .blocks
            .get(&(*avs, chain_id, number))
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("block {number} on chain {chain_id}")))
    }

    fn delete_block(
        &self,
        avs: &Address,
        chain_id: ChainId,
        number: u64,
    ) -> Result<(), StoreError> {
        let mut guard = self.inner.write();
        guard.open_mut()?.blocks.remove(&(*avs, chain_id, number));
        Ok(())
    }

    fn set_last_processed_block(
        &self,
        avs: &Address,
        chain_id: ChainId,
        number: u64,
    ) -> Result<(), StoreError> {
        let mut guard = self.inner.write();
        guard.open_mut()?.checkpoints.insert((*avs, chain_id), number);
        Ok(())
    }

    fn get_last_processed_block(
        &self,
        avs: &Address,
        chain_id: ChainId,
    ) -> Result<u64, StoreError> {
        let guard = self.inner.read();
        guard
            .open()?
            .checkpoints
            .get(&(*avs, chain_id))
            .copied()
            .ok_or_else(|| StoreError::not_found(format!("checkpoint for chain {chain_id}")))
    }

    fn save_pending_task(&self, task: &Task) -> Result<bool, StoreError> {
        let mut guard = self.inner.write();
        let inner = guard.open_mut()?;
        let key = (task.avs_address, task.task_id.clone());
        if inner.tasks.contains_key(&key) {
            return Ok(false);
        }
        inner
            .tasks
            .insert(key, task.clone().with_status(TaskStatus::Pending));
        Ok(true)
    }

    fn get_task(&self, avs: &Address, task_id: &TaskId) -> Result<Task, StoreError> {
        let guard = self.inner.read();
        guard
            .open()?
            .tasks
            .get(&(*avs, task_id.clone()))
            .cloned()
            .ok_or_else(|| StoreError::not_found(format!("task {task_id}")))
    }

    fn list_pending_tasks_for_avs(&self, avs: &Address) -> Result<Vec<Task>, StoreError> {
        let guard = self.inner.read();
        Ok(guard
            .open()?
            .tasks
            .iter()
            .filter(|((owner, _), task)| owner == avs && task.status.is_recoverable())
            .map(|(_, task)| task.clone())
            .collect())
    }

    fn update_task_status(
        &self,
        avs: &Address,
        task_id: &TaskId,
        status: TaskStatus,
    ) -> Result<Task, StoreError> {
        let mut guard = self.inner.write();
        let task = guard
            .open_mut()?
            .tasks
            .get_mut(&(*avs, task_id.clone()))
            .ok_or_else(|| StoreError::not_found(format!("task {task_id}")))?;
        task.status = task
            .status
            .transition(status)
            .map_err(|e| StoreError::transition(task_id.as_str(), e))?;
        Ok(task.clone())
    }

    fn delete_task(&self, avs: &Address, task_id: &TaskId) -> Result<(), StoreError> {
        let mut guard = self.inner.write();
        guard.open_mut()?.tasks.remove(&(*avs, task_id.clone()));
        Ok(())
    }

    fn save_operator_set_config(
        &self,
        avs: &Address,
        operator_set_id: OperatorSetId,
        config: &OperatorSetConfig,
    ) -> Result<(), StoreError> {
        let mut guard = self.inner.write();
        guard
            .open_mut()?
            .operator_sets
            .insert((*avs, operator_set_id), *config);
        Ok(())
    }

    fn get_operator_set_config(
        &self,
        avs: &Address,
        operator_set_id: OperatorSetId,
    ) -> Result<OperatorSetConfig, StoreError> {
        let guard = self.inner.read();
        guard
            .open()?
            .operator_sets
            .get(&(*avs, operator_set_id))
            .copied()
            .ok_or_else(|| StoreError::not_found(format!("operator set {operator_set_id}")))
    }

    fn close(&self) -> Result<(), StoreError> {
        self.inner.write().closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::conformance;

    #[test]
    fn test_idempotent_task_creation() {
        conformance::idempotent_task_creation(&InMemoryTaskStore::new());
    }

    #[test]
    fn test_status_lifecycle() {
        conformance::status_lifecycle(&InMemoryTaskStore::new());
    }

    #[test]
    fn test_pending_listing_scoped_to_avs() {
        conformance::pending_listing_scoped_to_avs(&InMemoryTaskStore::new());
    }

    #[test]
    fn test_block_window() {
        conformance::block_window(&InMemoryTaskStore::new());
    }

    #[test]
    fn test_checkpoint() {
        conformance::checkpoint(&InMemoryTaskStore::new());
    }

    #[test]
    fn test_operator_set_config() {
        conformance::operator_set_config(&InMemoryTaskStore::new());
    }

    #[test]
    fn test_closed_store_rejects_operations() {
        conformance::closed_store_rejects_operations(&InMemoryTaskStore::new());
    }

    #[test]
    fn test_concurrent_status_updates_single_winner() {
        use std::sync::Arc;

        let store = Arc::new(InMemoryTaskStore::new());
        let task = conformance::task("0x01", Address::repeat_byte(1));
        store.save_pending_task(&task).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let task_id = task.task_id.clone();
                std::thread::spawn(move || {
                    store.update_task_status(&Address::repeat_byte(1), &task_id, TaskStatus::Failed)
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(Result::is_ok)
            .count();
        assert_eq!(winners, 1);
    }
}
