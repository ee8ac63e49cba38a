//! # Ports Layer
//!
//! The store contract shared by every backend. Implementations must be safe
//! under concurrent use from the poll loop and a manual recovery pass.

use crate::domain::entities::OperatorSetConfig;
use crate::domain::errors::StoreError;
use shared_types::{Address, BlockInfo, ChainId, OperatorSetId, Task, TaskId, TaskStatus};

/// Durable state for task ingestion, keyed by AVS and chain.
///
/// Absent keys yield [`StoreError::NotFound`].
pub trait TaskStore: Send + Sync {
    // -------------------------------------------------------------------------
    // Block window
    // -------------------------------------------------------------------------

    /// Record a processed block. Overwrites an existing entry at that number.
    fn save_block(&self, avs: &Address, block: &BlockInfo) -> Result<(), StoreError>;

    fn get_block(
        &self,
        avs: &Address,
        chain_id: ChainId,
        number: u64,
    ) -> Result<BlockInfo, StoreError>;

    /// Remove a block. Absent blocks are not an error.
    fn delete_block(&self, avs: &Address, chain_id: ChainId, number: u64)
        -> Result<(), StoreError>;

    // -------------------------------------------------------------------------
    // Checkpoint
    // -------------------------------------------------------------------------

    fn set_last_processed_block(
        &self,
        avs: &Address,
        chain_id: ChainId,
        number: u64,
    ) -> Result<(), StoreError>;

    fn get_last_processed_block(&self, avs: &Address, chain_id: ChainId)
        -> Result<u64, StoreError>;

    // -------------------------------------------------------------------------
    // Tasks
    // -------------------------------------------------------------------------

    /// Insert a task as `Pending`.
    ///
    /// Idempotent per `(avs, task_id)`: an existing task, in any state, is
    /// left untouched and `Ok(false)` is returned.
    fn save_pending_task(&self, task: &Task) -> Result<bool, StoreError>;

    fn get_task(&self, avs: &Address, task_id: &TaskId) -> Result<Task, StoreError>;

    /// Tasks of the AVS still in `Pending` or `Processing`, in key order.
    fn list_pending_tasks_for_avs(&self, avs: &Address) -> Result<Vec<Task>, StoreError>;

    /// Move a task along its lifecycle. Returns the updated task.
    fn update_task_status(
        &self,
        avs: &Address,
        task_id: &TaskId,
        status: TaskStatus,
    ) -> Result<Task, StoreError>;

    fn delete_task(&self, avs: &Address, task_id: &TaskId) -> Result<(), StoreError>;

    // -------------------------------------------------------------------------
    // Operator sets
    // -------------------------------------------------------------------------

    fn save_operator_set_config(
        &self,
        avs: &Address,
        operator_set_id: OperatorSetId,
        config: &OperatorSetConfig,
    ) -> Result<(), StoreError>;

    fn get_operator_set_config(
        &self,
        avs: &Address,
        operator_set_id: OperatorSetId,
    ) -> Result<OperatorSetConfig, StoreError>;

    /// Release resources. Later calls fail with [`StoreError::Closed`].
    fn close(&self) -> Result<(), StoreError>;
}
