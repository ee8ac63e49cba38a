//! # Key Layout
//!
//! Big-endian numbers so lexicographic order matches numeric order.
//!
//! | Family | Key |
//! |--------|-----|
//! | tasks | `avs(20) ‖ task_id` |
//! | blocks | `avs(20) ‖ chain_id(8) ‖ number(8)` |
//! | checkpoints | `avs(20) ‖ chain_id(8)` |
//! | operator_sets | `avs(20) ‖ operator_set_id(4)` |

use shared_types::{Address, ChainId, OperatorSetId, TaskId};

pub fn task_key(avs: &Address, task_id: &TaskId) -> Vec<u8> {
    let mut key = Vec::with_capacity(20 + task_id.as_bytes().len());
    key.extend_from_slice(avs.as_slice());
    key.extend_from_slice(task_id.as_bytes());
    key
}

/// Prefix shared by all tasks of one AVS.
pub fn task_prefix(avs: &Address) -> Vec<u8> {
    avs.as_slice().to_vec()
}

pub fn checkpoint_key(avs: &Address, chain_id: ChainId) -> Vec<u8> {
    let mut key = Vec::with_capacity(28);
    key.extend_from_slice(avs.as_slice());
    key.extend_from_slice(&chain_id.as_u64().to_be_bytes());
    key
}

pub fn block_key(avs: &Address, chain_id: ChainId, number: u64) -> Vec<u8> {
    let mut key = checkpoint_key(avs, chain_id);
    key.extend_from_slice(&number.to_be_bytes());
    key
}

pub fn operator_set_key(avs: &Address, operator_set_id: OperatorSetId) -> Vec<u8> {
    let mut key = Vec::with_capacity(24);
    key.extend_from_slice(avs.as_slice());
    key.extend_from_slice(&operator_set_id.to_be_bytes());
    key
}
