//! # Signing Digests
//!
//! What an operator signs. The response digest binds the result to one task
//! of one AVS, one operator set and its reference timestamp, so a signature
//! can never be replayed against another task.
//!
//! ```text
//! response = keccak256(RESPONSE_TAG ‖ len(task_id) ‖ task_id ‖ avs
//!                      ‖ operator_set_id ‖ reference_timestamp
//!                      ‖ keccak256(payload) ‖ keccak256(output))
//! auth     = keccak256(AUTH_TAG ‖ len(task_id) ‖ task_id ‖ avs ‖ operator
//!                      ‖ operator_set_id ‖ keccak256(result_signature))
//! ```
//!
//! Integers are big-endian, `len` is a u32.

use super::ecdsa::keccak256;
use alloy_primitives::{Address, B256};
use sha3::{Digest, Keccak256};
use shared_types::{OperatorSetId, Task, TaskId};

const RESPONSE_TAG: &[u8] = b"AVS_TASK_RESPONSE_V1";
const AUTH_TAG: &[u8] = b"AVS_OPERATOR_AUTH_V1";

/// Everything a result signature is bound to, apart from the output itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SigningContext {
    pub task_id: TaskId,
    pub avs_address: Address,
    pub operator_set_id: OperatorSetId,
    pub reference_timestamp: u64,
    pub payload_hash: B256,
}

impl SigningContext {
    pub fn new(
        task_id: TaskId,
        avs_address: Address,
        operator_set_id: OperatorSetId,
        reference_timestamp: u64,
        payload: &[u8],
    ) -> Self {
        Self {
            task_id,
            avs_address,
            operator_set_id,
            reference_timestamp,
            payload_hash: keccak256(payload),
        }
    }

    pub fn for_task(task: &Task, reference_timestamp: u64) -> Self {
        Self::new(
            task.task_id.clone(),
            task.avs_address,
            task.operator_set_id,
            reference_timestamp,
            &task.payload,
        )
    }

    /// Digest every operator signs for `output`.
    pub fn response_digest(&self, output: &[u8]) -> B256 {
        let mut hasher = Keccak256::new();
        hasher.update(RESPONSE_TAG);
        self.update_task(&mut hasher);
        hasher.update(self.avs_address.as_slice());
        hasher.update(self.operator_set_id.to_be_bytes());
        hasher.update(self.reference_timestamp.to_be_bytes());
        hasher.update(self.payload_hash.as_slice());
        hasher.update(keccak256(output).as_slice());
        B256::from_slice(&hasher.finalize())
    }

    /// Digest binding an operator's identity to its result signature (ECDSA).
    pub fn auth_digest(&self, operator: &Address, result_signature: &[u8]) -> B256 {
        let mut hasher = Keccak256::new();
        hasher.update(AUTH_TAG);
        self.update_task(&mut hasher);
        hasher.update(self.avs_address.as_slice());
        hasher.update(operator.as_slice());
        hasher.update(self.operator_set_id.to_be_bytes());
        hasher.update(keccak256(result_signature).as_slice());
        B256::from_slice(&hasher.finalize())
    }

    fn update_task(&self, hasher: &mut Keccak256) {
        let id = self.task_id.as_bytes();
        hasher.update((id.len() as u32).to_be_bytes());
        hasher.update(id);
    }
}
