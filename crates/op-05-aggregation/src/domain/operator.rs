//! # Operators
//!
//! An operator is an address plus a scheme-specific key and a stake weight.

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use shared_types::OperatorSetId;
use std::fmt::Debug;

/// Something that can check a signature over a 32-byte digest.
pub trait VerificationKey: Clone + Debug + Send + Sync + 'static {
    type Signature: Clone + Debug + Send + Sync + 'static;

    fn verify(&self, message: &B256, signature: &Self::Signature) -> bool;
}

/// Roster entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator<K> {
    pub address: Address,
    pub public_key: K,
    pub weight: u64,
}

impl<K> Operator<K> {
    pub fn new(address: Address, public_key: K, weight: u64) -> Self {
        Self {
            address,
            public_key,
            weight,
        }
    }
}

/// Roster of one operator set as of a reference timestamp.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorSetSnapshot<K> {
    pub operator_set_id: OperatorSetId,
    /// Unix seconds at which the roster and weights were read.
    pub reference_timestamp: u64,
    pub operators: Vec<Operator<K>>,
}

impl<K> OperatorSetSnapshot<K> {
    pub fn total_weight(&self) -> u64 {
        self.operators
            .iter()
            .fold(0u64, |acc, op| acc.saturating_add(op.weight))
    }
}
