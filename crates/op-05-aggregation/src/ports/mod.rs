//! # Ports Layer
//!
//! - `OperatorSetProvider`: roster and weights of an operator set (usually
//!   read from the AVS registry contracts).
//! - `CertificateSubmitter`: hands a finished certificate to the chain.

use crate::domain::certificate::Certificate;
use crate::domain::operator::{OperatorSetSnapshot, VerificationKey};
use alloy_primitives::Address;
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::OperatorSetId;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OperatorSetError {
    #[error("Operator set {operator_set_id} of AVS {avs} not found")]
    NotFound {
        avs: Address,
        operator_set_id: OperatorSetId,
    },

    #[error("Operator set lookup failed: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Certificate rejected: {0}")]
    Rejected(String),

    #[error("Submission transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait OperatorSetProvider<K: VerificationKey>: Send + Sync {
    async fn operator_set(
        &self,
        avs: Address,
        operator_set_id: OperatorSetId,
    ) -> Result<OperatorSetSnapshot<K>, OperatorSetError>;
}

#[async_trait]
pub trait CertificateSubmitter<M: Send + Sync + 'static>: Send + Sync {
    async fn submit(&self, certificate: &Certificate<M>) -> Result<(), SubmitError>;
}

/// Rosters configured up front, keyed by `(AVS, OperatorSetId)`.
#[derive(Debug)]
pub struct StaticOperatorSets<K> {
    sets: RwLock<HashMap<(Address, OperatorSetId), OperatorSetSnapshot<K>>>,
}

impl<K: VerificationKey> StaticOperatorSets<K> {
    pub fn new() -> Self {
        Self {
            sets: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or replace a roster.
    pub fn insert(&self, avs: Address, snapshot: OperatorSetSnapshot<K>) {
        self.sets
            .write()
            .insert((avs, snapshot.operator_set_id), snapshot);
    }

    pub fn with(self, avs: Address, snapshot: OperatorSetSnapshot<K>) -> Self {
        self.insert(avs, snapshot);
        self
    }
}

impl<K: VerificationKey> Default for StaticOperatorSets<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<K: VerificationKey> OperatorSetProvider<K> for StaticOperatorSets<K> {
    async fn operator_set(
        &self,
        avs: Address,
        operator_set_id: OperatorSetId,
    ) -> Result<OperatorSetSnapshot<K>, OperatorSetError> {
        self.sets
            .read()
            .get(&(avs, operator_set_id))
            .cloned()
            .ok_or(OperatorSetError::NotFound {
                avs,
                operator_set_id,
            })
    }
}
