//! # Certificates
//!
//! Immutable proof that operators holding at least the threshold share of
//! stake signed the same task response.

use super::digest::SigningContext;
use super::scheme::AggregationScheme;
use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use shared_types::{OperatorSetId, TaskId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerWeight {
    pub operator: Address,
    pub weight: u64,
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate<M> {
    pub task_id: TaskId,
    pub avs_address: Address,
    pub operator_set_id: OperatorSetId,
    pub reference_timestamp: u64,
    pub payload_hash: B256,
    /// Agreed response bytes.
    #[serde_as(as = "Bytes")]
    pub task_response: Vec<u8>,
    pub response_digest: B256,
    /// Contributing operators in address order.
    pub signers: Vec<SignerWeight>,
    pub signed_weight: u64,
    pub total_weight: u64,
    /// Unix seconds.
    pub signed_at: u64,
    pub material: M,
}

impl<M> Certificate<M> {
    pub fn signing_context(&self) -> SigningContext {
        SigningContext {
            task_id: self.task_id.clone(),
            avs_address: self.avs_address,
            operator_set_id: self.operator_set_id,
            reference_timestamp: self.reference_timestamp,
            payload_hash: self.payload_hash,
        }
    }

    pub fn signer_addresses(&self) -> impl Iterator<Item = &Address> {
        self.signers.iter().map(|s| &s.operator)
    }

    pub fn is_signer(&self, operator: &Address) -> bool {
        self.signers.iter().any(|s| &s.operator == operator)
    }
}

/// Recompute the response digest and re-check the signature material.
///
/// Does not re-check the threshold; that needs the roster as of
/// `reference_timestamp`.
pub fn verify_certificate<S: AggregationScheme>(certificate: &Certificate<S::Material>) -> bool {
    let digest = certificate
        .signing_context()
        .response_digest(&certificate.task_response);

    digest == certificate.response_digest && S::verify_material(&digest, &certificate.material)
}
