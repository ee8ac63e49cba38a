//! # Aggregation Schemes
//!
//! A scheme fixes the operator key type, what an operator sends with its
//! result, and what a certificate carries.
//!
//! - [`Bls`]: one signature per operator; the certificate holds the
//!   point-added signature and public key, plus the keys of non-signers.
//! - [`Ecdsa`]: a result signature plus an authentication signature binding
//!   the operator's identity; the certificate holds every result signature.

use super::bls::{self, BlsPublicKey, BlsSignature};
use super::digest::SigningContext;
use super::ecdsa::{self, EcdsaOperatorKey, EcdsaSignature};
use super::errors::SignatureError;
use super::operator::{Operator, VerificationKey};
use alloy_primitives::{Address, B256};
use op_02_task_store::CurveType;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use shared_types::{OperatorSetId, TaskId};
use std::fmt::Debug;

/// One operator's signed answer to a task.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult<P> {
    pub task_id: TaskId,
    pub avs_address: Address,
    pub operator_set_id: OperatorSetId,
    pub operator_address: Address,
    #[serde_as(as = "Bytes")]
    pub output: Vec<u8>,
    pub signature: P,
}

pub trait AggregationScheme: Send + Sync + 'static {
    /// Metric label.
    const NAME: &'static str;
    /// Operator-set curve this scheme serves.
    const CURVE: CurveType;

    type Key: VerificationKey;
    /// Signature material sent with each result.
    type Proof: Clone + Debug + Send + Sync + 'static;
    /// Aggregated material carried by the certificate.
    type Material: Clone + Debug + PartialEq + Send + Sync + 'static;

    /// Check `proof` from `operator` over the response `digest`.
    fn verify_proof(
        context: &SigningContext,
        operator: &Operator<Self::Key>,
        digest: &B256,
        proof: &Self::Proof,
    ) -> Result<(), SignatureError>;

    /// Combine accepted proofs. `signers` is non-empty and in address order.
    fn build_material(
        signers: &[(&Operator<Self::Key>, &Self::Proof)],
        non_signers: &[&Operator<Self::Key>],
    ) -> Result<Self::Material, SignatureError>;

    /// Re-check certificate material against the response digest.
    fn verify_material(digest: &B256, material: &Self::Material) -> bool;
}

// =============================================================================
// BLS
// =============================================================================

pub struct Bls;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlsMaterial {
    pub aggregate_signature: BlsSignature,
    pub aggregate_public_key: BlsPublicKey,
    pub signer_public_keys: Vec<BlsPublicKey>,
    /// Roster members outside the certificate, for on-chain stake accounting.
    pub non_signer_public_keys: Vec<BlsPublicKey>,
}

impl AggregationScheme for Bls {
    const NAME: &'static str = "bls";
    const CURVE: CurveType = CurveType::Bls12381;

    type Key = BlsPublicKey;
    type Proof = BlsSignature;
    type Material = BlsMaterial;

    fn verify_proof(
        _context: &SigningContext,
        operator: &Operator<BlsPublicKey>,
        digest: &B256,
        proof: &BlsSignature,
    ) -> Result<(), SignatureError> {
        if operator.public_key.verify(digest, proof) {
            Ok(())
        } else {
            Err(SignatureError::VerificationFailed)
        }
    }

    fn build_material(
        signers: &[(&Operator<BlsPublicKey>, &BlsSignature)],
        non_signers: &[&Operator<BlsPublicKey>],
    ) -> Result<BlsMaterial, SignatureError> {
        let signatures: Vec<BlsSignature> = signers.iter().map(|(_, sig)| **sig).collect();
        let signer_public_keys: Vec<BlsPublicKey> =
            signers.iter().map(|(op, _)| op.public_key).collect();

        Ok(BlsMaterial {
            aggregate_signature: bls::aggregate_signatures(&signatures)?,
            aggregate_public_key: bls::aggregate_public_keys(&signer_public_keys)?,
            signer_public_keys,
            non_signer_public_keys: non_signers.iter().map(|op| op.public_key).collect(),
        })
    }

    fn verify_material(digest: &B256, material: &BlsMaterial) -> bool {
        match bls::aggregate_public_keys(&material.signer_public_keys) {
            Ok(aggregate) if aggregate == material.aggregate_public_key => {
                aggregate.verify(digest, &material.aggregate_signature)
            }
            _ => false,
        }
    }
}

// =============================================================================
// ECDSA
// =============================================================================

pub struct Ecdsa;

/// What an ECDSA operator sends: the result signature and a second signature
/// over the auth digest, which commits to the operator address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcdsaResultSignature {
    pub result: EcdsaSignature,
    pub auth: EcdsaSignature,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcdsaSignerEntry {
    pub operator: Address,
    pub signature: EcdsaSignature,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcdsaMaterial {
    pub signatures: Vec<EcdsaSignerEntry>,
}

impl AggregationScheme for Ecdsa {
    const NAME: &'static str = "ecdsa";
    const CURVE: CurveType = CurveType::Ecdsa;

    type Key = EcdsaOperatorKey;
    type Proof = EcdsaResultSignature;
    type Material = EcdsaMaterial;

    fn verify_proof(
        context: &SigningContext,
        operator: &Operator<EcdsaOperatorKey>,
        digest: &B256,
        proof: &EcdsaResultSignature,
    ) -> Result<(), SignatureError> {
        let signer = operator.public_key.address;
        ecdsa::verify_signer(digest, &proof.result, signer)?;

        let auth_digest = context.auth_digest(&operator.address, &proof.result.to_bytes());
        ecdsa::verify_signer(&auth_digest, &proof.auth, signer).map_err(|_| {
            SignatureError::AuthenticationFailed {
                operator: operator.address,
            }
        })
    }

    fn build_material(
        signers: &[(&Operator<EcdsaOperatorKey>, &EcdsaResultSignature)],
        _non_signers: &[&Operator<EcdsaOperatorKey>],
    ) -> Result<EcdsaMaterial, SignatureError> {
        if signers.is_empty() {
            return Err(SignatureError::EmptyAggregation);
        }
        Ok(EcdsaMaterial {
            signatures: signers
                .iter()
                .map(|(op, proof)| EcdsaSignerEntry {
                    operator: op.public_key.address,
                    signature: proof.result,
                })
                .collect(),
        })
    }

    fn verify_material(digest: &B256, material: &EcdsaMaterial) -> bool {
        !material.signatures.is_empty()
            && material
                .signatures
                .iter()
                .all(|entry| ecdsa::verify_signer(digest, &entry.signature, entry.operator).is_ok())
    }
}
