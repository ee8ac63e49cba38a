//! # BLS12-381 (`min_sig`)
//!
//! Signatures live on G1 (48 bytes compressed), public keys on G2 (96 bytes
//! compressed). Every operator of a task signs the same response digest, so
//! aggregation is plain point addition and verification is a single pairing
//! against the aggregate public key.

use super::errors::SignatureError;
use super::operator::VerificationKey;
use alloy_primitives::B256;
use blst::min_sig::{AggregatePublicKey, AggregateSignature, PublicKey, Signature};
use blst::BLST_ERROR;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use std::fmt;

/// Domain separation tag, proof-of-possession ciphersuite.
pub const DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

/// Compressed G2 public key.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlsPublicKey {
    #[serde_as(as = "Bytes")]
    pub bytes: [u8; 96],
}

/// Compressed G1 signature.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlsSignature {
    #[serde_as(as = "Bytes")]
    pub bytes: [u8; 48],
}

impl BlsPublicKey {
    pub fn from_bytes(bytes: [u8; 96]) -> Self {
        Self { bytes }
    }

    /// Decompress and subgroup-check.
    pub fn is_valid(&self) -> bool {
        PublicKey::key_validate(&self.bytes).is_ok()
    }
}

impl BlsSignature {
    pub fn from_bytes(bytes: [u8; 48]) -> Self {
        Self { bytes }
    }
}

impl fmt::Debug for BlsPublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlsPublicKey(0x{}..)", short_hex(&self.bytes))
    }
}

impl fmt::Debug for BlsSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlsSignature(0x{}..)", short_hex(&self.bytes))
    }
}

fn short_hex(bytes: &[u8]) -> String {
    bytes.iter().take(6).map(|b| format!("{:02x}", b)).collect()
}

impl VerificationKey for BlsPublicKey {
    type Signature = BlsSignature;

    fn verify(&self, message: &B256, signature: &BlsSignature) -> bool {
        verify_bls(message.as_slice(), signature, self)
    }
}

/// Verify one signature with a pairing check.
pub fn verify_bls(message: &[u8], signature: &BlsSignature, public_key: &BlsPublicKey) -> bool {
    let Ok(sig) = Signature::from_bytes(&signature.bytes) else {
        return false;
    };
    let Ok(pk) = PublicKey::from_bytes(&public_key.bytes) else {
        return false;
    };

    sig.verify(true, message, DST, &[], &pk, true) == BLST_ERROR::BLST_SUCCESS
}

/// Point-add signatures over the same message.
pub fn aggregate_signatures(signatures: &[BlsSignature]) -> Result<BlsSignature, SignatureError> {
    let (first, rest) = signatures
        .split_first()
        .ok_or(SignatureError::EmptyAggregation)?;

    let first = Signature::from_bytes(&first.bytes).map_err(|_| SignatureError::InvalidFormat)?;
    let mut aggregate = AggregateSignature::from_signature(&first);

    for sig in rest {
        let parsed = Signature::from_bytes(&sig.bytes).map_err(|_| SignatureError::InvalidFormat)?;
        aggregate
            .add_signature(&parsed, true)
            .map_err(|_| SignatureError::AggregationFailed)?;
    }

    Ok(BlsSignature {
        bytes: aggregate.to_signature().to_bytes(),
    })
}

/// Point-add public keys.
pub fn aggregate_public_keys(public_keys: &[BlsPublicKey]) -> Result<BlsPublicKey, SignatureError> {
    if public_keys.is_empty() {
        return Err(SignatureError::EmptyAggregation);
    }

    let pks = public_keys
        .iter()
        .map(|pk| PublicKey::from_bytes(&pk.bytes).map_err(|_| SignatureError::InvalidFormat))
        .collect::<Result<Vec<_>, _>>()?;
    let pk_refs: Vec<&PublicKey> = pks.iter().collect();

    let aggregate = AggregatePublicKey::aggregate(&pk_refs, true)
        .map_err(|_| SignatureError::AggregationFailed)?;

    Ok(BlsPublicKey {
        bytes: aggregate.to_public_key().to_bytes(),
    })
}

/// Verify an aggregate signature over one message against the signers' keys.
pub fn verify_aggregate(
    message: &[u8],
    aggregate_signature: &BlsSignature,
    public_keys: &[BlsPublicKey],
) -> bool {
    match aggregate_public_keys(public_keys) {
        Ok(aggregate_pk) => verify_bls(message, aggregate_signature, &aggregate_pk),
        Err(_) => false,
    }
}
