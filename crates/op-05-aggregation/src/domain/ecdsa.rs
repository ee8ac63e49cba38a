//! # ECDSA (secp256k1) Signer Recovery
//!
//! Operators are identified by their Ethereum address, so an ECDSA "public
//! key" is just that address and verification means recovering the signer
//! from the prehashed digest and comparing.
//!
//! Malleable signatures (S in the upper half of the order, EIP-2) are
//! rejected before recovery.

use super::errors::SignatureError;
use super::operator::VerificationKey;
use alloy_primitives::{Address, B256};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use subtle::{Choice, ConstantTimeEq};
use zeroize::Zeroize;

/// secp256k1 curve order n.
const SECP256K1_ORDER: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFE,
    0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36, 0x41, 0x41,
];

/// n / 2.
const SECP256K1_HALF_ORDER: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B, 0x20, 0xA0,
];

/// Recoverable signature in `r ‖ s ‖ v` form.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EcdsaSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    /// Recovery id: 0, 1, 27 or 28.
    pub v: u8,
}

impl EcdsaSignature {
    /// 65-byte `r ‖ s ‖ v` encoding.
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v;
        out
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, SignatureError> {
        if bytes.len() != 65 {
            return Err(SignatureError::InvalidFormat);
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self { r, s, v: bytes[64] })
    }
}

/// Operator identity for the ECDSA scheme.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EcdsaOperatorKey {
    pub address: Address,
}

impl EcdsaOperatorKey {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        Self::new(address_from_pubkey(key))
    }
}

impl VerificationKey for EcdsaOperatorKey {
    type Signature = EcdsaSignature;

    fn verify(&self, message: &B256, signature: &EcdsaSignature) -> bool {
        verify_signer(message, signature, self.address).is_ok()
    }
}

/// Recover the signer and require it to be `expected`.
pub fn verify_signer(
    message_hash: &B256,
    signature: &EcdsaSignature,
    expected: Address,
) -> Result<(), SignatureError> {
    let actual = recover_address(message_hash, signature)?;
    if actual != expected {
        return Err(SignatureError::SignerMismatch { expected, actual });
    }
    Ok(())
}

/// Recover the Ethereum address that produced `signature` over `message_hash`.
pub fn recover_address(
    message_hash: &B256,
    signature: &EcdsaSignature,
) -> Result<Address, SignatureError> {
    if !is_valid_scalar(&signature.r) || !is_valid_scalar(&signature.s) {
        return Err(SignatureError::InvalidFormat);
    }
    if !is_low_s(&signature.s) {
        return Err(SignatureError::MalleableSignature);
    }
    let recovery_id = parse_recovery_id(signature.v)?;

    let mut sig_bytes = [0u8; 64];
    sig_bytes[..32].copy_from_slice(&signature.r);
    sig_bytes[32..].copy_from_slice(&signature.s);
    let parsed = Signature::from_slice(&sig_bytes);
    sig_bytes.zeroize();
    let sig = parsed.map_err(|_| SignatureError::InvalidFormat)?;

    let recovered =
        VerifyingKey::recover_from_prehash(message_hash.as_slice(), &sig, recovery_id)
            .map_err(|_| SignatureError::RecoveryFailed)?;

    Ok(address_from_pubkey(&recovered))
}

pub fn keccak256(data: &[u8]) -> B256 {
    B256::from_slice(&Keccak256::digest(data))
}

/// Last 20 bytes of keccak of the uncompressed key without its 0x04 prefix.
pub fn address_from_pubkey(public_key: &VerifyingKey) -> Address {
    let encoded = public_key.to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// `s < n/2`, constant time.
pub(crate) fn is_low_s(s: &[u8; 32]) -> bool {
    ct_less_than(s, &SECP256K1_HALF_ORDER).into()
}

/// `0 < scalar < n`, constant time.
fn is_valid_scalar(scalar: &[u8; 32]) -> bool {
    let mut is_zero = Choice::from(1u8);
    for byte in scalar {
        is_zero &= byte.ct_eq(&0u8);
    }
    (!is_zero & ct_less_than(scalar, &SECP256K1_ORDER)).into()
}

fn ct_less_than(a: &[u8; 32], b: &[u8; 32]) -> Choice {
    let mut less = Choice::from(0u8);
    let mut greater = Choice::from(0u8);

    for (x, y) in a.iter().zip(b) {
        let undecided = !(less | greater);
        less |= undecided & Choice::from((x < y) as u8);
        greater |= undecided & Choice::from((x > y) as u8);
    }
    less
}

fn parse_recovery_id(v: u8) -> Result<RecoveryId, SignatureError> {
    let id = match v {
        0 | 27 => 0,
        1 | 28 => 1,
        _ => return Err(SignatureError::InvalidRecoveryId(v)),
    };
    RecoveryId::try_from(id).map_err(|_| SignatureError::InvalidRecoveryId(v))
}

/// `n - s`. Maps a high-S signature to its low-S twin.
pub fn invert_s(s: &[u8; 32]) -> [u8; 32] {
    let mut result = [0u8; 32];
    let mut borrow: i32 = 0;

    for i in (0..32).rev() {
        let diff = SECP256K1_ORDER[i] as i32 - s[i] as i32 - borrow;
        if diff < 0 {
            result[i] = (diff + 256) as u8;
            borrow = 1;
        } else {
            result[i] = diff as u8;
            borrow = 0;
        }
    }
    result
}

/// Sign a prehashed digest, normalized to low-S with `v` in {27, 28}.
///
/// Used by operator-side tooling and tests. Key custody is external.
pub fn sign_prehash(
    message_hash: &B256,
    key: &k256::ecdsa::SigningKey,
) -> Result<EcdsaSignature, SignatureError> {
    let (sig, recid) = key
        .sign_prehash_recoverable(message_hash.as_slice())
        .map_err(|_| SignatureError::InvalidFormat)?;

    let bytes = sig.to_bytes();
    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&bytes[..32]);
    s.copy_from_slice(&bytes[32..]);

    let (s, recid) = if is_low_s(&s) {
        (s, recid.to_byte())
    } else {
        (invert_s(&s), recid.to_byte() ^ 1)
    };

    Ok(EcdsaSignature { r, s, v: recid + 27 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;

    fn keypair() -> (SigningKey, Address) {
        let key = SigningKey::random(&mut rand::thread_rng());
        let address = address_from_pubkey(key.verifying_key());
        (key, address)
    }

    #[test]
    fn test_recover_signer() {
        let (key, address) = keypair();
        let digest = keccak256(b"task response");
        let sig = sign_prehash(&digest, &key).unwrap();

        assert_eq!(recover_address(&digest, &sig).unwrap(), address);
        assert!(EcdsaOperatorKey::new(address).verify(&digest, &sig));
    }

    #[test]
    fn test_wrong_message_recovers_other_address() {
        let (key, address) = keypair();
        let sig = sign_prehash(&keccak256(b"a"), &key).unwrap();
        let err = verify_signer(&keccak256(b"b"), &sig, address).unwrap_err();
        assert!(matches!(
            err,
            SignatureError::SignerMismatch { .. } | SignatureError::RecoveryFailed
        ));
    }

    #[test]
    fn test_high_s_rejected() {
        let (key, _) = keypair();
        let digest = keccak256(b"x");
        let mut sig = sign_prehash(&digest, &key).unwrap();
        sig.s = invert_s(&sig.s);
        sig.v = if sig.v == 27 { 28 } else { 27 };

        assert_eq!(
            recover_address(&digest, &sig).unwrap_err(),
            SignatureError::MalleableSignature
        );
    }

    #[test]
    fn test_zero_scalars_rejected() {
        let sig = EcdsaSignature {
            r: [0u8; 32],
            s: [1u8; 32],
            v: 27,
        };
        assert_eq!(
            recover_address(&B256::ZERO, &sig).unwrap_err(),
            SignatureError::InvalidFormat
        );
        let sig = EcdsaSignature {
            r: [1u8; 32],
            s: SECP256K1_ORDER,
            v: 27,
        };
        assert_eq!(
            recover_address(&B256::ZERO, &sig).unwrap_err(),
            SignatureError::InvalidFormat
        );
    }

    #[test]
    fn test_recovery_ids() {
        assert!(parse_recovery_id(0).is_ok());
        assert!(parse_recovery_id(28).is_ok());
        assert_eq!(
            parse_recovery_id(2).unwrap_err(),
            SignatureError::InvalidRecoveryId(2)
        );
        assert_eq!(
            parse_recovery_id(35).unwrap_err(),
            SignatureError::InvalidRecoveryId(35)
        );
    }

    #[test]
    fn test_low_s_boundary() {
        assert!(!is_low_s(&SECP256K1_HALF_ORDER));
        let mut below = SECP256K1_HALF_ORDER;
        below[31] -= 1;
        assert!(is_low_s(&below));
        assert_eq!(invert_s(&invert_s(&below)), below);
    }

    #[test]
    fn test_byte_encoding() {
        let (key, _) = keypair();
        let sig = sign_prehash(&keccak256(b"enc"), &key).unwrap();
        assert_eq!(EcdsaSignature::from_slice(&sig.to_bytes()).unwrap(), sig);
        assert_eq!(
            EcdsaSignature::from_slice(&[0u8; 64]).unwrap_err(),
            SignatureError::InvalidFormat
        );
    }
}
