//! # Result Aggregator (OP-05)
//!
//! Weighted threshold aggregation of operator results into a certificate.
//!
//! ## Schemes
//!
//! | Scheme | Key | Certificate material |
//! |--------|-----|----------------------|
//! | `Bls` | BLS12-381 G2 public key | aggregate signature + aggregate key, non-signer keys |
//! | `Ecdsa` | secp256k1 address | every signer's result signature |
//!
//! The scheme of an operator set is fixed in its stored `OperatorSetConfig`.
//!
//! ## Invariants
//!
//! - An operator contributes weight at most once per task.
//! - A certificate covers operators that all signed the same response.
//! - Once generated, a certificate never changes.
//!
//! ## Crate Structure
//!
//! - `domain/` - keys, digests, schemes, the aggregator, certificates
//! - `ports/` - `OperatorSetProvider`, `CertificateSubmitter`
//! - `service/` - `TaskAggregationDriver`

pub mod domain;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use domain::aggregator::{AggregatorParams, TaskResultAggregator};
pub use domain::bls::{BlsPublicKey, BlsSignature};
pub use domain::certificate::{verify_certificate, Certificate, SignerWeight};
pub use domain::digest::SigningContext;
pub use domain::ecdsa::{EcdsaOperatorKey, EcdsaSignature};
pub use domain::errors::{AggregationError, SignatureError};
pub use domain::operator::{Operator, OperatorSetSnapshot, VerificationKey};
pub use domain::scheme::{
    AggregationScheme, Bls, BlsMaterial, Ecdsa, EcdsaMaterial, EcdsaResultSignature,
    EcdsaSignerEntry, TaskResult,
};
pub use ports::{
    CertificateSubmitter, OperatorSetError, OperatorSetProvider, StaticOperatorSets, SubmitError,
};
pub use service::{DriverError, TaskAggregationDriver};
