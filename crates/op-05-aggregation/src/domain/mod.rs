//! # Domain Layer
//!
//! Signature schemes, digests and the per-task aggregator. No I/O.

pub mod aggregator;
pub mod bls;
pub mod certificate;
pub mod digest;
pub mod ecdsa;
pub mod errors;
pub mod operator;
pub mod scheme;
