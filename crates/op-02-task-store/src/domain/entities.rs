//! # Operator-Set Configuration
//!
//! Chosen once when an operator set is configured; the aggregation scheme is
//! derived from `curve`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Full weight, in basis points.
pub const MAX_THRESHOLD_BIPS: u16 = 10_000;

/// Signature curve used by an operator set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveType {
    /// BLS12-381, signatures aggregated into one point.
    Bls12381,
    /// secp256k1, signatures collected individually.
    Ecdsa,
}

impl fmt::Display for CurveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurveType::Bls12381 => f.write_str("bls12-381"),
            CurveType::Ecdsa => f.write_str("ecdsa"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorSetConfig {
    pub curve: CurveType,
    /// Share of total stake weight required for a certificate.
    pub threshold_bips: u16,
}

impl OperatorSetConfig {
    pub fn new(curve: CurveType, threshold_bips: u16) -> Self {
        Self {
            curve,
            threshold_bips,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.threshold_bips > 0 && self.threshold_bips <= MAX_THRESHOLD_BIPS
    }
}
