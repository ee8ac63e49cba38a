//! # Ports Layer
//!
//! Source of the contract interface descriptions the decoder is built from.

use crate::domain::entities::ContractMetadata;

/// Supplies the ABIs of the contracts an operator watches.
pub trait ContractMetadataProvider: Send + Sync {
    fn contracts(&self) -> Vec<ContractMetadata>;
}

/// Fixed list, configured at startup.
#[derive(Clone, Debug, Default)]
pub struct StaticContractMetadata {
    contracts: Vec<ContractMetadata>,
}

impl StaticContractMetadata {
    pub fn new(contracts: Vec<ContractMetadata>) -> Self {
        Self { contracts }
    }

    pub fn with(mut self, contract: ContractMetadata) -> Self {
        self.contracts.push(contract);
        self
    }
}

impl ContractMetadataProvider for StaticContractMetadata {
    fn contracts(&self) -> Vec<ContractMetadata> {
        self.contracts.clone()
    }
}
