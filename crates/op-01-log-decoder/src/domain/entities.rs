//! # Domain Entities

use super::errors::DecodeError;
use alloy_dyn_abi::DynSolValue;
use alloy_json_abi::{Event, JsonAbi};
use alloy_primitives::{Address, B256, U256};
use std::collections::BTreeMap;

// =============================================================================
// CONTRACT METADATA
// =============================================================================

/// Interface description of one watched contract.
#[derive(Clone, Debug)]
pub struct ContractMetadata {
    /// Human name used in logs (e.g. `TaskMailbox`).
    pub name: String,
    pub address: Address,
    pub abi: JsonAbi,
}

impl ContractMetadata {
    pub fn new(name: impl Into<String>, address: Address, abi: JsonAbi) -> Self {
        Self {
            name: name.into(),
            address,
            abi,
        }
    }

    /// Parse a standard JSON ABI document.
    pub fn from_json(
        name: impl Into<String>,
        address: Address,
        abi_json: &str,
    ) -> Result<Self, DecodeError> {
        let abi: JsonAbi =
            serde_json::from_str(abi_json).map_err(|e| DecodeError::InvalidAbi(e.to_string()))?;
        Ok(Self::new(name, address, abi))
    }

    /// Build an ABI from human-readable event signatures, e.g.
    /// `event Transfer(address indexed from, address indexed to, uint256 value)`.
    pub fn from_event_signatures(
        name: impl Into<String>,
        address: Address,
        signatures: &[&str],
    ) -> Result<Self, DecodeError> {
        let mut abi = JsonAbi::new();
        for signature in signatures {
            let event =
                Event::parse(signature).map_err(|e| DecodeError::InvalidAbi(e.to_string()))?;
            abi.events.entry(event.name.clone()).or_default().push(event);
        }
        Ok(Self::new(name, address, abi))
    }

    /// Topic 0 of the first event registered under `event_name`.
    pub fn event_selector(&self, event_name: &str) -> Option<B256> {
        self.abi
            .events
            .get(event_name)
            .and_then(|overloads| overloads.first())
            .map(Event::selector)
    }
}

// =============================================================================
// DECODED LOG
// =============================================================================

/// One event parameter with its decoded value.
#[derive(Clone, Debug, PartialEq)]
pub struct EventArgument {
    pub name: String,
    /// Solidity type string, e.g. `uint256`.
    pub ty: String,
    /// Came from a topic rather than the data payload. Indexed dynamic types
    /// (`bytes`, `string`, arrays) only carry their keccak hash.
    pub indexed: bool,
    pub value: DynSolValue,
}

/// A log turned into a named event.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedLog {
    pub event_name: String,
    pub address: Address,
    pub log_index: u64,
    pub block_number: u64,
    pub transaction_hash: B256,
    /// All parameters in declaration order.
    pub arguments: Vec<EventArgument>,
    /// Non-indexed parameters unpacked from the data payload, by name.
    pub output_data: BTreeMap<String, DynSolValue>,
}

impl DecodedLog {
    pub fn argument(&self, name: &str) -> Option<&DynSolValue> {
        self.arguments
            .iter()
            .find(|arg| arg.name == name)
            .map(|arg| &arg.value)
    }

    fn require(&self, name: &str) -> Result<&DynSolValue, DecodeError> {
        self.argument(name)
            .ok_or_else(|| DecodeError::MissingArgument {
                event: self.event_name.clone(),
                name: name.to_string(),
            })
    }

    pub fn address_arg(&self, name: &str) -> Result<Address, DecodeError> {
        match self.require(name)? {
            DynSolValue::Address(address) => Ok(*address),
            _ => Err(type_error(name, "address")),
        }
    }

    pub fn uint_arg(&self, name: &str) -> Result<U256, DecodeError> {
        match self.require(name)? {
            DynSolValue::Uint(value, _) => Ok(*value),
            _ => Err(type_error(name, "uint")),
        }
    }

    /// `bytes` argument. Must be non-indexed to carry the actual payload.
    pub fn bytes_arg(&self, name: &str) -> Result<Vec<u8>, DecodeError> {
        match self.require(name)? {
            DynSolValue::Bytes(bytes) => Ok(bytes.clone()),
            _ => Err(type_error(name, "bytes")),
        }
    }

    /// `bytes32` argument (or any `bytesN`, left-aligned in a word).
    pub fn fixed_bytes_arg(&self, name: &str) -> Result<B256, DecodeError> {
        match self.require(name)? {
            DynSolValue::FixedBytes(word, _) => Ok(*word),
            _ => Err(type_error(name, "bytes32")),
        }
    }
}

fn type_error(name: &str, expected: &'static str) -> DecodeError {
    DecodeError::ArgumentType {
        name: name.to_string(),
        expected,
    }
}
