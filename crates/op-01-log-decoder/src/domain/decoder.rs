//! # Log Decoder
//!
//! Indexed parameters come from topics, non-indexed ones are ABI-unpacked
//! from the data payload. Stateless once built.

use super::entities::{ContractMetadata, DecodedLog, EventArgument};
use super::errors::DecodeError;
use crate::ports::ContractMetadataProvider;
use alloy_dyn_abi::EventExt;
use alloy_json_abi::Event;
use alloy_primitives::{Address, B256};
use shared_types::RawLog;
use std::collections::{BTreeMap, HashMap};

/// Events of one contract, keyed by selector (topic 0).
#[derive(Clone, Debug)]
struct ContractEvents {
    name: String,
    by_selector: HashMap<B256, Event>,
}

/// Decoder over a fixed set of contract ABIs.
#[derive(Clone, Debug, Default)]
pub struct LogDecoder {
    contracts: HashMap<Address, ContractEvents>,
}

impl LogDecoder {
    pub fn new(contracts: impl IntoIterator<Item = ContractMetadata>) -> Self {
        let contracts = contracts
            .into_iter()
            .map(|metadata| {
                // Anonymous events have no selector topic and can't be matched.
                let by_selector = metadata
                    .abi
                    .events()
                    .filter(|event| !event.anonymous)
                    .map(|event| (event.selector(), event.clone()))
                    .collect();
                (
                    metadata.address,
                    ContractEvents {
                        name: metadata.name,
                        by_selector,
                    },
                )
            })
            .collect();
        Self { contracts }
    }

    pub fn from_provider(provider: &dyn ContractMetadataProvider) -> Self {
        Self::new(provider.contracts())
    }

    pub fn knows_contract(&self, address: &Address) -> bool {
        self.contracts.contains_key(address)
    }

    /// Name registered for a contract, for log context.
    pub fn contract_name(&self, address: &Address) -> Option<&str> {
        self.contracts.get(address).map(|c| c.name.as_str())
    }

    /// Decode one raw log.
    pub fn decode(&self, log: &RawLog) -> Result<DecodedLog, DecodeError> {
        let contract = self
            .contracts
            .get(&log.address)
            .ok_or(DecodeError::UnknownContract {
                address: log.address,
            })?;

        let selector = log.topics.first().ok_or(DecodeError::MissingTopics {
            address: log.address,
            log_index: log.log_index,
        })?;

        let event = contract
            .by_selector
            .get(selector)
            .ok_or(DecodeError::UnknownEvent {
                address: log.address,
                selector: *selector,
            })?;

        let decoded = event
            .decode_log_parts(log.topics.iter().copied(), &log.data, true)
            .map_err(|e| DecodeError::Unpack {
                event: event.name.clone(),
                reason: e.to_string(),
            })?;

        let mut indexed = decoded.indexed.into_iter();
        let mut body = decoded.body.into_iter();
        let mut arguments = Vec::with_capacity(event.inputs.len());
        let mut output_data = BTreeMap::new();

        for param in &event.inputs {
            let source = if param.indexed {
                indexed.next()
            } else {
                body.next()
            };
            let value = source.ok_or_else(|| DecodeError::Unpack {
                event: event.name.clone(),
                reason: format!("missing value for parameter {}", param.name),
            })?;

            if !param.indexed {
                output_data.insert(param.name.clone(), value.clone());
            }
            arguments.push(EventArgument {
                name: param.name.clone(),
                ty: param.ty.clone(),
                indexed: param.indexed,
                value,
            });
        }

        Ok(DecodedLog {
            event_name: event.name.clone(),
            address: log.address,
            log_index: log.log_index,
            block_number: log.block_number,
            transaction_hash: log.transaction_hash,
            arguments,
            output_data,
        })
    }
}
