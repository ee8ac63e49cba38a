//! # Decode Errors

use alloy_primitives::{Address, B256};
use thiserror::Error;

/// Errors produced while decoding a log.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// No ABI is registered for the emitting contract.
    #[error("No ABI registered for contract {address}")]
    UnknownContract { address: Address },

    /// Anonymous log, nothing to match an event selector against.
    #[error("Log {log_index} from {address} has no topics")]
    MissingTopics { address: Address, log_index: u64 },

    /// Topic 0 does not match any event of the contract's ABI.
    #[error("Unknown event selector {selector} for contract {address}")]
    UnknownEvent { address: Address, selector: B256 },

    /// Topics/data do not match the event's declared encoding.
    #[error("Failed to unpack event {event}: {reason}")]
    Unpack { event: String, reason: String },

    /// Contract interface description could not be parsed.
    #[error("Invalid ABI: {0}")]
    InvalidAbi(String),

    /// Decoded event lacks a named argument.
    #[error("Event {event} has no argument {name}")]
    MissingArgument { event: String, name: String },

    /// Argument exists but has an unexpected Solidity type.
    #[error("Argument {name} is not of type {expected}")]
    ArgumentType { name: String, expected: &'static str },
}

impl DecodeError {
    /// The log simply isn't one we care about. Skip without warning.
    pub fn is_uninteresting(&self) -> bool {
        matches!(
            self,
            DecodeError::UnknownContract { .. }
                | DecodeError::MissingTopics { .. }
                | DecodeError::UnknownEvent { .. }
        )
    }
}
