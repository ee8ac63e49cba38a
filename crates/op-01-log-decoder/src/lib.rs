//! # Log Decoder (OP-01)
//!
//! Turns a raw chain event log into a typed, named event using a contract
//! interface description (Ethereum JSON ABI).
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): decoding logic and decoded entities, pure
//! - **Ports Layer** (`ports/`): where contract ABIs come from
//!
//! ## Failure classes
//!
//! | Error | Meaning | Poller reaction |
//! |-------|---------|-----------------|
//! | `UnknownContract`, `MissingTopics`, `UnknownEvent` | log is not interesting | skip quietly |
//! | `Unpack` | payload does not match the event encoding | warn and skip |

pub mod domain;
pub mod ports;

pub use domain::decoder::LogDecoder;
pub use domain::entities::{ContractMetadata, DecodedLog, EventArgument};
pub use domain::errors::DecodeError;
pub use ports::{ContractMetadataProvider, StaticContractMetadata};

// Value type of decoded arguments, re-exported so callers need no direct
// dependency on the ABI crates.
pub use alloy_dyn_abi::DynSolValue;
