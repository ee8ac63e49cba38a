//! # Shared Types Crate
//!
//! Domain entities shared by every operator subsystem.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: `Task`, `BlockInfo` and `RawLog` are defined
//!   once here and flow unchanged from the poller to the store and the
//!   aggregators.
//! - **Chain-native primitives**: addresses and hashes are the `alloy`
//!   primitive types so values coming off an RPC node need no conversion.

pub mod entities;
pub mod errors;

pub use entities::*;
pub use errors::*;
