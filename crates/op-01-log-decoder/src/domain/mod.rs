//! # Domain Layer
//!
//! Pure decoding logic with no I/O dependencies.

pub mod decoder;
pub mod entities;
pub mod errors;
