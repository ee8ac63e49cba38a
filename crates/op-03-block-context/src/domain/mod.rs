//! # Domain Layer

pub mod context;
pub mod manager;
