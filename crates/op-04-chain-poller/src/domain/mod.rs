//! # Domain Layer

pub mod config;
pub mod errors;
pub mod task_event;
