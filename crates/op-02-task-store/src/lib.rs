//! # Persisted Task/Block Store (OP-02)
//!
//! Durable state behind task ingestion:
//!
//! - tasks and their lifecycle status, keyed by `(AVS, TaskId)`
//! - a sliding window of recently processed blocks, keyed by
//!   `(AVS, ChainId, Number)`, used for reorg ancestor search
//! - the last-processed-block checkpoint per `(AVS, ChainId)`
//! - operator-set configuration (curve and threshold)
//!
//! ## Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | Task creation is idempotent | `save_pending_task` never overwrites |
//! | Completed/Failed are terminal | `update_task_status` validates transitions |
//! | One writer per task | status updates are a single critical section |
//!
//! ## Backends
//!
//! - `InMemoryTaskStore` - reference implementation, tests
//! - `RocksDbTaskStore` - durable, behind the `rocksdb` feature

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::memory::InMemoryTaskStore;
#[cfg(feature = "rocksdb")]
pub use adapters::rocksdb::{RocksDbConfig, RocksDbTaskStore};
pub use domain::entities::{CurveType, OperatorSetConfig, MAX_THRESHOLD_BIPS};
pub use domain::errors::StoreError;
pub use ports::TaskStore;
