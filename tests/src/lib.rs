//! # AVS Operator Test Suite
//!
//! Scenarios that cross crate boundaries.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/integration/
//! │   ├── support.rs     # shared pipeline fixture
//! │   ├── pipeline.rs    # chain event → queue → aggregation → certificate
//! │   ├── reorg.rs       # reorgs racing in-flight aggregation
//! │   └── recovery.rs    # restart on a durable store
//! └── benches/
//!     └── aggregation_benchmarks.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p op-tests
//! cargo test -p op-tests integration::reorg::
//! cargo bench -p op-tests
//! ```

pub mod integration;
