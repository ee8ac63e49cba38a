//! # Block Context Manager (OP-03)
//!
//! Per-block cancellable, deadline-bound contexts. The chain poller binds
//! every task to its source block's context; a reorg that abandons the block
//! cancels the context and with it all work downstream of the task.
//!
//! ## Lifecycle
//!
//! ```text
//! created → active → {cancelled | expired} → reaped
//! ```
//!
//! Reaping happens in `cancel_block` (immediately) or in the periodic sweep.

pub mod domain;

pub use domain::context::BlockContext;
pub use domain::manager::{BlockContextConfig, BlockContextManager};

// Callers create the root token the manager derives from.
pub use tokio_util::sync::CancellationToken;
