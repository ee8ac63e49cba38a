//! # Chain Poller (OP-04)
//!
//! Reorg-resilient ingestion of task-creation events for one AVS on one
//! chain.
//!
//! ## Guarantees
//!
//! | Property | Mechanism |
//! |----------|-----------|
//! | At-least-once per task | block committed only after its logs are handled |
//! | No duplicate tasks | `save_pending_task` is idempotent per task id |
//! | Reorg safety | parent-hash check, ancestor walk, context cancellation |
//! | Crash recovery | checkpoint resume, re-offer of unfinished tasks |
//! | Bounded memory | fixed-capacity queue, pruned block window |
//!
//! ## Crate Structure
//!
//! - `domain/` - configuration, errors, task-event mapping
//! - `ports/` - `ChainClient`
//! - `queue` - bounded hand-off to aggregation
//! - `service/` - the poll loop, reorg handling, recovery

pub mod domain;
pub mod ports;
pub mod queue;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use domain::config::PollerConfig;
pub use domain::errors::{ChainClientError, PollerError};
pub use domain::task_event::{task_from_event, task_mailbox_metadata, TASK_CREATED_SIGNATURE};
pub use ports::ChainClient;
pub use queue::{task_queue, EnqueueError, TaskReceiver, TaskSender};
pub use service::{ChainPoller, ChainPollerHandle, RecoveryReport, TickOutcome};
