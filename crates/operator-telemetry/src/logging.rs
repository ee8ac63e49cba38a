//! Structured logging.
//!
//! Every failure point in the runtime logs through `tracing` with a fixed set
//! of field names so entries can be joined without replaying the pipeline:
//! - `chain_id`: chain the event came from
//! - `block_number`: source block
//! - `task_id`: task identifier
//! - `avs`: owning AVS address

use crate::{TelemetryConfig, TelemetryError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Handle returned once the global subscriber is installed.
#[derive(Debug)]
pub struct StructuredLogger {
    service_name: String,
}

impl StructuredLogger {
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

/// Install the global `tracing` subscriber.
///
/// Fails if a subscriber is already installed or the filter string is invalid.
pub fn init_logging(config: &TelemetryConfig) -> Result<StructuredLogger, TelemetryError> {
    let env_filter = EnvFilter::try_new(&config.log_level)
        .map_err(|e| TelemetryError::Config(format!("invalid log filter: {}", e)))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match (config.console_output, config.json_logs) {
        (false, _) => registry.try_init(),
        (true, true) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        (true, false) => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .try_init(),
    };
    result.map_err(|e| TelemetryError::LoggerInit(e.to_string()))?;

    tracing::info!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Structured logging initialized"
    );

    Ok(StructuredLogger {
        service_name: config.service_name.clone(),
    })
}

/// Log a task-related event with standard fields.
#[macro_export]
macro_rules! log_task_event {
    ($level:ident, $msg:expr, $task:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            task_id = %$task.task_id,
            avs = %$task.avs_address,
            chain_id = %$task.chain_id,
            block_number = $task.source_block_number,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a block-related event with standard fields.
#[macro_export]
macro_rules! log_block_event {
    ($level:ident, $msg:expr, $chain_id:expr, $block_number:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            chain_id = %$chain_id,
            block_number = $block_number,
            $($($field)*,)?
            $msg
        )
    };
}
