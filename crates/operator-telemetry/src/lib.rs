//! # Operator Telemetry
//!
//! Logging and metrics for the operator runtime.
//!
//! ## Components
//!
//! - **Logging**: `tracing` subscriber with env filter, plain or JSON output
//! - **Metrics**: Prometheus counters/gauges for the poller, block contexts
//!   and aggregation
//!
//! ## Usage
//!
//! ```rust,ignore
//! use operator_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! // Logs and metrics are now being collected
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `OPERATOR_SERVICE_NAME` | `avs-operator` | Service name in logs |
//! | `OPERATOR_LOG_LEVEL` | `info` | Log level filter |
//! | `OPERATOR_JSON_LOGS` | `false` | JSON log output |
//! | `OPERATOR_METRICS_PORT` | `9100` | Metrics port |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::{init_logging, StructuredLogger};
pub use metrics::{
    gather_metrics, register_metrics, HistogramTimer, MetricsHandle, BLOCKS_PROCESSED,
    BLOCK_CONTEXTS_LIVE, CERTIFICATES_GENERATED, LAST_PROCESSED_BLOCK, LOG_DECODE_FAILURES,
    POLL_ERRORS, POLL_TICK_DURATION, REORGS_DETECTED, REORG_DEPTH, SIGNATURES_PROCESSED,
    TASKS_DISCOVERED, TASKS_DROPPED, TASKS_RECOVERED, TASK_OUTCOMES,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logger: {0}")]
    LoggerInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and metrics.
///
/// Returns a guard that should be held for the lifetime of the process.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = register_metrics()?;
    let logger = init_logging(&config)?;

    Ok(TelemetryGuard {
        _logger: logger,
        _metrics: metrics,
    })
}

/// Guard that keeps telemetry active.
#[derive(Debug)]
pub struct TelemetryGuard {
    _logger: StructuredLogger,
    _metrics: MetricsHandle,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}
