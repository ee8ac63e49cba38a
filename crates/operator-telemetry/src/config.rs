//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for logging and metrics.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive string
    pub log_level: String,

    /// Whether to write logs to stdout at all
    pub console_output: bool,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,

    /// Port the embedding process should expose `/metrics` on
    pub metrics_port: u16,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "avs-operator".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
            metrics_port: 9100,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `OPERATOR_SERVICE_NAME`: Service name (default: avs-operator)
    /// - `OPERATOR_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `OPERATOR_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `OPERATOR_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    /// - `OPERATOR_METRICS_PORT`: Prometheus metrics port (default: 9100)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("OPERATOR_SERVICE_NAME")
                .unwrap_or_else(|_| "avs-operator".to_string()),

            log_level: env::var("OPERATOR_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("OPERATOR_CONSOLE_OUTPUT")
                .map(|v| parse_flag(&v, true))
                .unwrap_or(true),

            json_logs: env::var("OPERATOR_JSON_LOGS")
                .map(|v| parse_flag(&v, false))
                .unwrap_or(is_container),

            metrics_port: env::var("OPERATOR_METRICS_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(9100),
        }
    }

    /// Configuration scoped to one chain, e.g. `avs-operator-chain-17000`.
    pub fn for_chain(chain_id: u64) -> Self {
        let mut config = Self::from_env();
        config.service_name = format!("{}-chain-{}", config.service_name, chain_id);
        config
    }
}

/// Interpret a boolean-ish environment value, falling back to `default` for
/// anything unrecognised.
fn parse_flag(value: &str, default: bool) -> bool {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}
