//! Prometheus metrics for the operator runtime.
//!
//! All metrics follow the naming convention: `avs_<component>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., tasks_discovered_total)
//! - **Gauge**: Value that can go up or down (e.g., last_processed_block)
//! - **Histogram**: Distribution of values (e.g., poll_tick_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, CounterVec, Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, Opts,
    Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // CHAIN POLLER METRICS
    // =========================================================================

    /// Blocks fully processed (logs handled, checkpoint advanced)
    pub static ref BLOCKS_PROCESSED: CounterVec = CounterVec::new(
        Opts::new("avs_poller_blocks_processed_total", "Blocks fully processed by the poller"),
        &["chain_id"]
    ).expect("metric creation failed");

    /// Last processed block per chain
    pub static ref LAST_PROCESSED_BLOCK: GaugeVec = GaugeVec::new(
        Opts::new("avs_poller_last_processed_block", "Checkpointed block number"),
        &["chain_id"]
    ).expect("metric creation failed");

    /// Task-creation events turned into stored tasks
    pub static ref TASKS_DISCOVERED: CounterVec = CounterVec::new(
        Opts::new("avs_poller_tasks_discovered_total", "Tasks discovered from chain events"),
        &["chain_id"]
    ).expect("metric creation failed");

    /// Tasks that could not be handed to the work queue
    pub static ref TASKS_DROPPED: CounterVec = CounterVec::new(
        Opts::new("avs_poller_tasks_dropped_total", "Tasks not enqueued (left pending in store)"),
        &["chain_id", "reason"]  // reason: queue_full/queue_closed
    ).expect("metric creation failed");

    /// Recovery pass outcomes
    pub static ref TASKS_RECOVERED: CounterVec = CounterVec::new(
        Opts::new("avs_poller_tasks_recovered_total", "Tasks seen by recovery passes"),
        &["chain_id", "outcome"]  // outcome: enqueued/expired/deferred
    ).expect("metric creation failed");

    /// Reorgs detected and rolled back
    pub static ref REORGS_DETECTED: CounterVec = CounterVec::new(
        Opts::new("avs_poller_reorgs_total", "Chain reorganizations handled"),
        &["chain_id"]
    ).expect("metric creation failed");

    /// Depth of handled reorgs (abandoned block count)
    pub static ref REORG_DEPTH: Histogram = Histogram::with_opts(
        HistogramOpts::new("avs_poller_reorg_depth_blocks", "Blocks abandoned per reorg")
            .buckets(vec![1.0, 2.0, 3.0, 5.0, 8.0, 13.0, 21.0, 34.0, 64.0])
    ).expect("metric creation failed");

    /// Failed poll ticks by error kind
    pub static ref POLL_ERRORS: CounterVec = CounterVec::new(
        Opts::new("avs_poller_errors_total", "Poll ticks that failed"),
        &["chain_id", "kind"]  // kind: transient/fatal
    ).expect("metric creation failed");

    /// Logs that could not be decoded
    pub static ref LOG_DECODE_FAILURES: CounterVec = CounterVec::new(
        Opts::new("avs_decoder_failures_total", "Logs skipped by the decoder"),
        &["reason"]  // reason: uninteresting/unpack
    ).expect("metric creation failed");

    /// Poll tick duration
    pub static ref POLL_TICK_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new("avs_poller_tick_duration_seconds", "Time spent in one poll tick")
            .buckets(exponential_buckets(0.001, 2.0, 14).expect("valid buckets"))
    ).expect("metric creation failed");

    // =========================================================================
    // BLOCK CONTEXT METRICS
    // =========================================================================

    /// Live block contexts
    pub static ref BLOCK_CONTEXTS_LIVE: Gauge = Gauge::new(
        "avs_block_contexts_live",
        "Block contexts currently tracked"
    ).expect("metric creation failed");

    // =========================================================================
    // AGGREGATION METRICS
    // =========================================================================

    /// Signature submissions by scheme and result
    pub static ref SIGNATURES_PROCESSED: CounterVec = CounterVec::new(
        Opts::new("avs_aggregation_signatures_total", "Operator signatures processed"),
        &["scheme", "result"]  // result: accepted/unknown_operator/duplicate/invalid/expired/...
    ).expect("metric creation failed");

    /// Certificates generated
    pub static ref CERTIFICATES_GENERATED: CounterVec = CounterVec::new(
        Opts::new("avs_aggregation_certificates_total", "Final certificates generated"),
        &["scheme"]
    ).expect("metric creation failed");

    /// Terminal task outcomes
    pub static ref TASK_OUTCOMES: CounterVec = CounterVec::new(
        Opts::new("avs_tasks_finished_total", "Tasks reaching a terminal state"),
        &["outcome"]  // outcome: completed/failed
    ).expect("metric creation failed");
}

/// Handle proving metrics were registered.
#[derive(Debug)]
pub struct MetricsHandle {
    _registered: usize,
}

/// Register all metrics with the global registry.
///
/// Metrics can be updated before registration; they just won't be exported.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Poller
        Box::new(BLOCKS_PROCESSED.clone()),
        Box::new(LAST_PROCESSED_BLOCK.clone()),
        Box::new(TASKS_DISCOVERED.clone()),
        Box::new(TASKS_DROPPED.clone()),
        Box::new(TASKS_RECOVERED.clone()),
        Box::new(REORGS_DETECTED.clone()),
        Box::new(REORG_DEPTH.clone()),
        Box::new(POLL_ERRORS.clone()),
        Box::new(LOG_DECODE_FAILURES.clone()),
        Box::new(POLL_TICK_DURATION.clone()),
        // Block contexts
        Box::new(BLOCK_CONTEXTS_LIVE.clone()),
        // Aggregation
        Box::new(SIGNATURES_PROCESSED.clone()),
        Box::new(CERTIFICATES_GENERATED.clone()),
        Box::new(TASK_OUTCOMES.clone()),
    ];

    let registered = metrics.len();
    for metric in metrics {
        REGISTRY
            .register(metric)
            .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    }

    Ok(MetricsHandle {
        _registered: registered,
    })
}

/// Encode all metrics as Prometheus text format.
pub fn gather_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

/// Timer guard for automatic histogram observation.
pub struct HistogramTimer {
    histogram: Histogram,
    start: std::time::Instant,
}

impl HistogramTimer {
    /// Start a new timer for the given histogram.
    pub fn new(histogram: &Histogram) -> Self {
        Self {
            histogram: histogram.clone(),
            start: std::time::Instant::now(),
        }
    }
}

impl Drop for HistogramTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        self.histogram.observe(duration);
    }
}

/// Start timing for a histogram. Observation happens on drop.
#[macro_export]
macro_rules! time_histogram {
    ($histogram:expr) => {
        $crate::metrics::HistogramTimer::new(&$histogram)
    };
}
