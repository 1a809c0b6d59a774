//! Prometheus metrics for the block rate monitor.
//!
//! Metrics live in the default registry and are registered on first use. Registration is
//! best-effort: a metric that fails to register still records, it is just not exported.

use lazy_static::lazy_static;
use prometheus::{Counter, Encoder, Gauge, TextEncoder};

fn register_gauge_best_effort(name: &str, help: &str) -> Gauge {
    let gauge = Gauge::new(name, help)
        .unwrap_or_else(|_| Gauge::new("blockrate_invalid_metric", "Invalid").unwrap());
    let _ = prometheus::register(Box::new(gauge.clone()));
    gauge
}

fn register_counter_best_effort(name: &str, help: &str) -> Counter {
    let counter = Counter::new(name, help)
        .unwrap_or_else(|_| Counter::new("blockrate_invalid_counter", "Invalid").unwrap());
    let _ = prometheus::register(Box::new(counter.clone()));
    counter
}

lazy_static! {
    static ref POLLS_TOTAL: Counter =
        register_counter_best_effort("blockrate_polls_total", "Polls attempted");
    static ref FETCH_ERRORS_TOTAL: Counter =
        register_counter_best_effort("blockrate_fetch_errors_total", "Polls that failed to fetch");
    static ref GLITCH_RESETS_TOTAL: Counter = register_counter_best_effort(
        "blockrate_glitch_resets_total",
        "Window resets caused by implausible block heights",
    );
    static ref BLOCKS_PER_SECOND: Gauge = register_gauge_best_effort(
        "blockrate_blocks_per_second",
        "Displayed block rate; -1 while calculating",
    );
    static ref RAW_RATE: Gauge = register_gauge_best_effort(
        "blockrate_raw_rate",
        "Rate computed by the last update, including values discarded after a reset; -1 when none",
    );
    static ref WINDOW_SAMPLES: Gauge =
        register_gauge_best_effort("blockrate_window_samples", "Samples in the rate window");
    static ref LAST_HEIGHT: Gauge =
        register_gauge_best_effort("blockrate_last_height", "Last accepted block height");
    static ref ERROR_COUNT: Gauge = register_gauge_best_effort(
        "blockrate_error_count",
        "Failed polls since the last successful one",
    );
}

/// Snapshot of estimator state published after every successful update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimateSnapshot {
    /// Rate adopted for display.
    pub displayed_rate: Option<f64>,
    /// Rate computed by the update, even when discarded.
    pub raw_rate: Option<f64>,
    /// Samples currently in the window.
    pub window_samples: usize,
    /// Last accepted height.
    pub last_height: u64,
}

/// Counts one poll attempt.
pub fn record_poll() {
    POLLS_TOTAL.inc();
}

/// Counts one failed poll and publishes the current error count.
pub fn record_fetch_error(error_count: u32) {
    FETCH_ERRORS_TOTAL.inc();
    ERROR_COUNT.set(f64::from(error_count));
}

/// Counts one glitch-triggered window reset.
pub fn record_glitch_reset() {
    GLITCH_RESETS_TOTAL.inc();
}

/// Publishes estimator state after a successful update.
pub fn record_estimate(snapshot: EstimateSnapshot) {
    BLOCKS_PER_SECOND.set(snapshot.displayed_rate.unwrap_or(-1.0));
    RAW_RATE.set(snapshot.raw_rate.unwrap_or(-1.0));
    WINDOW_SAMPLES.set(snapshot.window_samples as f64);
    LAST_HEIGHT.set(snapshot.last_height as f64);
    ERROR_COUNT.set(0.0);
}

/// Gathers all metrics in Prometheus text format.
pub fn gather() -> Vec<u8> {
    let _ = &*POLLS_TOTAL;
    let _ = &*FETCH_ERRORS_TOTAL;
    let _ = &*GLITCH_RESETS_TOTAL;
    let _ = &*BLOCKS_PER_SECOND;
    let _ = &*RAW_RATE;
    let _ = &*WINDOW_SAMPLES;
    let _ = &*LAST_HEIGHT;
    let _ = &*ERROR_COUNT;

    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap_or(());
    buffer
}
