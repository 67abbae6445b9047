//! Prometheus metrics for the scanner.
//!
//! This module provides metrics for:
//! - Poll cycle duration and counts
//! - Page fetch latency, retries, and failures
//! - Opportunities detected and sink delivery failures

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{debug, warn};

// === Metric Name Constants ===

/// Poll cycle duration metric name.
pub const METRIC_CYCLE_DURATION: &str = "scan_cycle_duration_ms";
/// Page fetch latency metric name.
pub const METRIC_PAGE_FETCH_LATENCY: &str = "page_fetch_latency_ms";
/// Poll cycles counter metric name.
pub const METRIC_CYCLES: &str = "scan_cycles_total";
/// Pages fetched counter metric name.
pub const METRIC_PAGES_FETCHED: &str = "pages_fetched_total";
/// Races fetched counter metric name.
pub const METRIC_RACES_FETCHED: &str = "races_fetched_total";
/// Fetch retries counter metric name.
pub const METRIC_FETCH_RETRIES: &str = "fetch_retries_total";
/// Terminal fetch failures counter metric name.
pub const METRIC_FETCH_FAILURES: &str = "fetch_failures_total";
/// Opportunities detected counter metric name.
pub const METRIC_OPPORTUNITIES_DETECTED: &str = "opportunities_detected_total";
/// Sink delivery failures counter metric name.
pub const METRIC_NOTIFY_FAILURES: &str = "notify_failures_total";

/// Install the Prometheus recorder, returning the render handle for the
/// `/metrics` endpoint. Returns None (with a warning) if a recorder is
/// already installed.
pub fn install_prometheus() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "failed to install Prometheus recorder, /metrics disabled");
            None
        }
    }
}

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    // Latency histograms
    describe_histogram!(
        METRIC_CYCLE_DURATION,
        "Poll cycle duration in milliseconds"
    );
    describe_histogram!(
        METRIC_PAGE_FETCH_LATENCY,
        "Provider page fetch latency in milliseconds"
    );

    // Counters
    describe_counter!(METRIC_CYCLES, "Total number of poll cycles");
    describe_counter!(METRIC_PAGES_FETCHED, "Total number of pages fetched");
    describe_counter!(METRIC_RACES_FETCHED, "Total number of races fetched");
    describe_counter!(METRIC_FETCH_RETRIES, "Total number of page fetch retries");
    describe_counter!(
        METRIC_FETCH_FAILURES,
        "Total number of terminal page fetch failures"
    );
    describe_counter!(
        METRIC_OPPORTUNITIES_DETECTED,
        "Total number of opportunities detected"
    );
    describe_counter!(
        METRIC_NOTIFY_FAILURES,
        "Total number of sink delivery failures"
    );

    debug!("Metrics initialized");
}

/// Record poll cycle duration.
pub fn record_cycle_duration(start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_CYCLE_DURATION).record(latency_ms);
}

/// Record page fetch latency.
pub fn record_page_fetch_latency(start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_PAGE_FETCH_LATENCY).record(latency_ms);
}

/// Increment the poll cycle counter.
pub fn inc_cycles() {
    counter!(METRIC_CYCLES).increment(1);
}

/// Increment the pages fetched counter.
pub fn inc_pages_fetched() {
    counter!(METRIC_PAGES_FETCHED).increment(1);
}

/// Add to the races fetched counter.
pub fn add_races_fetched(count: usize) {
    counter!(METRIC_RACES_FETCHED).increment(count as u64);
}

/// Increment the fetch retries counter.
pub fn inc_fetch_retries() {
    counter!(METRIC_FETCH_RETRIES).increment(1);
}

/// Increment the terminal fetch failures counter.
pub fn inc_fetch_failures() {
    counter!(METRIC_FETCH_FAILURES).increment(1);
}

/// Increment the opportunities detected counter.
pub fn inc_opportunities_detected() {
    counter!(METRIC_OPPORTUNITIES_DETECTED).increment(1);
}

/// Increment the sink delivery failures counter.
pub fn inc_notify_failures() {
    counter!(METRIC_NOTIFY_FAILURES).increment(1);
}
