//! Core metrics definitions.
//!
//! All metrics follow Prometheus naming conventions:
//! - `_total` suffix for counters
//! - `_seconds` suffix for histograms measuring duration

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};

/// Register all core metrics with descriptions.
///
/// This ensures metrics appear in `/metrics` with proper metadata.
pub fn register_core_metrics() {
    // History sync metrics
    describe_histogram!(
        "vigil_history_pass_duration_seconds",
        "Duration of one history sync pass (by window)"
    );
    describe_counter!("vigil_history_passes_total", "History sync passes (by window, outcome)");
    describe_counter!(
        "vigil_history_dropped_samples_total",
        "Raw samples dropped because their value did not parse (by key)"
    );
    describe_counter!(
        "vigil_history_gap_warnings_total",
        "Reconciled series that came back sparser than expected (by key)"
    );

    // Ingestion metrics
    describe_counter!(
        "vigil_observations_received_total",
        "Observation messages received from the broker"
    );
    describe_gauge!("vigil_stations", "Stations currently known from the inventory");

    // Output metrics
    describe_counter!("vigil_status_writes_total", "Status artifacts written (by artifact)");
    describe_counter!(
        "vigil_replication_push_failures_total",
        "File pushes that exhausted their retries"
    );
    describe_counter!("vigil_replication_pulls_total", "Files pulled from the manager");
}

/// Helper functions for common metric patterns
pub fn record_pass(window: &str, outcome: &str, duration_secs: f64) {
    histogram!("vigil_history_pass_duration_seconds", "window" => window.to_string())
        .record(duration_secs);
    counter!("vigil_history_passes_total", "window" => window.to_string(), "outcome" => outcome.to_string())
        .increment(1);
}

pub fn record_dropped_sample(key: &str) {
    counter!("vigil_history_dropped_samples_total", "key" => key.to_string()).increment(1);
}

pub fn record_gap_warning(key: &str) {
    counter!("vigil_history_gap_warnings_total", "key" => key.to_string()).increment(1);
}

pub fn record_observation() {
    counter!("vigil_observations_received_total").increment(1);
}

pub fn set_station_count(count: usize) {
    gauge!("vigil_stations").set(count as f64);
}

pub fn record_status_write(artifact: &str) {
    counter!("vigil_status_writes_total", "artifact" => artifact.to_string()).increment(1);
}

pub fn record_push_failure() {
    counter!("vigil_replication_push_failures_total").increment(1);
}

pub fn record_pull() {
    counter!("vigil_replication_pulls_total").increment(1);
}
