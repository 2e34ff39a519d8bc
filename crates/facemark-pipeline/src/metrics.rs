//! Pipeline metrics.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "facemark_cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "facemark_cache_misses_total";
    pub const CACHE_ERRORS_TOTAL: &str = "facemark_cache_errors_total";
    pub const PIPELINE_DURATION_SECONDS: &str = "facemark_pipeline_duration_seconds";
    pub const FACES_DETECTED_TOTAL: &str = "facemark_faces_detected_total";
}

pub fn record_cache_hit() {
    counter!(names::CACHE_HITS_TOTAL).increment(1);
}

pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

/// Record a failed cache operation (`get` or `set`).
pub fn record_cache_error(operation: &str) {
    let labels = [("operation", operation.to_string())];
    counter!(names::CACHE_ERRORS_TOTAL, &labels).increment(1);
}

/// Record the end-to-end duration of a run.
pub fn record_pipeline_duration(outcome: &str, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    histogram!(names::PIPELINE_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_faces_detected(count: usize) {
    counter!(names::FACES_DETECTED_TOTAL).increment(count as u64);
}
