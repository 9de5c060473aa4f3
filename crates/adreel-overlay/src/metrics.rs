//! Overlay metrics collection.
//!
//! - Cache lookups by result
//! - Job outcomes by engine
//! - Remote-to-local fallbacks by reason
//! - Job latency histograms

use metrics::{counter, histogram};

use adreel_models::{EngineKind, OverlayShape};

/// Metric name constants for consistency.
pub mod names {
    /// Cache lookups by result (hit/miss).
    pub const CACHE_LOOKUPS_TOTAL: &str = "overlay_cache_lookups_total";

    /// Finished overlay jobs by engine, shape and outcome.
    pub const JOBS_TOTAL: &str = "overlay_jobs_total";

    /// Remote jobs that fell back to the local engine, by reason.
    pub const FALLBACKS_TOTAL: &str = "overlay_fallbacks_total";

    /// Job latency in seconds by engine.
    pub const JOB_SECONDS: &str = "overlay_job_seconds";
}

pub fn record_cache_lookup(hit: bool) {
    counter!(
        names::CACHE_LOOKUPS_TOTAL,
        "result" => if hit { "hit" } else { "miss" }
    )
    .increment(1);
}

/// Record a finished job attempt on one engine.
pub fn record_job(engine: EngineKind, shape: OverlayShape, success: bool, elapsed_secs: f64) {
    let engine = engine.as_str();

    counter!(
        names::JOBS_TOTAL,
        "engine" => engine,
        "shape" => shape.as_str(),
        "outcome" => if success { "completed" } else { "failed" }
    )
    .increment(1);

    histogram!(names::JOB_SECONDS, "engine" => engine).record(elapsed_secs);
}

pub fn record_fallback(reason: &'static str) {
    counter!(names::FALLBACKS_TOTAL, "reason" => reason).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::CACHE_LOOKUPS_TOTAL.starts_with("overlay_"));
        assert!(names::JOBS_TOTAL.contains("jobs"));
        assert!(names::FALLBACKS_TOTAL.contains("fallbacks"));
        assert!(names::JOB_SECONDS.ends_with("_seconds"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_cache_lookup(true);
        record_job(EngineKind::Remote, OverlayShape::Circle, false, 1.5);
        record_fallback("timeout");
    }
}
