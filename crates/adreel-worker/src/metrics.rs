//! Pipeline metrics.
//!
//! - Step latency histograms
//! - Template outcomes
//! - Run outcomes

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use adreel_spec::TemplateKind;

/// Metric name constants for consistency.
pub mod names {
    /// Step latency in seconds by step name.
    pub const STEP_SECONDS: &str = "assemble_step_seconds";

    /// Assembled templates by template and outcome.
    pub const TEMPLATES_TOTAL: &str = "assemble_templates_total";

    /// Runs by outcome.
    pub const RUNS_TOTAL: &str = "assemble_runs_total";
}

/// Install a Prometheus recorder serving `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()
}

pub fn record_step(step: &'static str, elapsed_secs: f64) {
    histogram!(names::STEP_SECONDS, "step" => step).record(elapsed_secs);
}

pub fn record_template(template: TemplateKind, success: bool) {
    counter!(
        names::TEMPLATES_TOTAL,
        "template" => template.as_str(),
        "outcome" => if success { "assembled" } else { "failed" }
    )
    .increment(1);
}

pub fn record_run(success: bool) {
    counter!(names::RUNS_TOTAL, "outcome" => if success { "success" } else { "failure" }).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::STEP_SECONDS.ends_with("_seconds"));
        assert!(names::TEMPLATES_TOTAL.starts_with("assemble_"));
        assert!(names::RUNS_TOTAL.ends_with("_total"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_step("probe", 0.25);
        record_template(TemplateKind::Basic, true);
        record_run(false);
    }
}
