//! Structured run logging utilities.
//!
//! Provides consistent, structured logging for one assembly run with
//! tracing spans and contextual information.

use std::future::Future;
use std::time::Instant;

use tracing::{error, info, warn, Span};

use crate::metrics;

/// Run logger for structured logging with consistent formatting.
///
/// Every event carries the run ID and the operation name.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    operation: String,
}

impl RunLogger {
    /// Create a new logger for a run and operation.
    ///
    /// # Arguments
    /// * `run_id` - The unique identifier for the run
    /// * `operation` - The type of operation (e.g., "assemble", "render")
    pub fn new(run_id: &str, operation: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run completed: {}", message
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "run",
            run_id = %self.run_id,
            operation = %self.operation
        )
    }

    /// Await `step`, logging and recording how long it took.
    pub async fn timed<F, T>(&self, step: &'static str, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let started = Instant::now();
        let output = fut.await;
        let elapsed = started.elapsed();
        metrics::record_step(step, elapsed.as_secs_f64());
        info!(
            run_id = %self.run_id,
            step,
            elapsed_ms = elapsed.as_millis() as u64,
            "Step finished"
        );
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_logger_creation() {
        let logger = RunLogger::new("run-123", "assemble");
        assert_eq!(logger.run_id(), "run-123");
        assert_eq!(logger.operation(), "assemble");
    }

    #[tokio::test]
    async fn test_timed_passes_output_through() {
        let logger = RunLogger::new("run-1", "assemble");
        let value = logger.timed("probe", async { 42 }).await;
        assert_eq!(value, 42);
    }
}
