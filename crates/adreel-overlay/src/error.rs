//! Overlay error types.

use std::time::Duration;
use thiserror::Error;

use adreel_models::InvalidTransition;

pub type OverlayResult<T> = Result<T, OverlayError>;

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("Job submission failed: {0}")]
    JobSubmission(String),

    #[error("Job {job_id} did not finish within {elapsed:?}")]
    JobTimeout { job_id: String, elapsed: Duration },

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Remote protocol violation: {0}")]
    Protocol(String),

    #[error("Local engine failed: {0}")]
    LocalEngine(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OverlayError {
    pub fn submission(msg: impl Into<String>) -> Self {
        Self::JobSubmission(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn local_engine(msg: impl Into<String>) -> Self {
        Self::LocalEngine(msg.into())
    }

    /// Transient errors worth another status poll.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OverlayError::Network(_))
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            OverlayError::JobSubmission(_) => "submission",
            OverlayError::JobTimeout { .. } => "timeout",
            OverlayError::JobFailed(_) => "failed",
            OverlayError::Protocol(_) => "protocol",
            OverlayError::LocalEngine(_) => "local_engine",
            OverlayError::Network(_) => "network",
            OverlayError::Json(_) => "json",
            OverlayError::Io(_) => "io",
        }
    }
}

impl From<InvalidTransition> for OverlayError {
    fn from(e: InvalidTransition) -> Self {
        OverlayError::Protocol(e.to_string())
    }
}
