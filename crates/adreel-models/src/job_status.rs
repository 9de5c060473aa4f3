//! Overlay job status.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Overlay job processing status.
///
/// Valid sequences are `submitted -> processing* -> completed|failed`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Accepted by the engine, not yet picked up
    #[default]
    Submitted,
    /// Actively being processed
    Processing,
    /// Finished with a result asset
    Completed,
    /// Finished without a result
    #[serde(alias = "error")]
    Failed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Submitted => "submitted",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `next` may follow `self`.
    ///
    /// `processing` may repeat; terminal states accept nothing.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match self {
            JobStatus::Submitted | JobStatus::Processing => next != JobStatus::Submitted,
            JobStatus::Completed | JobStatus::Failed => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
