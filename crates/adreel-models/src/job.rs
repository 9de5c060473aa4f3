//! Overlay job definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::job_status::JobStatus;
use crate::overlay::OverlayShape;

/// Unique identifier for an overlay job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an overlay job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// In-process, blocking
    Local,
    /// Remote accelerator service, polled
    Remote,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Local => "local",
            EngineKind::Remote => "remote",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid job transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// One overlay-generation job.
///
/// Only the coordinator mutates a job; every change goes through
/// [`OverlayJob::advance`], which rejects transitions outside
/// `submitted -> processing* -> completed|failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OverlayJob {
    pub id: JobId,
    pub shape: OverlayShape,
    pub engine: EngineKind,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_asset: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Every status the job has been in, oldest first.
    #[serde(default)]
    pub history: Vec<JobStatus>,
}

impl OverlayJob {
    /// Create a job in the `submitted` state.
    pub fn submitted(id: JobId, shape: OverlayShape, engine: EngineKind) -> Self {
        Self {
            id,
            shape,
            engine,
            status: JobStatus::Submitted,
            result_asset: None,
            error: None,
            history: vec![JobStatus::Submitted],
        }
    }

    /// Move to `next`, validating the transition.
    pub fn advance(&mut self, next: JobStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.history.push(next);
        Ok(())
    }

    /// Mark job as completed with its result asset.
    pub fn complete(&mut self, result_asset: impl Into<String>) -> Result<(), InvalidTransition> {
        self.advance(JobStatus::Completed)?;
        self.result_asset = Some(result_asset.into());
        Ok(())
    }

    /// Mark job as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), InvalidTransition> {
        self.advance(JobStatus::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_generation() {
        let id1 = JobId::new();
        let id2 = JobId::new();
        assert_ne!(id1, id2);
        assert_eq!(JobId::from_string("abc").as_str(), "abc");
    }

    #[test]
    fn test_job_lifecycle() {
        let mut job = OverlayJob::submitted(JobId::new(), OverlayShape::Rect, EngineKind::Remote);
        job.advance(JobStatus::Processing).unwrap();
        job.advance(JobStatus::Processing).unwrap();
        job.complete("https://cdn/overlay.mov").unwrap();

        assert!(job.is_terminal());
        assert_eq!(job.result_asset.as_deref(), Some("https://cdn/overlay.mov"));
        assert_eq!(
            job.history,
            vec![
                JobStatus::Submitted,
                JobStatus::Processing,
                JobStatus::Processing,
                JobStatus::Completed
            ]
        );
    }

    #[test]
    fn test_terminal_job_rejects_updates() {
        let mut job = OverlayJob::submitted(JobId::new(), OverlayShape::Circle, EngineKind::Remote);
        job.fail("engine crashed").unwrap();

        let err = job.advance(JobStatus::Processing).unwrap_err();
        assert_eq!(err.from, JobStatus::Failed);
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("engine crashed"));
    }
}
