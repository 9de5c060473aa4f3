//! Spec error types.

use std::path::PathBuf;
use thiserror::Error;

pub type SpecResult<T> = Result<T, SpecError>;

#[derive(Debug, Error)]
pub enum SpecError {
    /// The tree does not match what the caller expects (bad path,
    /// overlapping clips, unknown label, ...).
    #[error("Invalid spec at {path}: {message}")]
    Validation { path: String, message: String },

    #[error("Invalid blocks config: {0}")]
    BlocksConfig(String),

    #[error("Unknown template: {0}")]
    UnknownTemplate(String),

    #[error("Template file not found: {0}")]
    TemplateNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SpecError {
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn blocks(message: impl Into<String>) -> Self {
        Self::BlocksConfig(message.into())
    }

    /// Errors the pipeline recovers from instead of failing the template.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SpecError::BlocksConfig(_))
    }
}
