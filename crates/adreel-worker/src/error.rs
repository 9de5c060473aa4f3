//! Pipeline error types.

use std::fmt;

use thiserror::Error;

use adreel_media::MediaError;
use adreel_models::OverlayShape;
use adreel_spec::{SpecError, TemplateKind};

use crate::render::RenderError;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Pipeline stage an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Config,
    Probe,
    Subtitles,
    Overlay,
    Template,
    Output,
    Render,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Config => "config",
            Stage::Probe => "probe",
            Stage::Subtitles => "subtitles",
            Stage::Overlay => "overlay",
            Stage::Template => "template",
            Stage::Output => "output",
            Stage::Render => "render",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Probe failed for {asset}: {source}")]
    Probe {
        asset: &'static str,
        #[source]
        source: MediaError,
    },

    #[error("Invalid {asset}: {message}")]
    InvalidAsset { asset: &'static str, message: String },

    #[error("Overlay '{shape}' unavailable for template {template}: {reason}")]
    MissingOverlay {
        template: TemplateKind,
        shape: OverlayShape,
        reason: String,
    },

    #[error("Template {template} failed: {source}")]
    Template {
        template: TemplateKind,
        #[source]
        source: SpecError,
    },

    #[error("Writing spec for {template} failed: {source}")]
    Output {
        template: TemplateKind,
        #[source]
        source: SpecError,
    },

    #[error("Render failed: {0}")]
    Render(#[from] RenderError),

    #[error("No template could be assembled ({stage} stage): {summary}")]
    NoTemplates { stage: Stage, summary: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_asset(asset: &'static str, msg: impl Into<String>) -> Self {
        Self::InvalidAsset {
            asset,
            message: msg.into(),
        }
    }

    /// Stage the failure happened in.
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Config(_) => Stage::Config,
            PipelineError::Probe { .. } | PipelineError::InvalidAsset { .. } => Stage::Probe,
            PipelineError::MissingOverlay { .. } => Stage::Overlay,
            PipelineError::Template { .. } => Stage::Template,
            PipelineError::Output { .. } | PipelineError::Io(_) => Stage::Output,
            PipelineError::Render(_) => Stage::Render,
            PipelineError::NoTemplates { stage, .. } => *stage,
        }
    }

    /// Check if re-running the same inputs could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Probe { source, .. } => source.is_retryable(),
            PipelineError::Render(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<SpecError> for PipelineError {
    fn from(e: SpecError) -> Self {
        match e {
            SpecError::UnknownTemplate(name) => Self::Config(format!("unknown template '{name}'")),
            other => Self::Config(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_tagging() {
        assert_eq!(PipelineError::config("x").stage(), Stage::Config);
        assert_eq!(PipelineError::invalid_asset("head", "image").stage(), Stage::Probe);
        let err = PipelineError::MissingOverlay {
            template: TemplateKind::Circle,
            shape: OverlayShape::Circle,
            reason: "engine exited with 1".into(),
        };
        assert_eq!(err.stage(), Stage::Overlay);
        assert!(err.to_string().contains("circle"));
    }

    #[test]
    fn test_no_templates_keeps_stage() {
        let err = PipelineError::NoTemplates {
            stage: Stage::Overlay,
            summary: "overlay: cutout failed".into(),
        };
        assert_eq!(err.stage(), Stage::Overlay);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_unknown_template_is_config_error() {
        let err: PipelineError = SpecError::UnknownTemplate("split".into()).into();
        assert!(matches!(err, PipelineError::Config(msg) if msg.contains("split")));
    }
}
