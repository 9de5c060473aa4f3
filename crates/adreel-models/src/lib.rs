//! Shared data models for the AdReel assembly pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Probed media assets and canvas fit modes
//! - Subtitle cues and subtitle modes
//! - Render-spec trees (tracks, clips, transitions)
//! - Timeline block configuration
//! - Overlay jobs and their status state machine

pub mod blocks;
pub mod canvas;
pub mod clip;
pub mod job;
pub mod job_status;
pub mod media;
pub mod mode;
pub mod overlay;
pub mod render_spec;
pub mod subtitle;

// Re-export common types
pub use blocks::{BlocksConfig, TemplateBlocks};
pub use canvas::{AspectRatio, AspectRatioParseError, FitMode};
pub use clip::{ClipNode, ClipType, Transition};
pub use job::{EngineKind, InvalidTransition, JobId, OverlayJob};
pub use job_status::JobStatus;
pub use media::{AssetKind, MediaAsset};
pub use mode::{BackgroundLengthMode, ModeParseError, SubtitleMode};
pub use overlay::{CircleParams, CutoutModel, OverlayContainer, OverlayParams, OverlayShape};
pub use render_spec::{RenderSpec, Track, TrackRole};
pub use subtitle::SubtitleCue;
