//! Talking-head ad assembly.
//!
//! This crate provides:
//! - The end-to-end assembly pipeline
//! - Environment-driven configuration
//! - Run-scoped structured logging and metrics
//! - The render service client

pub mod analyzer;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod render;

pub use analyzer::{AnalyzedSource, FfmpegAnalyzer, MediaAnalyzer};
pub use config::{BookendConfig, PipelineConfig};
pub use error::{PipelineError, PipelineResult, Stage};
pub use logging::RunLogger;
pub use pipeline::{AssembledSpec, AssemblyPipeline, RunInputs, RunSummary};
pub use render::{RenderClient, RenderConfig, RenderError, RenderOutput, RenderStatus};
