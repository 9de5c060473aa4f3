//! Run-level mode switches.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct ModeParseError {
    pub kind: &'static str,
    pub value: String,
}

impl ModeParseError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// How the subtitle track is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleMode {
    /// Explicit cues, else speech detection plus transcript alignment
    #[default]
    Auto,
    /// Explicit cues only
    Manual,
    /// Never emit a subtitle track
    None,
}

impl SubtitleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubtitleMode::Auto => "auto",
            SubtitleMode::Manual => "manual",
            SubtitleMode::None => "none",
        }
    }
}

impl fmt::Display for SubtitleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubtitleMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(SubtitleMode::Auto),
            "manual" => Ok(SubtitleMode::Manual),
            "none" => Ok(SubtitleMode::None),
            other => Err(ModeParseError::new("subtitle mode", other)),
        }
    }
}

/// How a video background's length is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundLengthMode {
    /// Speed-adjust flexible videos so they end with the content
    #[default]
    Auto,
    /// Keep native durations; flexible clips get a length only
    Fixed,
}

impl BackgroundLengthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackgroundLengthMode::Auto => "auto",
            BackgroundLengthMode::Fixed => "fixed",
        }
    }
}

impl fmt::Display for BackgroundLengthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackgroundLengthMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(BackgroundLengthMode::Auto),
            "fixed" => Ok(BackgroundLengthMode::Fixed),
            other => Err(ModeParseError::new("background length mode", other)),
        }
    }
}
