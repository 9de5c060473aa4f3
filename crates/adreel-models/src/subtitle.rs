//! Subtitle cue model.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single timed subtitle.
///
/// A subtitle track is a `Vec<SubtitleCue>` sorted by `start` in which no
/// cue ends after the next one begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubtitleCue {
    pub start: f64,
    pub length: f64,
    pub text: String,
    /// Presentation hints carried through from explicit cue files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
}

impl SubtitleCue {
    pub fn new(start: f64, length: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            length,
            text: text.into(),
            position: None,
            offset: None,
            width: None,
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.length
    }
}

/// End of the last cue in a track, 0.0 for an empty track.
pub fn track_end(cues: &[SubtitleCue]) -> f64 {
    cues.iter().map(SubtitleCue::end).fold(0.0, f64::max)
}

/// Check the ordering invariant: sorted by start, no overlap.
pub fn is_well_formed(cues: &[SubtitleCue]) -> bool {
    cues.windows(2)
        .all(|pair| pair[0].start <= pair[1].start && pair[0].end() <= pair[1].start + 1e-9)
}
