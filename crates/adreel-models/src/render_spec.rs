//! Render-spec tree handed to the render service.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canvas::FitMode;
use crate::clip::ClipNode;
use crate::subtitle::SubtitleCue;

/// Role of a track in the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TrackRole {
    /// The primary sequence intros and outros are attached to
    Main,
    #[default]
    Overlay,
}

impl fmt::Display for TrackRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackRole::Main => f.write_str("main"),
            TrackRole::Overlay => f.write_str("overlay"),
        }
    }
}

/// A named, ordered sequence of clips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Track {
    pub name: String,
    #[serde(default)]
    pub role: TrackRole,
    #[serde(default)]
    pub clips: Vec<ClipNode>,
}

impl Track {
    pub fn new(name: impl Into<String>, role: TrackRole) -> Self {
        Self {
            name: name.into(),
            role,
            clips: Vec::new(),
        }
    }

    pub fn with_clip(mut self, clip: ClipNode) -> Self {
        self.clips.push(clip);
        self
    }

    /// Largest known clip end on this track.
    ///
    /// Clips without a length contribute their start.
    pub fn known_end(&self) -> f64 {
        self.clips
            .iter()
            .map(|clip| clip.end().unwrap_or(clip.start))
            .fold(0.0, f64::max)
    }
}

/// The full timeline description.
///
/// Tracks are listed top-most first. Fields the pipeline does not touch
/// (output format, resolution, fonts, ...) are preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RenderSpec {
    #[serde(default)]
    pub tracks: Vec<Track>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subtitles: Vec<SubtitleCue>,
    /// Fill color behind letterboxed assets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle_theme: Option<String>,
    /// Overall length, set once durations are reconciled
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RenderSpec {
    pub fn track(&self, name: &str) -> Option<&Track> {
        self.tracks.iter().find(|track| track.name == name)
    }

    pub fn track_mut(&mut self, name: &str) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|track| track.name == name)
    }

    /// Index of the main track: the first one marked `main`, else the first.
    pub fn main_track_index(&self) -> Option<usize> {
        self.tracks
            .iter()
            .position(|track| track.role == TrackRole::Main)
            .or(if self.tracks.is_empty() { None } else { Some(0) })
    }

    pub fn main_track(&self) -> Option<&Track> {
        self.main_track_index().map(|index| &self.tracks[index])
    }

    /// Every clip on every track.
    pub fn clips(&self) -> impl Iterator<Item = &ClipNode> {
        self.tracks.iter().flat_map(|track| track.clips.iter())
    }

    pub fn clips_mut(&mut self) -> impl Iterator<Item = &mut ClipNode> {
        self.tracks.iter_mut().flat_map(|track| track.clips.iter_mut())
    }

    /// True when some clip is letterboxed.
    pub fn uses_contain(&self) -> bool {
        self.clips().any(|clip| clip.fit == Some(FitMode::Contain))
    }

    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::ClipType;
    use serde_json::json;

    fn sample() -> RenderSpec {
        serde_json::from_value(json!({
            "tracks": [
                {"name": "cutout", "clips": [{"type": "video", "start": 0.0}]},
                {"name": "main", "role": "main", "clips": [
                    {"type": "video", "src": "bg.mp4", "start": 0.0, "length": 4.0, "fit": "contain"}
                ]}
            ],
            "output": {"format": "mp4", "resolution": "1080"},
            "soundtrack": {"src": "music.mp3"}
        }))
        .unwrap()
    }

    #[test]
    fn test_main_track_lookup() {
        let spec = sample();
        assert_eq!(spec.main_track_index(), Some(1));
        assert_eq!(spec.main_track().unwrap().name, "main");
        assert!(spec.uses_contain());
        assert!(spec.extra.contains_key("soundtrack"));
    }

    #[test]
    fn test_main_track_defaults_to_first() {
        let spec = RenderSpec {
            tracks: vec![Track::new("only", TrackRole::Overlay)
                .with_clip(ClipNode::new(ClipType::Image).with_length(2.0))],
            ..Default::default()
        };
        assert_eq!(spec.main_track_index(), Some(0));
        assert!((spec.tracks[0].known_end() - 2.0).abs() < 1e-9);
        assert_eq!(RenderSpec::default().main_track_index(), None);
    }
}
