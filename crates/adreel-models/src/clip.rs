//! Timeline clip nodes.
//!
//! A `ClipNode` is one entry of a render-spec track. Fields the pipeline does
//! not interpret (effects, offsets, filters, ...) are kept in `extra` so a
//! template round-trips through the editor unchanged.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canvas::FitMode;
use crate::media::AssetKind;

/// Asset type of a clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClipType {
    Video,
    Image,
    Html,
    Title,
    Audio,
}

impl ClipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipType::Video => "video",
            ClipType::Image => "image",
            ClipType::Html => "html",
            ClipType::Title => "title",
            ClipType::Audio => "audio",
        }
    }
}

impl From<AssetKind> for ClipType {
    fn from(kind: AssetKind) -> Self {
        match kind {
            AssetKind::Image => ClipType::Image,
            AssetKind::Video => ClipType::Video,
        }
    }
}

impl fmt::Display for ClipType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transition effect, either one name for both edges or separate in/out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Transition {
    Named(String),
    Split {
        #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
        incoming: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        out: Option<String>,
    },
}

/// One clip on a render-spec track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipNode {
    #[serde(rename = "type")]
    pub clip_type: ClipType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(default)]
    pub start: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<FitMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<Transition>,
    /// Seconds skipped at the head of the source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub auto_length: bool,
    /// Label of the clip whose timing this one follows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_length_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ClipNode {
    /// Create a clip of the given type starting at zero.
    pub fn new(clip_type: ClipType) -> Self {
        Self {
            clip_type,
            src: None,
            start: 0.0,
            length: None,
            fit: None,
            transition: None,
            trim: None,
            auto_length: false,
            match_length_to: None,
            speed: None,
            label: None,
            extra: serde_json::Map::new(),
        }
    }

    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    pub fn with_start(mut self, start: f64) -> Self {
        self.start = start;
        self
    }

    pub fn with_length(mut self, length: f64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_fit(mut self, fit: FitMode) -> Self {
        self.fit = Some(fit);
        self
    }

    pub fn with_transition(mut self, transition: Transition) -> Self {
        self.transition = Some(transition);
        self
    }

    pub fn with_auto_length(mut self) -> Self {
        self.auto_length = true;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// End of the clip when its length is known.
    pub fn end(&self) -> Option<f64> {
        self.length.map(|length| self.start + length.max(0.0))
    }

    /// True when the clip's length follows the surrounding content instead
    /// of being fixed.
    pub fn is_flexible(&self) -> bool {
        self.auto_length || self.match_length_to.is_some()
    }

    /// Seconds trimmed from the head of the source.
    pub fn trim_seconds(&self) -> f64 {
        self.trim.unwrap_or(0.0).max(0.0)
    }

    /// Drop the fields that only make sense for time-based sources.
    pub fn strip_video_controls(&mut self) {
        self.trim = None;
        self.auto_length = false;
        self.match_length_to = None;
        self.speed = None;
    }

    /// Turn a flexible clip into a fixed one with the given length.
    pub fn lock_length(&mut self, length: f64) {
        self.length = Some(length);
        self.auto_length = false;
        self.match_length_to = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_fields_round_trip() {
        let raw = json!({
            "type": "video",
            "src": "head.mp4",
            "start": 0.0,
            "auto_length": true,
            "position": "center",
            "scale": 0.6
        });
        let clip: ClipNode = serde_json::from_value(raw.clone()).unwrap();
        assert!(clip.is_flexible());
        assert_eq!(clip.extra.get("scale"), Some(&json!(0.6)));
        assert_eq!(serde_json::to_value(&clip).unwrap(), raw);
    }

    #[test]
    fn test_transition_forms() {
        let named: Transition = serde_json::from_value(json!("fade")).unwrap();
        assert_eq!(named, Transition::Named("fade".into()));

        let split: Transition = serde_json::from_value(json!({"in": "fade", "out": "wipeLeft"})).unwrap();
        assert_eq!(
            split,
            Transition::Split {
                incoming: Some("fade".into()),
                out: Some("wipeLeft".into())
            }
        );
    }

    #[test]
    fn test_strip_video_controls() {
        let mut clip = ClipNode::new(ClipType::Video).with_auto_length();
        clip.trim = Some(1.0);
        clip.speed = Some(1.5);
        clip.match_length_to = Some("head".into());

        clip.strip_video_controls();
        assert!(!clip.is_flexible());
        assert!(clip.trim.is_none());
        assert!(clip.speed.is_none());
    }

    #[test]
    fn test_end_requires_length() {
        let clip = ClipNode::new(ClipType::Image).with_start(2.0);
        assert_eq!(clip.end(), None);
        assert_eq!(clip.with_length(3.0).end(), Some(5.0));
    }
}
