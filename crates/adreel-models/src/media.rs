//! Probed media asset description.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::canvas::FitMode;

/// Whether an asset is a still image or a time-based video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    Video,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Video => "video",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A probed input asset.
///
/// Created once by the metadata analyzer and never mutated afterwards.
/// `fit_mode` is derived from the dimensions and the canvas ratio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MediaAsset {
    /// URL or path the asset was loaded from
    pub source: String,
    pub kind: AssetKind,
    pub width: u32,
    pub height: u32,
    /// Zero for images
    pub duration_seconds: f64,
    pub fit_mode: FitMode,
}

impl MediaAsset {
    pub fn is_video(&self) -> bool {
        self.kind == AssetKind::Video
    }

    /// Native duration for time-based assets, `None` for images.
    pub fn native_duration(&self) -> Option<f64> {
        match self.kind {
            AssetKind::Video if self.duration_seconds > 0.0 => Some(self.duration_seconds),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_duration_only_for_video() {
        let mut asset = MediaAsset {
            source: "bg.png".into(),
            kind: AssetKind::Image,
            width: 1080,
            height: 1920,
            duration_seconds: 0.0,
            fit_mode: FitMode::Cover,
        };
        assert_eq!(asset.native_duration(), None);

        asset.kind = AssetKind::Video;
        asset.duration_seconds = 6.0;
        assert_eq!(asset.native_duration(), Some(6.0));
    }
}
