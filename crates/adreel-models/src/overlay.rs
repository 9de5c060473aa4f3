//! Overlay (background-removed cutout) request parameters.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::mode::ModeParseError;

/// Mask shape of a cutout overlay.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum OverlayShape {
    Rect,
    Circle,
}

impl OverlayShape {
    pub const ALL: &'static [OverlayShape] = &[OverlayShape::Rect, OverlayShape::Circle];

    pub fn as_str(&self) -> &'static str {
        match self {
            OverlayShape::Rect => "rect",
            OverlayShape::Circle => "circle",
        }
    }
}

impl fmt::Display for OverlayShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverlayShape {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rect" => Ok(OverlayShape::Rect),
            "circle" => Ok(OverlayShape::Circle),
            other => Err(ModeParseError::new("overlay shape", other)),
        }
    }
}

/// Segmentation model used to cut the speaker out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum CutoutModel {
    Mediapipe,
    #[default]
    Rembg,
}

impl CutoutModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CutoutModel::Mediapipe => "mediapipe",
            CutoutModel::Rembg => "rembg",
        }
    }
}

impl fmt::Display for CutoutModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CutoutModel {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mediapipe" => Ok(CutoutModel::Mediapipe),
            "rembg" => Ok(CutoutModel::Rembg),
            other => Err(ModeParseError::new("cutout engine", other)),
        }
    }
}

/// Container of the alpha video produced by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OverlayContainer {
    #[default]
    Mov,
    Webm,
}

impl OverlayContainer {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverlayContainer::Mov => "mov",
            OverlayContainer::Webm => "webm",
        }
    }
}

impl FromStr for OverlayContainer {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mov" => Ok(OverlayContainer::Mov),
            "webm" => Ok(OverlayContainer::Webm),
            other => Err(ModeParseError::new("overlay container", other)),
        }
    }
}

/// Circle mask geometry, relative to the frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CircleParams {
    pub radius: f64,
    pub center_x: f64,
    pub center_y: f64,
    /// Track the face and move the circle center with it
    pub auto_center: bool,
}

impl Default for CircleParams {
    fn default() -> Self {
        Self {
            radius: 0.35,
            center_x: 0.5,
            center_y: 0.5,
            auto_center: true,
        }
    }
}

/// Everything besides the source and shape that influences a cutout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OverlayParams {
    pub engine: CutoutModel,
    pub container: OverlayContainer,
    pub rembg_model: String,
    pub circle: CircleParams,
}

impl Default for OverlayParams {
    fn default() -> Self {
        Self {
            engine: CutoutModel::Rembg,
            container: OverlayContainer::Mov,
            rembg_model: "u2netp".to_string(),
            circle: CircleParams::default(),
        }
    }
}

impl OverlayParams {
    /// Stable textual form of the parameters that affect `shape`'s output.
    ///
    /// Circle geometry is ignored for rect cutouts so that tweaking it
    /// does not invalidate cached rect results.
    pub fn canonical(&self, shape: OverlayShape) -> String {
        let mut out = format!("container={}", self.container.as_str());
        if self.engine == CutoutModel::Rembg {
            out.push_str(&format!(";rembg_model={}", self.rembg_model));
        }
        if shape == OverlayShape::Circle {
            out.push_str(&format!(
                ";radius={:.4};center_x={:.4};center_y={:.4};auto_center={}",
                self.circle.radius, self.circle.center_x, self.circle.center_y, self.circle.auto_center
            ));
        }
        out
    }
}
