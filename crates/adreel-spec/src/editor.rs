//! In-place edits of a render spec.
//!
//! Nodes are addressed as `"<track name>/<clip index>"`. Every accessor
//! fails with a validation error when the address does not resolve, since
//! that always means the template and the pipeline disagree.

use std::fmt;
use std::str::FromStr;

use adreel_models::{AssetKind, ClipNode, ClipType, FitMode, RenderSpec};

use crate::error::{SpecError, SpecResult};

/// Address of a clip node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath {
    pub track: String,
    pub index: usize,
}

impl NodePath {
    pub fn new(track: impl Into<String>, index: usize) -> Self {
        Self {
            track: track.into(),
            index,
        }
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.track, self.index)
    }
}

impl FromStr for NodePath {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (track, index) = s
            .trim()
            .rsplit_once('/')
            .ok_or_else(|| SpecError::validation(s, "expected <track>/<index>"))?;
        if track.is_empty() {
            return Err(SpecError::validation(s, "empty track name"));
        }
        let index = index
            .parse()
            .map_err(|_| SpecError::validation(s, format!("'{index}' is not a clip index")))?;
        Ok(Self::new(track, index))
    }
}

fn missing(spec: &RenderSpec, path: &NodePath) -> SpecError {
    match spec.track(&path.track) {
        None => SpecError::validation(path.to_string(), "no such track"),
        Some(track) => SpecError::validation(
            path.to_string(),
            format!("track has {} clips", track.clips.len()),
        ),
    }
}

/// Read-only lookup.
pub fn get_node<'a>(spec: &'a RenderSpec, path: &NodePath) -> SpecResult<&'a ClipNode> {
    spec.track(&path.track)
        .and_then(|track| track.clips.get(path.index))
        .ok_or_else(|| missing(spec, path))
}

pub fn get_node_mut<'a>(spec: &'a mut RenderSpec, path: &NodePath) -> SpecResult<&'a mut ClipNode> {
    if get_node(spec, path).is_err() {
        return Err(missing(spec, path));
    }
    spec.track_mut(&path.track)
        .and_then(|track| track.clips.get_mut(path.index))
        .ok_or_else(|| SpecError::validation(path.to_string(), "node disappeared"))
}

/// Point a node at a new asset.
///
/// Sets `src`, and `fit` / `type` when given. Image assets lose their
/// video-only controls (`trim`, `auto_length`, `match_length_to`, `speed`).
pub fn set_asset_at_path(
    spec: &mut RenderSpec,
    path: &NodePath,
    source: &str,
    fit: Option<FitMode>,
    kind: Option<AssetKind>,
) -> SpecResult<()> {
    let node = get_node_mut(spec, path)?;
    node.src = Some(source.to_string());
    if let Some(fit) = fit {
        node.fit = Some(fit);
    }
    if let Some(kind) = kind {
        node.clip_type = ClipType::from(kind);
        if kind == AssetKind::Image {
            node.strip_video_controls();
        }
    }
    Ok(())
}

/// Give a node an explicit length (at least 0.1 s, millisecond precision).
pub fn set_length_at_path(spec: &mut RenderSpec, path: &NodePath, length: f64) -> SpecResult<()> {
    let node = get_node_mut(spec, path)?;
    node.lock_length(round3(length.max(0.1)));
    Ok(())
}

/// Set the canvas fill color when some clip is letterboxed.
///
/// Returns whether the color was applied.
pub fn ensure_background_color(spec: &mut RenderSpec, color: &str) -> bool {
    if !spec.uses_contain() {
        return false;
    }
    spec.background = Some(color.to_string());
    true
}

pub(crate) fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
