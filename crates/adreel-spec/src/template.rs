//! Template registry.
//!
//! Each template is a preset spec plus the node paths the pipeline fills
//! in: where the background goes, where the head clip goes and which
//! cutout shape goes where.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use adreel_models::{OverlayShape, RenderSpec};

use crate::editor::NodePath;
use crate::error::{SpecError, SpecResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKind {
    /// Full-frame background with a rectangular cutout of the speaker
    Overlay,
    /// Full-frame background with a circular cutout of the speaker
    Circle,
    /// Speaker full-frame with the background as a panel
    Basic,
    MixBasicOverlay,
    MixBasicCircle,
}

impl TemplateKind {
    pub const ALL: [TemplateKind; 5] = [
        TemplateKind::Overlay,
        TemplateKind::Circle,
        TemplateKind::Basic,
        TemplateKind::MixBasicOverlay,
        TemplateKind::MixBasicCircle,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::Overlay => "overlay",
            TemplateKind::Circle => "circle",
            TemplateKind::Basic => "basic",
            TemplateKind::MixBasicOverlay => "mix_basic_overlay",
            TemplateKind::MixBasicCircle => "mix_basic_circle",
        }
    }

    pub fn file_name(&self) -> String {
        format!("talking_head_{}.json", self.as_str())
    }

    fn background_paths(&self) -> &'static [&'static str] {
        match self {
            TemplateKind::Overlay | TemplateKind::Circle => &["main/0"],
            TemplateKind::Basic | TemplateKind::MixBasicOverlay | TemplateKind::MixBasicCircle => {
                &["background/0"]
            }
        }
    }

    fn head_paths(&self) -> &'static [&'static str] {
        match self {
            TemplateKind::Overlay | TemplateKind::Circle => &[],
            TemplateKind::Basic | TemplateKind::MixBasicOverlay | TemplateKind::MixBasicCircle => &["main/0"],
        }
    }

    fn overlay_paths(&self) -> &'static [(OverlayShape, &'static str)] {
        match self {
            TemplateKind::Overlay | TemplateKind::MixBasicOverlay => &[(OverlayShape::Rect, "cutout/0")],
            TemplateKind::Circle | TemplateKind::MixBasicCircle => &[(OverlayShape::Circle, "cutout/0")],
            TemplateKind::Basic => &[],
        }
    }

    pub fn background_nodes(&self) -> Vec<NodePath> {
        parse_paths(self.background_paths())
    }

    pub fn head_nodes(&self) -> Vec<NodePath> {
        parse_paths(self.head_paths())
    }

    pub fn overlay_nodes(&self) -> Vec<(OverlayShape, NodePath)> {
        self.overlay_paths()
            .iter()
            .filter_map(|(shape, path)| path.parse().ok().map(|path| (*shape, path)))
            .collect()
    }

    /// Cutout shapes this template cannot be assembled without.
    pub fn required_shapes(&self) -> BTreeSet<OverlayShape> {
        self.overlay_paths().iter().map(|(shape, _)| *shape).collect()
    }
}

fn parse_paths(paths: &[&str]) -> Vec<NodePath> {
    paths.iter().filter_map(|path| path.parse().ok()).collect()
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TemplateKind {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| SpecError::UnknownTemplate(s.trim().to_string()))
    }
}

/// Parse a comma-separated template list, keeping order and dropping
/// duplicates. An empty list is an error.
pub fn parse_template_list(raw: &str) -> SpecResult<Vec<TemplateKind>> {
    let mut templates = Vec::new();
    for item in raw.split(',').map(str::trim).filter(|item| !item.is_empty()) {
        let kind: TemplateKind = item.parse()?;
        if !templates.contains(&kind) {
            templates.push(kind);
        }
    }
    if templates.is_empty() {
        return Err(SpecError::UnknownTemplate("(empty template list)".to_string()));
    }
    Ok(templates)
}

/// Union of the shapes the given templates need.
pub fn required_shapes(templates: &[TemplateKind]) -> BTreeSet<OverlayShape> {
    templates.iter().flat_map(TemplateKind::required_shapes).collect()
}

/// Preset specs on disk.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    dir: PathBuf,
}

impl TemplateRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn preset_path(&self, kind: TemplateKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Load a fresh copy of a template's preset and check that every node
    /// the pipeline will fill in exists.
    pub async fn load(&self, kind: TemplateKind) -> SpecResult<RenderSpec> {
        let path = self.preset_path(kind);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SpecError::TemplateNotFound(path))
            }
            Err(e) => return Err(e.into()),
        };
        let spec = RenderSpec::from_json(&raw)?;

        let nodes = kind
            .background_nodes()
            .into_iter()
            .chain(kind.head_nodes())
            .chain(kind.overlay_nodes().into_iter().map(|(_, path)| path));
        for node in nodes {
            crate::editor::get_node(&spec, &node)?;
        }
        debug!(template = %kind, path = %path.display(), tracks = spec.tracks.len(), "Loaded template preset");
        Ok(spec)
    }
}

/// Write a finished spec as pretty JSON.
pub async fn write_spec(spec: &RenderSpec, path: &Path) -> SpecResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut json = spec.to_json_pretty()?;
    json.push('\n');
    tokio::fs::write(path, json).await?;
    Ok(())
}
