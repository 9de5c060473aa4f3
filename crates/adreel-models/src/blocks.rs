//! Optional intro/outro/extra-overlay blocks per template.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::clip::ClipNode;

/// Blocks merged into one template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TemplateBlocks {
    /// Placed before every clip of the main track
    #[serde(default)]
    pub prepend_clips: Vec<ClipNode>,
    /// Placed after the main track's last clip
    #[serde(default)]
    pub append_clips: Vec<ClipNode>,
    /// Each one becomes a new overlay track spanning the main track
    #[serde(default)]
    pub append_overlays: Vec<ClipNode>,
}

impl TemplateBlocks {
    pub fn is_empty(&self) -> bool {
        self.prepend_clips.is_empty()
            && self.append_clips.is_empty()
            && self.append_overlays.is_empty()
    }

    /// Total length of the prepended block.
    pub fn prepend_total(&self) -> f64 {
        self.prepend_clips
            .iter()
            .map(|clip| clip.length.unwrap_or(0.0).max(0.0))
            .sum()
    }
}

/// Template name -> blocks. Read-only once loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct BlocksConfig(pub BTreeMap<String, TemplateBlocks>);

impl BlocksConfig {
    pub fn get(&self, template: &str) -> Option<&TemplateBlocks> {
        self.0.get(template)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn templates(&self) -> impl Iterator<Item = (&String, &TemplateBlocks)> {
        self.0.iter()
    }
}
