//! Render-spec manipulation.
//!
//! - [`editor`]: addressed, validated in-place edits
//! - [`blocks`]: intro/outro/overlay block composition
//! - [`duration`]: derived-length locking, the final mutation
//! - [`template`]: preset registry and spec output

pub mod blocks;
pub mod duration;
pub mod editor;
pub mod error;
pub mod template;

pub use blocks::{
    compose, load_blocks_config, merge_blocks, parse_blocks_config, validate_tracks, Composition,
};
pub use duration::{max_content_end, reconcile, LockedClip, NativeDurations, ReconcileReport};
pub use editor::{
    ensure_background_color, get_node, get_node_mut, set_asset_at_path, set_length_at_path, NodePath,
};
pub use error::{SpecError, SpecResult};
pub use template::{parse_template_list, required_shapes, write_spec, TemplateKind, TemplateRegistry};
