//! Timeline block composition.
//!
//! Merges intro clips, outro clips and extra overlay layers into a base
//! spec. Blocks never overlap each other: the prepended block shifts the
//! whole timeline by exactly its total length.

use std::path::Path;

use tracing::{debug, info};

use adreel_models::{BlocksConfig, ClipNode, RenderSpec, TemplateBlocks, Track, TrackRole};

use crate::editor::round3;
use crate::error::{SpecError, SpecResult};

const OVERLAP_EPSILON: f64 = 1e-6;

/// Parse a blocks document and check that it can be composed.
pub fn parse_blocks_config(raw: &str) -> SpecResult<BlocksConfig> {
    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| SpecError::blocks(format!("not valid JSON: {e}")))?;
    if !value.is_object() {
        return Err(SpecError::blocks("expected an object keyed by template name"));
    }
    let config: BlocksConfig =
        serde_json::from_value(value).map_err(|e| SpecError::blocks(e.to_string()))?;
    for (template, blocks) in config.templates() {
        validate_blocks(template, blocks)?;
    }
    Ok(config)
}

/// Load a blocks document from disk.
pub async fn load_blocks_config(path: &Path) -> SpecResult<BlocksConfig> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SpecError::blocks(format!("cannot read {}: {e}", path.display())))?;
    parse_blocks_config(&raw)
}

/// Every block clip needs sane timing; prepended and appended clips need a
/// length since they are laid end to end.
pub fn validate_blocks(template: &str, blocks: &TemplateBlocks) -> SpecResult<()> {
    let groups = [
        ("prepend_clips", &blocks.prepend_clips),
        ("append_clips", &blocks.append_clips),
        ("append_overlays", &blocks.append_overlays),
    ];
    for (group, clips) in groups {
        for (i, clip) in clips.iter().enumerate() {
            let at = || format!("{template}.{group}[{i}]");
            if let Some(length) = clip.length {
                if !length.is_finite() || length <= 0.0 {
                    return Err(SpecError::blocks(format!("{}: length must be positive", at())));
                }
            } else if group != "append_overlays" {
                return Err(SpecError::blocks(format!("{}: length is required", at())));
            }
            if !clip.start.is_finite() || clip.start < 0.0 {
                return Err(SpecError::blocks(format!("{}: start must be non-negative", at())));
            }
        }
    }
    Ok(())
}

/// Summary of one composition.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Composition {
    /// Total length of the prepended block (the timeline shift)
    pub intro_total: f64,
    /// Start of the first appended clip, if any
    pub outro_start: Option<f64>,
    pub overlay_tracks: usize,
}

/// Compose `blocks` onto `spec`.
///
/// `base_length` is the length of the main content before any blocks; when
/// not positive it is taken from the main track's known clip ends.
pub fn compose(spec: &mut RenderSpec, blocks: &TemplateBlocks, base_length: Option<f64>) -> SpecResult<Composition> {
    let mut composition = Composition::default();
    if blocks.is_empty() {
        return Ok(composition);
    }
    validate_blocks("blocks", blocks)?;

    let main = spec
        .main_track_index()
        .ok_or_else(|| SpecError::validation("tracks", "spec has no main track"))?;

    // the main track's own content, before this composition shifts it
    let content_start = spec.tracks[main]
        .clips
        .iter()
        .map(|clip| clip.start)
        .reduce(f64::min)
        .unwrap_or(0.0);
    let content_length = match base_length {
        Some(length) if length > 0.0 => length,
        _ => (spec.tracks[main].known_end() - content_start).max(0.0),
    };

    if !blocks.prepend_clips.is_empty() {
        let mut offset = 0.0;
        let mut intro = Vec::with_capacity(blocks.prepend_clips.len());
        for clip in &blocks.prepend_clips {
            let mut clip = clip.clone();
            clip.start = round3(offset);
            offset += clip.length.unwrap_or(0.0);
            intro.push(clip);
        }
        let shift = round3(offset);
        shift_timeline(spec, shift);
        spec.tracks[main].clips.splice(0..0, intro);
        composition.intro_total = shift;
        info!(clips = blocks.prepend_clips.len(), shift, "Prepended intro block");
    }

    if !blocks.append_clips.is_empty() {
        let base_end = (content_start + composition.intro_total + content_length)
            .max(spec.tracks[main].known_end());

        let mut offset = 0.0;
        for clip in &blocks.append_clips {
            let mut clip = clip.clone();
            clip.start = round3(base_end + offset);
            offset += clip.length.unwrap_or(0.0);
            spec.tracks[main].clips.push(clip);
        }
        composition.outro_start = Some(round3(base_end));
        info!(clips = blocks.append_clips.len(), start = round3(base_end), "Appended outro block");
    }

    for clip in &blocks.append_overlays {
        let mut clip = clip.clone();
        if clip.length.is_none() {
            // spans the whole timeline once durations are reconciled
            clip.auto_length = true;
        }
        let name = unique_track_name(spec, "block_overlay");
        debug!(track = %name, "Adding overlay block track");
        spec.tracks.insert(0, Track::new(name, TrackRole::Overlay).with_clip(clip));
        composition.overlay_tracks += 1;
    }

    validate_tracks(spec)?;
    Ok(composition)
}

/// Wrap `outer` around `inner`: outer intro clips play first, outer outro
/// clips play last and the overlay layers of both are kept.
pub fn merge_blocks(inner: &TemplateBlocks, outer: &TemplateBlocks) -> TemplateBlocks {
    TemplateBlocks {
        prepend_clips: outer.prepend_clips.iter().chain(&inner.prepend_clips).cloned().collect(),
        append_clips: inner.append_clips.iter().chain(&outer.append_clips).cloned().collect(),
        append_overlays: inner.append_overlays.iter().chain(&outer.append_overlays).cloned().collect(),
    }
}

fn shift_timeline(spec: &mut RenderSpec, shift: f64) {
    if shift <= 0.0 {
        return;
    }
    for clip in spec.clips_mut() {
        clip.start = round3(clip.start + shift);
    }
    for cue in &mut spec.subtitles {
        cue.start = round3(cue.start + shift);
    }
}

fn unique_track_name(spec: &RenderSpec, prefix: &str) -> String {
    (1..)
        .map(|n| format!("{prefix}_{n}"))
        .find(|name| spec.track(name).is_none())
        .unwrap_or_else(|| prefix.to_string())
}

/// Check per-track timing: finite non-negative starts and lengths, clips
/// ordered by start, no overlap between clips whose length is known.
pub fn validate_tracks(spec: &RenderSpec) -> SpecResult<()> {
    for track in &spec.tracks {
        let mut previous: Option<(usize, &ClipNode)> = None;
        for (i, clip) in track.clips.iter().enumerate() {
            let at = || format!("{}/{}", track.name, i);
            if !clip.start.is_finite() || clip.start < 0.0 {
                return Err(SpecError::validation(at(), format!("invalid start {}", clip.start)));
            }
            if let Some(length) = clip.length {
                if !length.is_finite() || length < 0.0 {
                    return Err(SpecError::validation(at(), format!("invalid length {length}")));
                }
            }
            if let Some((j, prev)) = previous {
                if clip.start + OVERLAP_EPSILON < prev.start {
                    return Err(SpecError::validation(
                        at(),
                        format!("starts before {}/{}", track.name, j),
                    ));
                }
                if let Some(end) = prev.end() {
                    if end > clip.start + OVERLAP_EPSILON {
                        return Err(SpecError::validation(
                            at(),
                            format!("overlaps {}/{} which ends at {end}", track.name, j),
                        ));
                    }
                }
            }
            previous = Some((i, clip));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use adreel_models::{ClipType, FitMode, SubtitleCue, Transition};
    use serde_json::json;

    fn base() -> RenderSpec {
        RenderSpec {
            tracks: vec![
                Track::new("cutout", TrackRole::Overlay)
                    .with_clip(ClipNode::new(ClipType::Video).with_src("cutout.mov")),
                Track::new("main", TrackRole::Main).with_clip(
                    ClipNode::new(ClipType::Video)
                        .with_src("bg.mp4")
                        .with_auto_length(),
                ),
            ],
            subtitles: vec![SubtitleCue::new(0.55, 1.85, "Hello there.")],
            ..Default::default()
        }
    }

    fn intro(length: f64) -> ClipNode {
        ClipNode::new(ClipType::Video)
            .with_src("intro.mp4")
            .with_length(length)
            .with_fit(FitMode::Contain)
            .with_transition(Transition::Named("fade".into()))
    }

    #[test]
    fn test_prepend_shifts_everything() {
        let mut spec = base();
        let blocks = TemplateBlocks {
            prepend_clips: vec![intro(2.5), intro(1.0)],
            ..Default::default()
        };

        let composition = compose(&mut spec, &blocks, Some(6.0)).unwrap();
        assert_eq!(composition.intro_total, 3.5);

        let main = spec.main_track().unwrap();
        assert_eq!(main.clips.len(), 3);
        assert_eq!(main.clips[0].start, 0.0);
        assert_eq!(main.clips[1].start, 2.5);
        assert_eq!(main.clips[2].start, 3.5);
        assert_eq!(spec.track("cutout").unwrap().clips[0].start, 3.5);
        assert!((spec.subtitles[0].start - 4.05).abs() < 1e-9);
    }

    #[test]
    fn test_append_after_main_content() {
        let mut spec = base();
        let blocks = TemplateBlocks {
            prepend_clips: vec![intro(2.0)],
            append_clips: vec![intro(1.5), intro(1.0)],
            ..Default::default()
        };

        let composition = compose(&mut spec, &blocks, Some(6.0)).unwrap();
        assert_eq!(composition.outro_start, Some(8.0));
        let main = spec.main_track().unwrap();
        assert_eq!(main.clips[2].start, 8.0);
        assert_eq!(main.clips[3].start, 9.5);
    }

    #[test]
    fn test_append_uses_known_end_without_hint() {
        let mut spec = RenderSpec {
            tracks: vec![Track::new("main", TrackRole::Main)
                .with_clip(ClipNode::new(ClipType::Video).with_src("head.mp4").with_length(4.0))],
            ..Default::default()
        };
        let blocks = TemplateBlocks {
            append_clips: vec![intro(2.0)],
            ..Default::default()
        };
        compose(&mut spec, &blocks, None).unwrap();
        assert_eq!(spec.tracks[0].clips[1].start, 4.0);
    }

    #[test]
    fn test_append_overlays_become_tracks() {
        let mut spec = base();
        let logo = ClipNode::new(ClipType::Image).with_src("logo.png");
        let blocks = TemplateBlocks {
            append_overlays: vec![logo.clone(), logo],
            ..Default::default()
        };

        let composition = compose(&mut spec, &blocks, Some(6.0)).unwrap();
        assert_eq!(composition.overlay_tracks, 2);
        assert_eq!(spec.tracks.len(), 4);
        assert_eq!(spec.tracks[0].name, "block_overlay_2");
        assert_eq!(spec.tracks[1].name, "block_overlay_1");
        assert!(spec.tracks[0].clips[0].auto_length);
        // the main track is untouched
        assert_eq!(spec.main_track().unwrap().clips.len(), 1);
    }

    #[test]
    fn test_empty_blocks_are_a_noop() {
        let mut spec = base();
        let before = spec.clone();
        compose(&mut spec, &TemplateBlocks::default(), Some(6.0)).unwrap();
        assert_eq!(spec, before);
    }

    #[test]
    fn test_composition_is_deterministic() {
        let blocks = TemplateBlocks {
            prepend_clips: vec![intro(2.5)],
            append_clips: vec![intro(2.5)],
            append_overlays: vec![ClipNode::new(ClipType::Image).with_src("logo.png")],
        };
        let mut first = base();
        let mut second = base();
        compose(&mut first, &blocks, Some(6.0)).unwrap();
        compose(&mut second, &blocks, Some(6.0)).unwrap();
        assert_eq!(first.to_json_pretty().unwrap(), second.to_json_pretty().unwrap());
    }

    #[test]
    fn test_parse_blocks_config_errors() {
        assert!(matches!(parse_blocks_config("[1, 2]"), Err(SpecError::BlocksConfig(_))));
        assert!(matches!(parse_blocks_config("{nope"), Err(SpecError::BlocksConfig(_))));

        let missing_length = json!({"basic": {"prepend_clips": [{"type": "video", "src": "i.mp4"}]}});
        let err = parse_blocks_config(&missing_length.to_string()).unwrap_err();
        assert!(err.to_string().contains("basic.prepend_clips[0]"));
        assert!(err.is_recoverable());

        let ok = json!({"basic": {"append_clips": [{"type": "image", "src": "o.png", "length": 2}]}});
        assert!(parse_blocks_config(&ok.to_string()).unwrap().get("basic").is_some());

        let overlay_without_length = json!({"basic": {"append_overlays": [{"type": "image", "src": "logo.png"}]}});
        assert!(parse_blocks_config(&overlay_without_length.to_string()).is_ok());
    }

    #[test]
    fn test_appended_clips_need_a_length() {
        let raw = json!({"circle": {"append_clips": [
            {"type": "video", "src": "outro_a.mp4"},
            {"type": "video", "src": "outro_b.mp4"}
        ]}});
        let err = parse_blocks_config(&raw.to_string()).unwrap_err();
        assert!(matches!(err, SpecError::BlocksConfig(_)));
        assert!(err.to_string().contains("circle.append_clips[0]"));
        assert!(err.is_recoverable());

        let mut spec = base();
        let blocks = TemplateBlocks {
            append_clips: vec![ClipNode::new(ClipType::Video).with_src("outro_a.mp4")],
            ..Default::default()
        };
        assert!(matches!(compose(&mut spec, &blocks, Some(6.0)), Err(SpecError::BlocksConfig(_))));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_blocks_error() {
        let err = load_blocks_config(Path::new("/definitely/missing/blocks.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, SpecError::BlocksConfig(_)));
    }

    #[test]
    fn test_validate_tracks_rejects_overlap() {
        let spec = RenderSpec {
            tracks: vec![Track::new("main", TrackRole::Main)
                .with_clip(ClipNode::new(ClipType::Video).with_length(3.0))
                .with_clip(ClipNode::new(ClipType::Video).with_start(2.0).with_length(1.0))],
            ..Default::default()
        };
        let err = validate_tracks(&spec).unwrap_err();
        assert!(err.to_string().contains("main/1"));
    }

    #[test]
    fn test_validate_tracks_rejects_unordered() {
        let spec = RenderSpec {
            tracks: vec![Track::new("main", TrackRole::Main)
                .with_clip(ClipNode::new(ClipType::Video).with_start(2.0))
                .with_clip(ClipNode::new(ClipType::Video).with_start(1.0))],
            ..Default::default()
        };
        assert!(validate_tracks(&spec).is_err());
    }

    #[test]
    fn test_merge_blocks_wraps_inner() {
        let inner = TemplateBlocks {
            prepend_clips: vec![intro(1.0)],
            append_clips: vec![intro(1.5)],
            ..Default::default()
        };
        let outer = TemplateBlocks {
            prepend_clips: vec![intro(2.5).with_src("cli_intro.mp4")],
            append_clips: vec![intro(2.5).with_src("cli_outro.mp4")],
            ..Default::default()
        };
        let merged = merge_blocks(&inner, &outer);
        assert_eq!(merged.prepend_clips[0].src.as_deref(), Some("cli_intro.mp4"));
        assert_eq!(merged.prepend_clips[1].length, Some(1.0));
        assert_eq!(merged.append_clips[0].length, Some(1.5));
        assert_eq!(merged.append_clips[1].src.as_deref(), Some("cli_outro.mp4"));
        assert!((merged.prepend_total() - 3.5).abs() < 1e-9);
        assert_eq!(merge_blocks(&inner, &TemplateBlocks::default()), inner);
    }
}
