//! Duration reconciliation.
//!
//! The final mutation before a spec leaves the pipeline: every clip whose
//! length is derived gets a concrete length, and in `auto` mode stretched
//! videos get a playback speed so they end exactly on target.

use std::collections::HashMap;

use tracing::{debug, info};

use adreel_models::{subtitle, BackgroundLengthMode, ClipNode, ClipType, RenderSpec};

use crate::editor::round3;
use crate::error::{SpecError, SpecResult};

const MIN_LOCKED_LENGTH: f64 = 0.001;

/// Native (probed) durations of the media referenced by a spec, by `src`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NativeDurations(HashMap<String, f64>);

impl NativeDurations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, src: impl Into<String>, seconds: f64) {
        if seconds.is_finite() && seconds > 0.0 {
            self.0.insert(src.into(), seconds);
        }
    }

    pub fn with(mut self, src: impl Into<String>, seconds: f64) -> Self {
        self.insert(src, seconds);
        self
    }

    pub fn get(&self, src: &str) -> Option<f64> {
        self.0.get(src).copied()
    }

    /// Playable duration of a video clip: native length minus trim.
    fn playable(&self, clip: &ClipNode) -> Option<f64> {
        if clip.clip_type != ClipType::Video {
            return None;
        }
        let native = self.get(clip.src.as_deref()?)?;
        Some((native - clip.trim_seconds()).max(0.0))
    }
}

/// How one clip was locked.
#[derive(Debug, Clone, PartialEq)]
pub struct LockedClip {
    pub track: String,
    pub index: usize,
    pub length: f64,
    pub speed: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub max_content_end: f64,
    pub locked: Vec<LockedClip>,
}

/// Largest end over all clips and subtitles.
///
/// Clips with a derived length contribute only their start; clips with no
/// length but a known native duration contribute their playable end.
pub fn max_content_end(spec: &RenderSpec, natives: &NativeDurations) -> f64 {
    let clips_end = spec
        .clips()
        .map(|clip| match clip.length {
            _ if clip.is_flexible() => clip.start,
            Some(length) => clip.start + length.max(0.0),
            None => clip.start + natives.playable(clip).unwrap_or(0.0),
        })
        .fold(0.0, f64::max);
    clips_end.max(subtitle::track_end(&spec.subtitles))
}

/// Lock every derived length and set `spec.duration`.
pub fn reconcile(
    spec: &mut RenderSpec,
    natives: &NativeDurations,
    mode: BackgroundLengthMode,
) -> SpecResult<ReconcileReport> {
    let end = max_content_end(spec, natives);
    let mut report = ReconcileReport {
        max_content_end: round3(end),
        locked: Vec::new(),
    };

    // clips that simply play their source
    for track in &mut spec.tracks {
        for (index, clip) in track.clips.iter_mut().enumerate() {
            if clip.is_flexible() || clip.length.is_some() {
                continue;
            }
            if let Some(playable) = natives.playable(clip) {
                let length = round3(playable.max(MIN_LOCKED_LENGTH));
                clip.lock_length(length);
                report.locked.push(LockedClip {
                    track: track.name.clone(),
                    index,
                    length,
                    speed: None,
                });
            }
        }
    }

    // clips that fill until the next clip on their track, or the end
    for track in &mut spec.tracks {
        let starts: Vec<f64> = track.clips.iter().map(|clip| clip.start).collect();
        for (index, clip) in track.clips.iter_mut().enumerate() {
            let derived = clip.auto_length || (clip.length.is_none() && clip.match_length_to.is_none());
            if !derived {
                continue;
            }
            let target_end = fill_end(&starts[index + 1..], clip.start, end);
            let length = round3((target_end - clip.start).max(MIN_LOCKED_LENGTH));
            let speed = stretch_speed(clip, natives, mode, length);
            clip.lock_length(length);
            clip.speed = speed.or(clip.speed);
            report.locked.push(LockedClip {
                track: track.name.clone(),
                index,
                length,
                speed,
            });
        }
    }

    // clips that follow a labeled clip's length, cut short where they would
    // run into the next clip or past the content end
    let labels: HashMap<String, Option<f64>> = spec
        .clips()
        .filter_map(|clip| clip.label.clone().map(|label| (label, clip.length)))
        .collect();
    for track in &mut spec.tracks {
        let starts: Vec<f64> = track.clips.iter().map(|clip| clip.start).collect();
        for (index, clip) in track.clips.iter_mut().enumerate() {
            let Some(label) = clip.match_length_to.clone() else {
                continue;
            };
            let path = format!("{}/{}", track.name, index);
            let target = labels
                .get(&label)
                .ok_or_else(|| SpecError::validation(&path, format!("match_length_to references unknown label '{label}'")))?
                .ok_or_else(|| SpecError::validation(&path, format!("label '{label}' has no length")))?;
            let limit = fill_end(&starts[index + 1..], clip.start, end) - clip.start;
            let length = round3(target.min(limit).max(MIN_LOCKED_LENGTH));
            let speed = stretch_speed(clip, natives, mode, length);
            clip.lock_length(length);
            clip.speed = speed.or(clip.speed);
            report.locked.push(LockedClip {
                track: track.name.clone(),
                index,
                length,
                speed,
            });
        }
    }

    spec.duration = Some(report.max_content_end);
    for locked in &report.locked {
        debug!(track = %locked.track, index = locked.index, length = locked.length, speed = ?locked.speed, "Locked clip length");
    }
    info!(
        max_content_end = report.max_content_end,
        locked = report.locked.len(),
        mode = %mode,
        "Reconciled durations"
    );
    Ok(report)
}

/// Start of the first later clip in `following`, else the content end.
fn fill_end(following: &[f64], start: f64, end: f64) -> f64 {
    following
        .iter()
        .copied()
        .find(|&next| next > start)
        .unwrap_or(end)
}

/// Playback speed that makes a video's playable duration fit `length`.
fn stretch_speed(
    clip: &ClipNode,
    natives: &NativeDurations,
    mode: BackgroundLengthMode,
    length: f64,
) -> Option<f64> {
    if mode != BackgroundLengthMode::Auto || length <= 0.0 {
        return None;
    }
    natives
        .playable(clip)
        .filter(|playable| *playable > 0.0)
        .map(|playable| playable / length)
}
