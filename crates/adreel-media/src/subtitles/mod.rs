//! Subtitle track resolution.
//!
//! Chooses between explicit cues, transcript alignment and the placeholder
//! track according to the subtitle mode. Every track this module returns
//! is sorted by start with no overlapping cues.

mod align;
mod cues;
mod error;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use adreel_models::{SubtitleCue, SubtitleMode};

use crate::speech::SpeechInterval;

pub use align::{align_transcript, enforce_no_overlap, partition, split_units};
pub use cues::{load_cue_file, parse_cues, validate_cues};
pub use error::AlignmentError;

/// Cue placement and placeholder parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentConfig {
    /// Delay between interval start and cue start (seconds)
    pub lead_in: f64,
    /// Upper bound of the tail trimmed off a span (seconds)
    pub tail_trim_max: f64,
    /// Tail trimmed off a span, as a fraction of the span
    pub tail_trim_ratio: f64,
    /// Shortest cue worth showing (seconds)
    pub min_length: f64,
    /// Gap kept before the end of a span (seconds)
    pub end_guard: f64,
    /// Length used when a span is too short for the guard (seconds)
    pub short_span_length: f64,
    /// Number of cues in the placeholder track
    pub placeholder_cues: usize,
    pub placeholder_text: String,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            lead_in: 0.05,
            tail_trim_max: 0.15,
            tail_trim_ratio: 0.1,
            min_length: 0.4,
            end_guard: 0.05,
            short_span_length: 0.2,
            placeholder_cues: 3,
            placeholder_text: "...".to_string(),
        }
    }
}

impl AlignmentConfig {
    pub fn with_placeholder_text(mut self, text: impl Into<String>) -> Self {
        self.placeholder_text = text.into();
        self
    }
}

/// Where a resolved track came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtitleSource {
    Explicit,
    Aligned,
    Placeholder,
    /// No subtitle track at all
    Disabled,
}

/// A resolved subtitle track.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleTrack {
    pub cues: Vec<SubtitleCue>,
    pub source: SubtitleSource,
}

impl SubtitleTrack {
    pub fn disabled() -> Self {
        Self {
            cues: Vec::new(),
            source: SubtitleSource::Disabled,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.source == SubtitleSource::Disabled
    }
}

/// Everything the resolver can draw on.
#[derive(Debug, Default)]
pub struct SubtitleInputs<'a> {
    /// Result of loading an explicit cue file, if one was supplied
    pub explicit: Option<Result<Vec<SubtitleCue>, AlignmentError>>,
    pub transcript: Option<&'a str>,
    /// Speech intervals of the head clip (only needed for alignment)
    pub intervals: &'a [SpeechInterval],
    pub head_duration: f64,
}

/// Evenly spaced placeholder cues spanning `duration`.
pub fn placeholder_track(duration: f64, config: &AlignmentConfig) -> Vec<SubtitleCue> {
    let count = config.placeholder_cues.max(1);
    let duration = duration.max(0.0);
    if duration <= 0.0 {
        return Vec::new();
    }
    let slot = duration / count as f64;
    let mut cues: Vec<SubtitleCue> = (0..count)
        .map(|i| {
            let start = align::round_ms(slot * i as f64);
            let end = if i + 1 == count {
                duration
            } else {
                align::round_ms(slot * (i + 1) as f64)
            };
            SubtitleCue::new(
                start,
                align::round_ms(end - start),
                config.placeholder_text.clone(),
            )
        })
        .collect();
    enforce_no_overlap(&mut cues);
    cues
}

/// Produce the subtitle track for a run.
///
/// Malformed explicit cues and unalignable transcripts never fail the run:
/// they fall back to the placeholder track with a warning.
pub fn resolve_track(
    mode: SubtitleMode,
    inputs: SubtitleInputs<'_>,
    config: &AlignmentConfig,
) -> SubtitleTrack {
    let placeholder = || SubtitleTrack {
        cues: placeholder_track(inputs.head_duration, config),
        source: SubtitleSource::Placeholder,
    };

    if mode == SubtitleMode::None {
        return SubtitleTrack::disabled();
    }

    match inputs.explicit {
        Some(Ok(cues)) => {
            return SubtitleTrack {
                cues,
                source: SubtitleSource::Explicit,
            }
        }
        Some(Err(ref e)) => {
            warn!(error = %e, "Discarding malformed subtitle cues, using placeholder track");
            return placeholder();
        }
        None if mode == SubtitleMode::Manual => return SubtitleTrack::disabled(),
        None => {}
    }

    let transcript = inputs.transcript.map(str::trim).filter(|t| !t.is_empty());
    let Some(transcript) = transcript else {
        info!("No transcript or cues supplied, using placeholder subtitle track");
        return placeholder();
    };

    if inputs.intervals.is_empty() {
        warn!("No speech intervals detected, using placeholder subtitle track");
        return placeholder();
    }

    let cues = align_transcript(transcript, inputs.intervals, config);
    if cues.is_empty() {
        return placeholder();
    }
    info!(
        cues = cues.len(),
        intervals = inputs.intervals.len(),
        "Aligned transcript to speech"
    );
    SubtitleTrack {
        cues,
        source: SubtitleSource::Aligned,
    }
}
