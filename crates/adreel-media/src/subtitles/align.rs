//! Transcript to speech-interval alignment.

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

use adreel_models::SubtitleCue;

use super::AlignmentConfig;
use crate::speech::SpeechInterval;

fn sentence_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?…]+\s+").expect("sentence break pattern is valid"))
}

/// Split a transcript into sentence-like units.
///
/// Breaks after terminal punctuation followed by whitespace. Text without
/// any break is a single unit.
pub fn split_units(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let mut units = Vec::new();
    let mut last = 0;
    for m in sentence_break().find_iter(text) {
        let unit = text[last..m.end()].trim();
        if !unit.is_empty() {
            units.push(unit.to_string());
        }
        last = m.end();
    }
    let tail = text[last..].trim();
    if !tail.is_empty() {
        units.push(tail.to_string());
    }
    units
}

/// Split `items` consecutive items into `weights.len()` contiguous,
/// non-empty ranges whose sizes follow the weights.
///
/// Requires `items >= weights.len() >= 1`.
pub fn partition(items: usize, weights: &[f64]) -> Vec<Range<usize>> {
    let groups = weights.len();
    debug_assert!(groups >= 1 && items >= groups);

    let total: f64 = weights.iter().map(|w| w.max(0.0)).sum();
    let mut ranges = Vec::with_capacity(groups);
    let mut cumulative = 0.0;
    let mut begin = 0;

    for (k, weight) in weights.iter().enumerate() {
        let end = if k + 1 == groups {
            items
        } else {
            cumulative += if total > 0.0 {
                weight.max(0.0) / total
            } else {
                1.0 / groups as f64
            };
            let target = (cumulative * items as f64).round() as usize;
            // leave at least one item for each remaining group
            target.clamp(begin + 1, items - (groups - k - 1))
        };
        ranges.push(begin..end);
        begin = end;
    }
    ranges
}

/// Align transcript units to detected speech intervals.
///
/// Returns an empty track when there is nothing to align.
pub fn align_transcript(
    transcript: &str,
    intervals: &[SpeechInterval],
    config: &AlignmentConfig,
) -> Vec<SubtitleCue> {
    let units = split_units(transcript);
    if units.is_empty() || intervals.is_empty() {
        return Vec::new();
    }

    let spans: Vec<(f64, f64, String)> = if units.len() >= intervals.len() {
        let durations: Vec<f64> = intervals.iter().map(SpeechInterval::duration).collect();
        partition(units.len(), &durations)
            .into_iter()
            .zip(intervals)
            .map(|(range, interval)| (interval.start, interval.end, units[range].join(" ")))
            .collect()
    } else {
        let shares: Vec<f64> = units.iter().map(|u| u.chars().count() as f64).collect();
        partition(intervals.len(), &shares)
            .into_iter()
            .zip(units)
            .map(|(range, unit)| {
                (
                    intervals[range.start].start,
                    intervals[range.end - 1].end,
                    unit,
                )
            })
            .collect()
    };

    let mut cues: Vec<SubtitleCue> = spans
        .into_iter()
        .map(|(start, end, text)| place_cue(start, end, text, config))
        .collect();
    enforce_no_overlap(&mut cues);
    cues
}

/// Position a cue inside `[start, end]`: short lead-in, trimmed tail,
/// minimum readable length, never past the span's end guard.
fn place_cue(start: f64, end: f64, text: String, config: &AlignmentConfig) -> SubtitleCue {
    let span = (end - start).max(0.0);
    let mut length =
        (span - config.tail_trim_max.min(span * config.tail_trim_ratio)).max(config.min_length);
    length = length.min((span - config.end_guard).max(config.short_span_length));
    SubtitleCue::new(
        round_ms((start + config.lead_in).max(0.0)),
        round_ms(length),
        text,
    )
}

/// Sort by start and shorten any cue that runs into its successor.
pub fn enforce_no_overlap(cues: &mut [SubtitleCue]) {
    cues.sort_by(|a, b| a.start.total_cmp(&b.start));
    for i in 1..cues.len() {
        let next_start = cues[i].start;
        let prev = &mut cues[i - 1];
        if prev.end() > next_start {
            prev.length = round_ms((next_start - prev.start).max(0.0));
            // rounding must never push the end back over
            if prev.end() > next_start {
                prev.length = ((next_start - prev.start) * 1000.0).floor() / 1000.0;
            }
        }
    }
}

pub(crate) fn round_ms(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
