//! State machine turning per-window loudness into speech intervals.
//!
//! ```text
//!          loud                      quiet
//!  Idle ─────────▶ InSpeech ─────────────────▶ InPause
//!   ▲                 ▲                          │
//!   │                 └────────── loud ──────────┤
//!   │                                            │
//!   └──── pause >= min_silence: close interval ──┘
//! ```

use serde::{Deserialize, Serialize};

use super::config::SpeechDetectionConfig;

/// A detected stretch of speech, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeechInterval {
    pub start: f64,
    pub end: f64,
}

impl SpeechInterval {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

enum State {
    Idle,
    InSpeech { start_ms: u64 },
    InPause { start_ms: u64, pause_start_ms: u64 },
}

/// Converts a stream of loud/quiet windows into speech intervals.
pub struct SpeechSegmenter {
    config: SpeechDetectionConfig,
    state: State,
    intervals: Vec<SpeechInterval>,
}

impl SpeechSegmenter {
    pub fn new(config: SpeechDetectionConfig) -> Self {
        Self {
            config,
            state: State::Idle,
            intervals: Vec::new(),
        }
    }

    /// Process one analysis window.
    ///
    /// `timestamp_ms` is the window's start; `level_db` its RMS level.
    pub fn ingest_window(&mut self, level_db: f32, timestamp_ms: u64) {
        let loud = level_db >= self.config.threshold_db;
        let window_end = timestamp_ms + self.config.window_ms;

        self.state = match (std::mem::replace(&mut self.state, State::Idle), loud) {
            (State::Idle, true) => State::InSpeech {
                start_ms: timestamp_ms,
            },
            (State::Idle, false) => State::Idle,
            (State::InSpeech { start_ms }, true) => State::InSpeech { start_ms },
            (State::InSpeech { start_ms }, false) => State::InPause {
                start_ms,
                pause_start_ms: timestamp_ms,
            },
            (State::InPause { start_ms, .. }, true) => State::InSpeech { start_ms },
            (
                State::InPause {
                    start_ms,
                    pause_start_ms,
                },
                false,
            ) => {
                if window_end.saturating_sub(pause_start_ms) >= self.config.min_silence_ms {
                    self.close(start_ms, pause_start_ms);
                    State::Idle
                } else {
                    State::InPause {
                        start_ms,
                        pause_start_ms,
                    }
                }
            }
        };
    }

    /// Close any open interval and return all intervals.
    pub fn finalize(mut self, total_duration_ms: u64) -> Vec<SpeechInterval> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => {}
            State::InSpeech { start_ms } => self.close(start_ms, total_duration_ms),
            State::InPause {
                start_ms,
                pause_start_ms,
            } => self.close(start_ms, pause_start_ms),
        }
        self.intervals
    }

    fn close(&mut self, start_ms: u64, end_ms: u64) {
        if end_ms.saturating_sub(start_ms) >= self.config.min_segment_ms {
            self.intervals.push(SpeechInterval {
                start: start_ms as f64 / 1000.0,
                end: end_ms as f64 / 1000.0,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOUD: f32 = -10.0;
    const QUIET: f32 = -60.0;

    /// Feed one level per 20 ms window described by (level, count) runs.
    fn run(pattern: &[(f32, u64)]) -> Vec<SpeechInterval> {
        let config = SpeechDetectionConfig::default();
        let mut segmenter = SpeechSegmenter::new(config.clone());
        let mut t = 0;
        for &(level, count) in pattern {
            for _ in 0..count {
                segmenter.ingest_window(level, t);
                t += config.window_ms;
            }
        }
        segmenter.finalize(t)
    }

    #[test]
    fn test_two_utterances() {
        // 0.5s quiet, 2s speech, 0.5s quiet, 2.5s speech, 0.5s quiet
        let intervals = run(&[
            (QUIET, 25),
            (LOUD, 100),
            (QUIET, 25),
            (LOUD, 125),
            (QUIET, 25),
        ]);
        assert_eq!(
            intervals,
            vec![SpeechInterval::new(0.5, 2.5), SpeechInterval::new(3.0, 5.5)]
        );
    }

    #[test]
    fn test_short_pause_is_bridged() {
        // 200ms pause < 350ms min silence
        let intervals = run(&[(LOUD, 50), (QUIET, 10), (LOUD, 50)]);
        assert_eq!(intervals, vec![SpeechInterval::new(0.0, 2.2)]);
    }

    #[test]
    fn test_short_blip_dropped() {
        // 100ms burst < 300ms min segment
        let intervals = run(&[(QUIET, 20), (LOUD, 5), (QUIET, 40)]);
        assert!(intervals.is_empty());
    }

    #[test]
    fn test_speech_until_end() {
        let intervals = run(&[(QUIET, 10), (LOUD, 40)]);
        assert_eq!(intervals, vec![SpeechInterval::new(0.2, 1.0)]);
    }

    #[test]
    fn test_silence_only() {
        assert!(run(&[(QUIET, 200)]).is_empty());
    }
}
