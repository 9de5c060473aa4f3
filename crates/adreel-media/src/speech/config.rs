//! Configuration for speech detection.

use serde::{Deserialize, Serialize};

/// Energy-threshold speech detection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechDetectionConfig {
    /// Windows at or above this RMS level (dBFS) count as speech.
    pub threshold_db: f32,

    /// Analysis window size (milliseconds).
    pub window_ms: u64,

    /// Quiet stretches shorter than this are bridged (milliseconds).
    pub min_silence_ms: u64,

    /// Speech intervals shorter than this are dropped (milliseconds).
    pub min_segment_ms: u64,
}

impl Default for SpeechDetectionConfig {
    fn default() -> Self {
        Self {
            threshold_db: -35.0,
            window_ms: 20,
            min_silence_ms: 350,
            min_segment_ms: 300,
        }
    }
}

impl SpeechDetectionConfig {
    /// Builder-style setter for the level threshold.
    pub fn with_threshold_db(mut self, threshold_db: f32) -> Self {
        self.threshold_db = threshold_db.clamp(-120.0, 0.0);
        self
    }

    /// Builder-style setter for the window size.
    pub fn with_window_ms(mut self, ms: u64) -> Self {
        self.window_ms = ms.max(1);
        self
    }

    /// Builder-style setter for the minimum silence duration.
    pub fn with_min_silence_ms(mut self, ms: u64) -> Self {
        self.min_silence_ms = ms;
        self
    }

    /// Builder-style setter for the minimum segment duration.
    pub fn with_min_segment_ms(mut self, ms: u64) -> Self {
        self.min_segment_ms = ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SpeechDetectionConfig::default();
        assert!((config.threshold_db + 35.0).abs() < f32::EPSILON);
        assert_eq!(config.min_silence_ms, 350);
        assert_eq!(config.min_segment_ms, 300);
    }

    #[test]
    fn test_builder_clamping() {
        let config = SpeechDetectionConfig::default()
            .with_threshold_db(12.0)
            .with_window_ms(0);
        assert_eq!(config.threshold_db, 0.0);
        assert_eq!(config.window_ms, 1);
    }
}
