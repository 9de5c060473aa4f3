//! Speech interval detection.
//!
//! The head clip's audio is decoded to 16 kHz mono PCM, cut into fixed-size
//! windows, and each window's RMS level (dBFS) is compared against a
//! threshold. A small state machine turns the loud/quiet stream into speech
//! intervals, bridging pauses shorter than the minimum silence and dropping
//! intervals shorter than the minimum segment.
//!
//! # Example
//!
//! ```ignore
//! use adreel_media::speech::{detect_speech_intervals, SpeechDetectionConfig};
//!
//! let intervals = detect_speech_intervals(head_path, &SpeechDetectionConfig::default()).await?;
//! for interval in &intervals {
//!     println!("{:.2}s - {:.2}s", interval.start, interval.end);
//! }
//! ```

mod analyze;
mod config;
mod segmenter;

pub use analyze::{detect_in_samples, detect_speech_intervals, window_dbfs, SAMPLE_RATE};
pub use config::SpeechDetectionConfig;
pub use segmenter::{SpeechInterval, SpeechSegmenter};
