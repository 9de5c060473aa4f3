#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for the assembly pipeline.
//!
//! This crate provides:
//! - Asset probing (image header first, then `ffprobe`) and fit-mode selection
//! - Source fetching, media-type sniffing and content fingerprints
//! - Energy-based speech interval detection over 16 kHz mono PCM
//! - Subtitle cue loading, validation and transcript alignment

pub mod command;
pub mod download;
pub mod error;
pub mod fingerprint;
pub mod fit;
pub mod probe;
pub mod speech;
pub mod subtitles;

pub use command::{check_ffmpeg, check_ffprobe, create_ffmpeg_command};
pub use download::{fetch_source, is_remote, sniff_media_kind};
pub use error::{MediaError, MediaResult};
pub use fingerprint::{fingerprint_bytes, fingerprint_file};
pub use fit::{FitPolicy, DEFAULT_FIT_TOLERANCE};
pub use probe::{analyze_asset, probe_media, MediaProbe};
pub use speech::{detect_speech_intervals, SpeechDetectionConfig, SpeechInterval};
pub use subtitles::{
    load_cue_file, resolve_track, AlignmentConfig, AlignmentError, SubtitleInputs, SubtitleSource,
    SubtitleTrack,
};
