//! Audio extraction and window-level analysis.

use std::path::Path;
use std::process::Stdio;

use tempfile::NamedTempFile;
use tracing::debug;

use super::config::SpeechDetectionConfig;
use super::segmenter::{SpeechInterval, SpeechSegmenter};
use crate::command::{check_ffmpeg, create_ffmpeg_command};
use crate::error::{MediaError, MediaResult};

/// Sample rate of the decoded analysis audio.
pub const SAMPLE_RATE: usize = 16_000;

/// Level reported for digital silence.
const SILENCE_FLOOR_DB: f32 = -120.0;

/// Detect speech intervals in the audio track of a media file.
///
/// Returns an empty list when the file has no audible speech.
pub async fn detect_speech_intervals(
    input_path: &Path,
    config: &SpeechDetectionConfig,
) -> MediaResult<Vec<SpeechInterval>> {
    debug!(
        path = %input_path.display(),
        threshold_db = config.threshold_db,
        min_silence_ms = config.min_silence_ms,
        "Starting speech detection"
    );

    check_ffmpeg()?;

    let temp_audio = NamedTempFile::new()?;
    extract_pcm(input_path, temp_audio.path()).await?;
    let samples = load_samples(temp_audio.path()).await?;

    if samples.is_empty() {
        return Err(MediaError::NoAudioData(input_path.to_path_buf()));
    }

    let intervals = detect_in_samples(&samples, SAMPLE_RATE, config);
    debug!(
        samples = samples.len(),
        intervals = intervals.len(),
        "Speech detection complete"
    );
    Ok(intervals)
}

/// Run the segmenter over already-decoded mono samples.
pub fn detect_in_samples(
    samples: &[f32],
    sample_rate: usize,
    config: &SpeechDetectionConfig,
) -> Vec<SpeechInterval> {
    let window = ((sample_rate as u64 * config.window_ms) / 1000).max(1) as usize;
    let total_ms = (samples.len() as u64 * 1000) / sample_rate as u64;

    let mut segmenter = SpeechSegmenter::new(config.clone());
    for (i, chunk) in samples.chunks(window).enumerate() {
        // Skip incomplete final window
        if chunk.len() < window {
            break;
        }
        segmenter.ingest_window(window_dbfs(chunk), i as u64 * config.window_ms);
    }
    segmenter.finalize(total_ms)
}

/// RMS level of a window in dBFS.
pub fn window_dbfs(window: &[f32]) -> f32 {
    if window.is_empty() {
        return SILENCE_FLOOR_DB;
    }
    let mean_square = window.iter().map(|s| s * s).sum::<f32>() / window.len() as f32;
    let rms = mean_square.sqrt();
    if rms <= f32::EPSILON {
        SILENCE_FLOOR_DB
    } else {
        (20.0 * rms.log10()).max(SILENCE_FLOOR_DB)
    }
}

/// Decode the audio track to 16 kHz mono f32le PCM.
async fn extract_pcm(input: &Path, output: &Path) -> MediaResult<()> {
    let result = create_ffmpeg_command()
        .arg("-i")
        .arg(input)
        .args([
            "-vn",
            "-ar",
            &SAMPLE_RATE.to_string(),
            "-ac",
            "1",
            "-f",
            "f32le",
        ])
        .arg(output)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !result.status.success() {
        return Err(MediaError::ffmpeg_failed(
            "audio extraction failed",
            Some(String::from_utf8_lossy(&result.stderr).to_string()),
            result.status.code(),
        ));
    }
    Ok(())
}

/// Load raw f32le audio samples from a file.
async fn load_samples(path: &Path) -> MediaResult<Vec<f32>> {
    let bytes = tokio::fs::read(path).await?;
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
