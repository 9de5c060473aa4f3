//! Asset probing.
//!
//! Still images are recognised from their header with the `image` crate;
//! everything else goes through `ffprobe`. An asset is a video when it has
//! a positive duration or more than one frame.

use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use adreel_models::{AssetKind, MediaAsset};

use crate::command::{check_ffprobe, create_ffprobe_command};
use crate::error::{MediaError, MediaResult};
use crate::fit::FitPolicy;

/// Raw probe result before fit selection.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaProbe {
    pub kind: AssetKind,
    pub width: u32,
    pub height: u32,
    /// Seconds, zero for images
    pub duration: f64,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    nb_frames: Option<String>,
}

/// Probe a local file for dimensions, duration and kind.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaProbe> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    if let Some(probe) = probe_image_header(path).await {
        debug!(path = %path.display(), width = probe.width, height = probe.height, "Probed image header");
        return Ok(probe);
    }

    check_ffprobe()?;

    let output = create_ffprobe_command().arg(path).output().await?;

    if !output.status.success() {
        return Err(MediaError::probe(
            path,
            format!(
                "ffprobe exited with {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }

    let parsed: FfprobeOutput = serde_json::from_slice(&output.stdout)
        .map_err(|e| MediaError::probe(path, format!("unreadable ffprobe output: {e}")))?;

    let probe = classify(parsed).map_err(|message| MediaError::probe(path, message))?;
    debug!(
        path = %path.display(),
        kind = %probe.kind,
        width = probe.width,
        height = probe.height,
        duration = probe.duration,
        "Probed media"
    );
    Ok(probe)
}

/// Probe an asset and derive its fit mode.
pub async fn analyze_asset(
    path: impl AsRef<Path>,
    source: impl Into<String>,
    policy: &FitPolicy,
) -> MediaResult<MediaAsset> {
    let probe = probe_media(path).await?;
    Ok(MediaAsset {
        source: source.into(),
        kind: probe.kind,
        width: probe.width,
        height: probe.height,
        duration_seconds: probe.duration,
        fit_mode: policy.decide(probe.width, probe.height),
    })
}

async fn probe_image_header(path: &Path) -> Option<MediaProbe> {
    let owned = path.to_path_buf();
    let dims = tokio::task::spawn_blocking(move || image::image_dimensions(&owned))
        .await
        .ok()?
        .ok()?;
    Some(MediaProbe {
        kind: AssetKind::Image,
        width: dims.0,
        height: dims.1,
        duration: 0.0,
    })
}

fn classify(output: FfprobeOutput) -> Result<MediaProbe, String> {
    let stream = output
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| "no video stream found".to_string())?;

    let duration = output
        .format
        .as_ref()
        .and_then(|f| parse_seconds(f.duration.as_deref()))
        .or_else(|| parse_seconds(stream.duration.as_deref()))
        .unwrap_or(0.0);
    let frames = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(0);

    let kind = if duration > 0.0 || frames > 1 {
        AssetKind::Video
    } else {
        AssetKind::Image
    };

    Ok(MediaProbe {
        kind,
        width: stream.width.unwrap_or(0),
        height: stream.height.unwrap_or(0),
        duration: if kind == AssetKind::Video {
            duration
        } else {
            0.0
        },
    })
}

fn parse_seconds(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0)
}
