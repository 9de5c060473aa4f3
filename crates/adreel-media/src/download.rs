//! Source fetching and remote media-type sniffing.

use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use adreel_models::AssetKind;

use crate::error::{MediaError, MediaResult};

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "webp", "gif", "bmp", "heic", "tif", "tiff",
];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "mkv", "m4v", "avi", "mpeg", "mpg"];

/// True for `http://` and `https://` sources.
pub fn is_remote(source: &str) -> bool {
    Url::parse(source)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

/// Lower-case file extension of a URL path or local path.
fn extension_of(source: &str) -> Option<String> {
    let path = match Url::parse(source) {
        Ok(url) if url.scheme() != "file" => url.path().to_string(),
        _ => source.to_string(),
    };
    Path::new(&path)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

fn kind_from_extension(source: &str) -> Option<AssetKind> {
    let ext = extension_of(source)?;
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(AssetKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(AssetKind::Video)
    } else {
        None
    }
}

/// Guess whether a remote URL points at an image or a video.
///
/// Uses the extension when it is known, then the `Content-Type` of a `HEAD`
/// request, and defaults to video.
pub async fn sniff_media_kind(client: &reqwest::Client, url: &str) -> AssetKind {
    if let Some(kind) = kind_from_extension(url) {
        return kind;
    }

    let content_type = match client.head(url).send().await {
        Ok(response) => response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_lowercase()),
        Err(e) => {
            debug!(url, error = %e, "HEAD request failed while sniffing media type");
            None
        }
    };

    match content_type {
        Some(ct) if ct.starts_with("image/") => AssetKind::Image,
        _ => AssetKind::Video,
    }
}

/// Make a source available on the local filesystem.
///
/// Local paths are returned unchanged. Remote sources are streamed into
/// `dest_dir` as `<stem>.<ext>`.
pub async fn fetch_source(
    client: &reqwest::Client,
    source: &str,
    dest_dir: &Path,
    stem: &str,
) -> MediaResult<PathBuf> {
    if !is_remote(source) {
        let path = PathBuf::from(source);
        if !path.exists() {
            return Err(MediaError::FileNotFound(path));
        }
        return Ok(path);
    }

    tokio::fs::create_dir_all(dest_dir).await?;
    let file_name = match extension_of(source) {
        Some(ext) if !ext.is_empty() => format!("{stem}.{ext}"),
        _ => stem.to_string(),
    };
    let dest = dest_dir.join(file_name);

    let response = client.get(source).send().await?;
    if !response.status().is_success() {
        return Err(MediaError::download_failed(format!(
            "GET {} returned {}",
            source,
            response.status()
        )));
    }

    let mut file = tokio::fs::File::create(&dest).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        written += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    if written == 0 {
        return Err(MediaError::download_failed(format!(
            "{source} returned an empty body"
        )));
    }

    info!(source, dest = %dest.display(), bytes = written, "Downloaded source");
    Ok(dest)
}
