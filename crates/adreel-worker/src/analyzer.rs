//! Media analysis seam used by the pipeline.
//!
//! [`FfmpegAnalyzer`] fetches, probes and fingerprints real files; tests
//! substitute their own implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use adreel_media::{
    analyze_asset, detect_speech_intervals, fetch_source, fingerprint_file, sniff_media_kind, FitPolicy,
    MediaResult, SpeechDetectionConfig, SpeechInterval,
};
use adreel_models::{AssetKind, MediaAsset};

/// A probed input and where its bytes live locally.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedSource {
    pub asset: MediaAsset,
    pub local_path: PathBuf,
}

#[async_trait]
pub trait MediaAnalyzer: Send + Sync {
    /// Make `source` local (downloading into `dest_dir` as `stem.*` when
    /// remote), probe it and decide its fit mode.
    async fn analyze(
        &self,
        source: &str,
        dest_dir: &Path,
        stem: &str,
        policy: &FitPolicy,
    ) -> MediaResult<AnalyzedSource>;

    async fn fingerprint(&self, local_path: &Path) -> MediaResult<String>;

    async fn speech_intervals(
        &self,
        local_path: &Path,
        config: &SpeechDetectionConfig,
    ) -> MediaResult<Vec<SpeechInterval>>;

    /// Image or video, without downloading.
    async fn media_kind(&self, source: &str) -> AssetKind;
}

/// Analyzer backed by HTTP downloads and the ffmpeg tools.
#[derive(Debug, Clone, Default)]
pub struct FfmpegAnalyzer {
    http: reqwest::Client,
}

impl FfmpegAnalyzer {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl MediaAnalyzer for FfmpegAnalyzer {
    async fn analyze(
        &self,
        source: &str,
        dest_dir: &Path,
        stem: &str,
        policy: &FitPolicy,
    ) -> MediaResult<AnalyzedSource> {
        let local_path = fetch_source(&self.http, source, dest_dir, stem).await?;
        let asset = analyze_asset(&local_path, source, policy).await?;
        Ok(AnalyzedSource { asset, local_path })
    }

    async fn fingerprint(&self, local_path: &Path) -> MediaResult<String> {
        fingerprint_file(local_path).await
    }

    async fn speech_intervals(
        &self,
        local_path: &Path,
        config: &SpeechDetectionConfig,
    ) -> MediaResult<Vec<SpeechInterval>> {
        detect_speech_intervals(local_path, config).await
    }

    async fn media_kind(&self, source: &str) -> AssetKind {
        sniff_media_kind(&self.http, source).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_media_kind_from_extension() {
        let analyzer = FfmpegAnalyzer::default();
        assert_eq!(analyzer.media_kind("https://cdn.example/logo.png").await, AssetKind::Image);
        assert_eq!(analyzer.media_kind("https://cdn.example/intro.mp4").await, AssetKind::Video);
    }

    #[tokio::test]
    async fn test_missing_local_source() {
        let dir = tempfile::tempdir().unwrap();
        let result = FfmpegAnalyzer::default()
            .analyze("/no/such/head.mp4", dir.path(), "head", &FitPolicy::default())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fingerprint_is_content_hash() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.mp4");
        let b = dir.path().join("b.mp4");
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();
        let analyzer = FfmpegAnalyzer::default();
        assert_eq!(
            analyzer.fingerprint(&a).await.unwrap(),
            analyzer.fingerprint(&b).await.unwrap()
        );
    }
}
