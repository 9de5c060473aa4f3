//! Content-addressed overlay result cache.
//!
//! Entries are keyed by the head clip's fingerprint plus everything that
//! changes the cutout, so a re-run with identical inputs never starts a
//! job. Entries live in memory and, when a directory is configured, as one
//! JSON document per key on disk. Only successful results are stored.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use adreel_models::{CutoutModel, OverlayShape};

use crate::error::OverlayResult;

/// Identity of a cutout result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub fingerprint: String,
    pub engine: CutoutModel,
    pub shape: OverlayShape,
    /// Canonical parameter string, see `OverlayParams::canonical`
    pub params: String,
}

impl CacheKey {
    /// Hex digest used as the storage key.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.fingerprint.as_bytes());
        hasher.update(b"|");
        hasher.update(self.engine.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(self.shape.as_str().as_bytes());
        hasher.update(b"|");
        hasher.update(self.params.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    key: CacheKey,
    asset_url: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct OverlayCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    dir: Option<PathBuf>,
}

impl OverlayCache {
    /// Memory-only cache.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Cache persisted under `dir` (created on first write).
    pub fn persistent(dir: impl Into<PathBuf>) -> Self {
        Self {
            entries: Arc::default(),
            dir: Some(dir.into()),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Look up a finished result.
    pub async fn get(&self, key: &CacheKey) -> Option<String> {
        let digest = key.digest();
        if let Some(entry) = self.entries.read().await.get(&digest) {
            return Some(entry.asset_url.clone());
        }

        let dir = self.dir.as_ref()?;
        let entry = match read_entry(&dir.join(format!("{digest}.json"))).await {
            Ok(Some(entry)) if &entry.key == key => entry,
            Ok(Some(_)) => {
                warn!(digest = %digest, "Ignoring overlay cache entry with mismatched key");
                return None;
            }
            Ok(None) => return None,
            Err(e) => {
                warn!(digest = %digest, error = %e, "Failed to read overlay cache entry");
                return None;
            }
        };

        let url = entry.asset_url.clone();
        self.entries.write().await.insert(digest, entry);
        Some(url)
    }

    /// Store a successful result.
    ///
    /// Disk write failures are logged; the in-memory entry is kept.
    pub async fn put(&self, key: &CacheKey, asset_url: impl Into<String>) {
        let digest = key.digest();
        let entry = CacheEntry {
            key: key.clone(),
            asset_url: asset_url.into(),
            created_at: Utc::now(),
        };

        if let Some(dir) = &self.dir {
            if let Err(e) = write_entry(dir, &digest, &entry).await {
                warn!(digest = %digest, error = %e, "Failed to persist overlay cache entry");
            }
        }

        debug!(digest = %digest, shape = %key.shape, "Cached overlay result");
        self.entries.write().await.insert(digest, entry);
    }
}

async fn read_entry(path: &Path) -> OverlayResult<Option<CacheEntry>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Write through a temporary file and rename so readers never observe a
/// partial entry.
async fn write_entry(dir: &Path, digest: &str, entry: &CacheEntry) -> OverlayResult<()> {
    tokio::fs::create_dir_all(dir).await?;
    let bytes = serde_json::to_vec_pretty(entry)?;
    let tmp = dir.join(format!(".{digest}.{}.tmp", uuid::Uuid::new_v4()));
    tokio::fs::write(&tmp, bytes).await?;
    if let Err(e) = tokio::fs::rename(&tmp, dir.join(format!("{digest}.json"))).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use adreel_models::OverlayParams;

    fn key(shape: OverlayShape) -> CacheKey {
        let params = OverlayParams::default();
        CacheKey {
            fingerprint: "abc123".to_string(),
            engine: params.engine,
            shape,
            params: params.canonical(shape),
        }
    }

    #[test]
    fn test_digest_is_stable_and_distinct() {
        assert_eq!(key(OverlayShape::Rect).digest(), key(OverlayShape::Rect).digest());
        assert_ne!(key(OverlayShape::Rect).digest(), key(OverlayShape::Circle).digest());
        assert_eq!(key(OverlayShape::Rect).digest().len(), 64);
    }

    #[test]
    fn test_digest_depends_on_engine() {
        let mut other = key(OverlayShape::Rect);
        other.engine = CutoutModel::Mediapipe;
        assert_ne!(key(OverlayShape::Rect).digest(), other.digest());
    }

    #[tokio::test]
    async fn test_memory_roundtrip() {
        let cache = OverlayCache::in_memory();
        assert!(cache.get(&key(OverlayShape::Rect)).await.is_none());

        cache.put(&key(OverlayShape::Rect), "https://cdn/rect.mov").await;
        assert_eq!(
            cache.get(&key(OverlayShape::Rect)).await.as_deref(),
            Some("https://cdn/rect.mov")
        );
        assert!(cache.get(&key(OverlayShape::Circle)).await.is_none());
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_persistent_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();

        let first = OverlayCache::persistent(dir.path());
        first.put(&key(OverlayShape::Circle), "https://cdn/circle.mov").await;

        let second = OverlayCache::persistent(dir.path());
        assert!(second.is_empty().await);
        assert_eq!(
            second.get(&key(OverlayShape::Circle)).await.as_deref(),
            Some("https://cdn/circle.mov")
        );
        assert_eq!(second.len().await, 1);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let k = key(OverlayShape::Rect);
        std::fs::write(dir.path().join(format!("{}.json", k.digest())), b"not json").unwrap();

        let cache = OverlayCache::persistent(dir.path());
        assert!(cache.get(&k).await.is_none());
    }
}
