use serde::{Deserialize, Serialize};

use adreel_models::{OverlayParams, OverlayShape};

use crate::cache::CacheKey;

/// One cutout to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayRequest {
    /// URL the engines read the head clip from
    pub source_url: String,
    /// Content fingerprint of the head clip
    pub fingerprint: String,
    pub shape: OverlayShape,
    pub params: OverlayParams,
}

impl OverlayRequest {
    pub fn new(
        source_url: impl Into<String>,
        fingerprint: impl Into<String>,
        shape: OverlayShape,
        params: OverlayParams,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            fingerprint: fingerprint.into(),
            shape,
            params,
        }
    }

    pub fn cache_key(&self) -> CacheKey {
        CacheKey {
            fingerprint: self.fingerprint.clone(),
            engine: self.params.engine,
            shape: self.shape,
            params: self.params.canonical(self.shape),
        }
    }
}
