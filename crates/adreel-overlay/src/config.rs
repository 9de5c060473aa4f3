//! Overlay coordinator configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use adreel_models::{CircleParams, OverlayParams};

use crate::cache::OverlayCache;
use crate::coordinator::{OverlayBackend, OverlayCoordinator};
use crate::error::OverlayResult;
use crate::local::CommandOverlayEngine;
use crate::poll::PollPolicy;
use crate::remote::{HttpOverlayClient, RemoteOverlayConfig};

#[derive(Debug, Clone)]
pub struct OverlayConfig {
    pub params: OverlayParams,
    /// Remote submit endpoint; local-only when unset
    pub remote_url: Option<String>,
    pub poll: PollPolicy,
    /// Local engine executable
    pub local_command: String,
    /// Persistent cache directory; memory-only when unset
    pub cache_dir: Option<PathBuf>,
    /// Scratch directory for local engine output
    pub work_dir: PathBuf,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            params: OverlayParams::default(),
            remote_url: None,
            poll: PollPolicy::default(),
            local_command: "prepare-overlay".to_string(),
            cache_dir: None,
            work_dir: std::env::temp_dir().join("adreel").join("overlays"),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl OverlayConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let circle_defaults = CircleParams::default();

        let params = OverlayParams {
            engine: env_parse("OVERLAY_ENGINE").unwrap_or(defaults.params.engine),
            container: env_parse("OVERLAY_CONTAINER").unwrap_or(defaults.params.container),
            rembg_model: env_non_empty("OVERLAY_REMBG_MODEL").unwrap_or(defaults.params.rembg_model),
            circle: CircleParams {
                radius: env_parse("OVERLAY_CIRCLE_RADIUS").unwrap_or(circle_defaults.radius),
                center_x: env_parse("OVERLAY_CIRCLE_CENTER_X").unwrap_or(circle_defaults.center_x),
                center_y: env_parse("OVERLAY_CIRCLE_CENTER_Y").unwrap_or(circle_defaults.center_y),
                auto_center: env_parse("OVERLAY_CIRCLE_AUTO_CENTER").unwrap_or(circle_defaults.auto_center),
            },
        };

        let mut poll = defaults.poll;
        if let Some(secs) = env_parse::<u64>("OVERLAY_POLL_SECS") {
            poll = poll.with_interval(Duration::from_secs(secs.max(1)));
        }
        if let Some(secs) = env_parse::<u64>("OVERLAY_POLL_MAX_SECS") {
            poll = poll.with_max_interval(Duration::from_secs(secs));
        }
        if let Some(secs) = env_parse::<u64>("OVERLAY_TIMEOUT_SECS") {
            poll = poll.with_timeout(Duration::from_secs(secs));
        }

        Self {
            params,
            remote_url: env_non_empty("OVERLAY_REMOTE_URL"),
            poll,
            local_command: env_non_empty("OVERLAY_LOCAL_COMMAND").unwrap_or(defaults.local_command),
            cache_dir: env_non_empty("OVERLAY_CACHE_DIR").map(PathBuf::from),
            work_dir: defaults.work_dir,
        }
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn is_remote(&self) -> bool {
        self.remote_url.is_some()
    }

    /// Build a coordinator with the backend this config selects.
    pub fn build_coordinator(&self) -> OverlayResult<OverlayCoordinator> {
        let local = Arc::new(CommandOverlayEngine::new(&self.local_command, &self.work_dir));

        let backend = match &self.remote_url {
            Some(url) => OverlayBackend::Remote {
                remote: Arc::new(HttpOverlayClient::new(RemoteOverlayConfig::new(url))?),
                fallback: local,
                policy: self.poll.clone(),
            },
            None => OverlayBackend::Local(local),
        };

        let cache = match &self.cache_dir {
            Some(dir) => OverlayCache::persistent(dir),
            None => OverlayCache::in_memory(),
        };

        Ok(OverlayCoordinator::new(backend, cache))
    }
}
