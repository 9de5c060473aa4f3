//! Overlay job coordination.
//!
//! Produces one alpha cutout of the head clip per requested shape. Each
//! request is looked up in the [`OverlayCache`] first; on a miss the
//! configured [`OverlayBackend`] runs it, either on the local engine or on a
//! remote accelerator that is polled until completion, with the local
//! engine as fallback when the remote side fails or times out.

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod local;
pub mod metrics;
pub mod poll;
pub mod remote;
pub mod request;

pub use cache::{CacheKey, OverlayCache};
pub use config::OverlayConfig;
pub use coordinator::{OverlayAsset, OverlayBackend, OverlayCoordinator};
pub use error::{OverlayError, OverlayResult};
pub use local::{CommandOverlayEngine, LocalOverlayEngine};
pub use poll::{FailureTracker, PollPolicy};
pub use remote::{HttpOverlayClient, RemoteEndpoints, RemoteOverlayApi, RemoteOverlayConfig, RemoteStatus};
pub use request::OverlayRequest;
