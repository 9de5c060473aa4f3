//! Overlay job coordinator.
//!
//! Shapes are produced concurrently and independently: one shape failing
//! never affects another. Identical requests share a single computation.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, info, warn};

use adreel_models::{EngineKind, JobId, JobStatus, OverlayJob, OverlayShape};

use crate::cache::OverlayCache;
use crate::error::{OverlayError, OverlayResult};
use crate::local::LocalOverlayEngine;
use crate::metrics;
use crate::poll::{FailureTracker, PollPolicy};
use crate::remote::RemoteOverlayApi;
use crate::request::OverlayRequest;

/// Where cutouts are computed. Chosen once, at construction.
#[derive(Clone)]
pub enum OverlayBackend {
    Local(Arc<dyn LocalOverlayEngine>),
    /// Remote accelerator, with the local engine as fallback
    Remote {
        remote: Arc<dyn RemoteOverlayApi>,
        fallback: Arc<dyn LocalOverlayEngine>,
        policy: PollPolicy,
    },
}

impl std::fmt::Debug for OverlayBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlayBackend::Local(_) => f.write_str("OverlayBackend::Local"),
            OverlayBackend::Remote { policy, .. } => f
                .debug_struct("OverlayBackend::Remote")
                .field("policy", policy)
                .finish_non_exhaustive(),
        }
    }
}

/// A produced cutout.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayAsset {
    pub shape: OverlayShape,
    pub url: String,
    pub cache_hit: bool,
    /// Engine that produced the asset, `None` for cache hits
    pub engine: Option<EngineKind>,
    /// Jobs run for this asset, in order (remote first when it fell back)
    pub jobs: Vec<OverlayJob>,
    /// Why the remote job was abandoned, if it was
    pub fallback_reason: Option<String>,
}

impl OverlayAsset {
    fn cached(shape: OverlayShape, url: String) -> Self {
        Self {
            shape,
            url,
            cache_hit: true,
            engine: None,
            jobs: Vec::new(),
            fallback_reason: None,
        }
    }
}

pub struct OverlayCoordinator {
    backend: OverlayBackend,
    cache: OverlayCache,
    inflight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl OverlayCoordinator {
    pub fn new(backend: OverlayBackend, cache: OverlayCache) -> Self {
        Self {
            backend,
            cache,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn backend(&self) -> &OverlayBackend {
        &self.backend
    }

    pub fn cache(&self) -> &OverlayCache {
        &self.cache
    }

    /// Produce every requested shape concurrently.
    ///
    /// Results are keyed by shape, so only the first request for a shape is
    /// produced; later requests for the same shape are skipped.
    pub async fn produce_all(
        &self,
        requests: &[OverlayRequest],
    ) -> BTreeMap<OverlayShape, OverlayResult<OverlayAsset>> {
        let mut seen = BTreeSet::new();
        let unique: Vec<&OverlayRequest> = requests
            .iter()
            .filter(|request| {
                let first = seen.insert(request.shape);
                if !first {
                    warn!(shape = %request.shape, "Skipping duplicate overlay request for shape");
                }
                first
            })
            .collect();

        let results = join_all(
            unique
                .into_iter()
                .map(|request| async move { (request.shape, self.produce(request).await) }),
        )
        .await;
        results.into_iter().collect()
    }

    /// Produce one cutout, consulting the cache first.
    pub async fn produce(&self, request: &OverlayRequest) -> OverlayResult<OverlayAsset> {
        let key = request.cache_key();

        if let Some(url) = self.cache.get(&key).await {
            metrics::record_cache_lookup(true);
            debug!(shape = %request.shape, "Overlay cache hit");
            return Ok(OverlayAsset::cached(request.shape, url));
        }

        let digest = key.digest();
        let lock = self.key_lock(&digest);
        let result = {
            let _guard = lock.lock().await;

            // a concurrent identical request may have finished while we waited
            if let Some(url) = self.cache.get(&key).await {
                metrics::record_cache_lookup(true);
                Ok(OverlayAsset::cached(request.shape, url))
            } else {
                metrics::record_cache_lookup(false);
                let produced = self.run_backend(request).await;
                if let Ok(asset) = &produced {
                    self.cache.put(&key, &asset.url).await;
                }
                produced
            }
        };
        self.release_key(&digest, lock);
        result
    }

    fn key_lock(&self, digest: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut inflight = self
            .inflight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        inflight.entry(digest.to_string()).or_default().clone()
    }

    /// Drop the per-key lock once no other request holds or waits on it.
    fn release_key(&self, digest: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut inflight = self
            .inflight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let unused = inflight
            .get(digest)
            .is_some_and(|entry| Arc::ptr_eq(entry, &lock) && Arc::strong_count(&lock) == 2);
        if unused {
            inflight.remove(digest);
        }
    }

    async fn run_backend(&self, request: &OverlayRequest) -> OverlayResult<OverlayAsset> {
        match &self.backend {
            OverlayBackend::Local(engine) => {
                let (outcome, job) = run_local(engine.as_ref(), request).await;
                Ok(OverlayAsset {
                    shape: request.shape,
                    url: outcome?,
                    cache_hit: false,
                    engine: Some(EngineKind::Local),
                    jobs: vec![job],
                    fallback_reason: None,
                })
            }
            OverlayBackend::Remote {
                remote,
                fallback,
                policy,
            } => {
                let (outcome, remote_job) = run_remote(remote.as_ref(), policy, request).await;
                let mut jobs: Vec<OverlayJob> = remote_job.into_iter().collect();

                let error = match outcome {
                    Ok(url) => {
                        return Ok(OverlayAsset {
                            shape: request.shape,
                            url,
                            cache_hit: false,
                            engine: Some(EngineKind::Remote),
                            jobs,
                            fallback_reason: None,
                        })
                    }
                    Err(e) => e,
                };

                warn!(
                    shape = %request.shape,
                    error = %error,
                    "Remote overlay job failed, falling back to local engine"
                );
                metrics::record_fallback(error.kind());

                let (outcome, local_job) = run_local(fallback.as_ref(), request).await;
                jobs.push(local_job);
                Ok(OverlayAsset {
                    shape: request.shape,
                    url: outcome?,
                    cache_hit: false,
                    engine: Some(EngineKind::Local),
                    jobs,
                    fallback_reason: Some(error.to_string()),
                })
            }
        }
    }
}

/// Record the outcome on the job, keeping the first error.
fn settle(job: &mut OverlayJob, outcome: OverlayResult<String>) -> OverlayResult<String> {
    let recorded = match &outcome {
        Ok(url) => job.complete(url.clone()),
        Err(e) => job.fail(e.to_string()),
    };
    match (outcome, recorded) {
        (Ok(url), Ok(())) => Ok(url),
        (Ok(_), Err(transition)) => Err(transition.into()),
        (Err(e), _) => Err(e),
    }
}

async fn run_local(
    engine: &dyn LocalOverlayEngine,
    request: &OverlayRequest,
) -> (OverlayResult<String>, OverlayJob) {
    let mut job = OverlayJob::submitted(JobId::new(), request.shape, EngineKind::Local);
    let started = Instant::now();

    let outcome = match job.advance(JobStatus::Processing) {
        Ok(()) => engine.run(request).await,
        Err(transition) => Err(transition.into()),
    };
    let outcome = settle(&mut job, outcome);

    let elapsed = started.elapsed().as_secs_f64();
    metrics::record_job(EngineKind::Local, request.shape, outcome.is_ok(), elapsed);
    match &outcome {
        Ok(_) => info!(shape = %request.shape, elapsed_secs = elapsed, "Local overlay job completed"),
        Err(e) => warn!(shape = %request.shape, error = %e, "Local overlay job failed"),
    }
    (outcome, job)
}

async fn run_remote(
    remote: &dyn RemoteOverlayApi,
    policy: &PollPolicy,
    request: &OverlayRequest,
) -> (OverlayResult<String>, Option<OverlayJob>) {
    let started = Instant::now();
    let deadline = started + policy.timeout;

    let job_id = match timeout_at(deadline, remote.submit(request)).await {
        Ok(Ok(id)) => id,
        Ok(Err(e)) => return (Err(e), None),
        Err(_) => return (Err(OverlayError::submission("submit request timed out")), None),
    };

    let mut job = OverlayJob::submitted(JobId::from_string(job_id), request.shape, EngineKind::Remote);
    info!(job_id = %job.id.as_str(), shape = %request.shape, "Remote overlay job submitted");

    let outcome = poll_until_done(remote, policy, &mut job, started, deadline).await;
    metrics::record_job(
        EngineKind::Remote,
        request.shape,
        outcome.is_ok(),
        started.elapsed().as_secs_f64(),
    );
    (outcome, Some(job))
}

async fn poll_until_done(
    remote: &dyn RemoteOverlayApi,
    policy: &PollPolicy,
    job: &mut OverlayJob,
    started: Instant,
    deadline: Instant,
) -> OverlayResult<String> {
    let job_id = job.id.as_str().to_string();
    let timed_out = || OverlayError::JobTimeout {
        job_id: job_id.clone(),
        elapsed: started.elapsed(),
    };

    let mut tracker = FailureTracker::new(1);
    let mut attempt = 0u32;

    loop {
        let delay = policy.delay_for_attempt(attempt);
        attempt += 1;
        if Instant::now() + delay >= deadline {
            sleep_until_deadline(deadline).await;
            return Err(timed_out());
        }
        sleep(delay).await;

        let status = match timeout_at(deadline, remote.status(&job_id)).await {
            Err(_) => return Err(timed_out()),
            Ok(Ok(status)) => {
                tracker.record_success();
                status
            }
            Ok(Err(e)) => {
                if tracker.record_failure() {
                    warn!(job_id = %job_id, error = %e, "Overlay status poll failed");
                }
                if tracker.failure_count() > policy.max_status_errors {
                    return Err(e);
                }
                continue;
            }
        };

        debug!(job_id = %job_id, status = %status.status, attempt, "Overlay job status");

        match status.status {
            JobStatus::Submitted => {}
            JobStatus::Processing => {
                if job.status != JobStatus::Processing {
                    job.advance(JobStatus::Processing)?;
                }
            }
            JobStatus::Completed => {
                let outcome = match timeout_at(deadline, remote.result(&job_id)).await {
                    Ok(result) => result,
                    Err(_) => Err(timed_out()),
                };
                return settle(job, outcome);
            }
            JobStatus::Failed => {
                let message = status
                    .error
                    .unwrap_or_else(|| "remote job reported failure".to_string());
                return settle(job, Err(OverlayError::JobFailed(message)));
            }
        }
    }
}

async fn sleep_until_deadline(deadline: Instant) {
    if deadline > Instant::now() {
        tokio::time::sleep_until(deadline).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteStatus;
    use adreel_models::OverlayParams;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct FakeLocal {
        calls: AtomicUsize,
        fail: Vec<OverlayShape>,
        delay: Duration,
    }

    #[async_trait]
    impl LocalOverlayEngine for FakeLocal {
        async fn run(&self, request: &OverlayRequest) -> OverlayResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail.contains(&request.shape) {
                return Err(OverlayError::local_engine("segmentation crashed"));
            }
            Ok(format!("local://{}", request.shape))
        }
    }

    #[derive(Default)]
    struct ScriptedRemote {
        submits: AtomicUsize,
        reject_submit: bool,
        statuses: Mutex<VecDeque<JobStatus>>,
    }

    impl ScriptedRemote {
        fn with_statuses(statuses: &[JobStatus]) -> Self {
            Self {
                statuses: Mutex::new(statuses.iter().copied().collect()),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl RemoteOverlayApi for ScriptedRemote {
        async fn submit(&self, request: &OverlayRequest) -> OverlayResult<String> {
            let n = self.submits.fetch_add(1, Ordering::SeqCst);
            if self.reject_submit {
                return Err(OverlayError::submission("no capacity"));
            }
            Ok(format!("job-{}-{n}", request.shape))
        }

        async fn status(&self, _job_id: &str) -> OverlayResult<RemoteStatus> {
            let next = self.statuses.lock().unwrap().pop_front();
            Ok(RemoteStatus {
                status: next.unwrap_or(JobStatus::Processing),
                error: (next == Some(JobStatus::Failed)).then(|| "gpu oom".to_string()),
            })
        }

        async fn result(&self, job_id: &str) -> OverlayResult<String> {
            Ok(format!("remote://{job_id}"))
        }
    }

    fn fast_policy() -> PollPolicy {
        PollPolicy::default()
            .with_interval(Duration::from_millis(5))
            .with_max_interval(Duration::from_millis(5))
            .with_timeout(Duration::from_secs(5))
    }

    fn request(shape: OverlayShape) -> OverlayRequest {
        OverlayRequest::new("https://cdn/head.mp4", "fp-1", shape, OverlayParams::default())
    }

    fn remote_backend(remote: Arc<ScriptedRemote>, local: Arc<FakeLocal>, policy: PollPolicy) -> OverlayBackend {
        OverlayBackend::Remote {
            remote,
            fallback: local,
            policy,
        }
    }

    #[tokio::test]
    async fn test_local_backend_produces_each_shape_once() {
        let local = Arc::new(FakeLocal::default());
        let coordinator = OverlayCoordinator::new(OverlayBackend::Local(local.clone()), OverlayCache::in_memory());
        let requests = [request(OverlayShape::Rect), request(OverlayShape::Circle)];

        let first = coordinator.produce_all(&requests).await;
        assert_eq!(first.len(), 2);
        let rect = first[&OverlayShape::Rect].as_ref().unwrap();
        assert_eq!(rect.url, "local://rect");
        assert_eq!(rect.engine, Some(EngineKind::Local));
        assert_eq!(
            rect.jobs[0].history,
            vec![JobStatus::Submitted, JobStatus::Processing, JobStatus::Completed]
        );
        assert_eq!(local.calls.load(Ordering::SeqCst), 2);

        let second = coordinator.produce_all(&requests).await;
        for asset in second.values() {
            let asset = asset.as_ref().unwrap();
            assert!(asset.cache_hit);
            assert!(asset.jobs.is_empty());
        }
        assert_eq!(local.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_remote_success_follows_state_machine() {
        let remote = Arc::new(ScriptedRemote::with_statuses(&[
            JobStatus::Processing,
            JobStatus::Processing,
            JobStatus::Completed,
        ]));
        let local = Arc::new(FakeLocal::default());
        let coordinator = OverlayCoordinator::new(
            remote_backend(remote.clone(), local.clone(), fast_policy()),
            OverlayCache::in_memory(),
        );

        let asset = coordinator.produce(&request(OverlayShape::Circle)).await.unwrap();
        assert_eq!(asset.engine, Some(EngineKind::Remote));
        assert_eq!(asset.url, "remote://job-circle-0");
        assert_eq!(
            asset.jobs[0].history,
            vec![JobStatus::Submitted, JobStatus::Processing, JobStatus::Completed]
        );
        assert_eq!(local.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_remote_failure_falls_back_to_local() {
        let remote = Arc::new(ScriptedRemote::with_statuses(&[JobStatus::Processing, JobStatus::Failed]));
        let local = Arc::new(FakeLocal::default());
        let coordinator = OverlayCoordinator::new(
            remote_backend(remote, local.clone(), fast_policy()),
            OverlayCache::in_memory(),
        );

        let asset = coordinator.produce(&request(OverlayShape::Rect)).await.unwrap();
        assert_eq!(asset.engine, Some(EngineKind::Local));
        assert_eq!(asset.url, "local://rect");
        assert!(asset.fallback_reason.as_deref().unwrap().contains("gpu oom"));
        assert_eq!(asset.jobs.len(), 2);
        assert_eq!(asset.jobs[0].status, JobStatus::Failed);
        assert_eq!(asset.jobs[1].status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_rejected_submit_falls_back() {
        let remote = Arc::new(ScriptedRemote {
            reject_submit: true,
            ..Default::default()
        });
        let local = Arc::new(FakeLocal::default());
        let coordinator = OverlayCoordinator::new(
            remote_backend(remote, local.clone(), fast_policy()),
            OverlayCache::in_memory(),
        );

        let asset = coordinator.produce(&request(OverlayShape::Rect)).await.unwrap();
        assert_eq!(asset.engine, Some(EngineKind::Local));
        assert_eq!(asset.jobs.len(), 1);
    }

    #[tokio::test]
    async fn test_remote_timeout_falls_back() {
        let remote = Arc::new(ScriptedRemote::default());
        let local = Arc::new(FakeLocal::default());
        let policy = fast_policy().with_timeout(Duration::from_millis(60));
        let coordinator = OverlayCoordinator::new(
            remote_backend(remote, local.clone(), policy),
            OverlayCache::in_memory(),
        );

        let asset = coordinator.produce(&request(OverlayShape::Circle)).await.unwrap();
        assert_eq!(asset.engine, Some(EngineKind::Local));
        assert!(asset.fallback_reason.as_deref().unwrap().contains("did not finish"));
        assert!(!asset.jobs[0].is_terminal());
    }

    #[tokio::test]
    async fn test_shapes_fail_independently_and_failures_are_not_cached() {
        let local = Arc::new(FakeLocal {
            fail: vec![OverlayShape::Circle],
            ..Default::default()
        });
        let coordinator = OverlayCoordinator::new(OverlayBackend::Local(local.clone()), OverlayCache::in_memory());
        let requests = [request(OverlayShape::Rect), request(OverlayShape::Circle)];

        let results = coordinator.produce_all(&requests).await;
        assert!(results[&OverlayShape::Rect].is_ok());
        assert!(matches!(results[&OverlayShape::Circle], Err(OverlayError::LocalEngine(_))));
        assert_eq!(coordinator.cache().len().await, 1);

        // the failed shape is retried on the next run
        coordinator.produce_all(&requests).await;
        assert_eq!(local.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_identical_concurrent_requests_compute_once() {
        let local = Arc::new(FakeLocal {
            delay: Duration::from_millis(20),
            ..Default::default()
        });
        let coordinator = OverlayCoordinator::new(OverlayBackend::Local(local.clone()), OverlayCache::in_memory());
        let req = request(OverlayShape::Rect);

        let (a, b) = tokio::join!(coordinator.produce(&req), coordinator.produce(&req));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!(a.url, b.url);
        assert!(a.cache_hit ^ b.cache_hit);
        assert_eq!(local.calls.load(Ordering::SeqCst), 1);
        assert!(coordinator.inflight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_key_locks_are_released() {
        let local = Arc::new(FakeLocal {
            fail: vec![OverlayShape::Circle],
            ..Default::default()
        });
        let coordinator = OverlayCoordinator::new(OverlayBackend::Local(local), OverlayCache::in_memory());
        for n in 0..5 {
            let req = OverlayRequest::new(
                "https://cdn/head.mp4",
                format!("fp-{n}"),
                OverlayShape::Rect,
                OverlayParams::default(),
            );
            coordinator.produce(&req).await.unwrap();
        }
        assert!(coordinator.produce(&request(OverlayShape::Circle)).await.is_err());
        assert!(coordinator.inflight.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_shape_requests_produce_first_only() {
        let local = Arc::new(FakeLocal::default());
        let coordinator = OverlayCoordinator::new(OverlayBackend::Local(local.clone()), OverlayCache::in_memory());
        let mut wide = OverlayParams::default();
        wide.circle.radius = 0.45;
        let first = request(OverlayShape::Circle);
        let second = OverlayRequest::new("https://cdn/head.mp4", "fp-1", OverlayShape::Circle, wide);

        let results = coordinator
            .produce_all(&[first.clone(), second.clone(), request(OverlayShape::Rect)])
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(local.calls.load(Ordering::SeqCst), 2);
        assert_eq!(coordinator.cache().get(&first.cache_key()).await.as_deref(), Some("local://circle"));
        assert!(coordinator.cache().get(&second.cache_key()).await.is_none());
    }
}
