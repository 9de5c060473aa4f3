//! Remote overlay service client.
//!
//! The remote side exposes three endpoints: `submit` (POST, returns a job
//! id), `status` and `result` (GET with a `job_id` query parameter).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use adreel_models::JobStatus;

use crate::error::{OverlayError, OverlayResult};
use crate::request::OverlayRequest;

/// Remote job status as reported by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteStatus {
    pub status: JobStatus,
    pub error: Option<String>,
}

/// Operations the coordinator needs from a remote accelerator.
#[async_trait]
pub trait RemoteOverlayApi: Send + Sync {
    /// Submit a job, returning its id.
    async fn submit(&self, request: &OverlayRequest) -> OverlayResult<String>;

    async fn status(&self, job_id: &str) -> OverlayResult<RemoteStatus>;

    /// Fetch the output URL of a completed job.
    async fn result(&self, job_id: &str) -> OverlayResult<String>;
}

/// The three endpoint URLs of a remote service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoints {
    pub submit: String,
    pub status: String,
    pub result: String,
}

impl RemoteEndpoints {
    /// Derive status and result URLs from the submit URL.
    ///
    /// Per-function hosts (`https://ws--app-submit.example.run`) swap the
    /// `-submit` host suffix; path-style URLs swap the last `submit`
    /// segment; anything else gets `/status` and `/result` appended.
    pub fn derive(submit_url: &str) -> Self {
        let submit = submit_url.trim().to_string();
        let swap = |replacement: &str| -> String {
            if submit.contains("--") {
                if let Some((base, rest)) = submit.rsplit_once("-submit") {
                    return format!("{base}-{replacement}{rest}");
                }
            }
            if let Some((base, rest)) = submit.rsplit_once("submit") {
                return format!("{base}{replacement}{rest}");
            }
            format!("{}/{replacement}", submit.trim_end_matches('/'))
        };
        Self {
            status: swap("status"),
            result: swap("result"),
            submit,
        }
    }
}

/// Configuration for the HTTP client.
#[derive(Debug, Clone)]
pub struct RemoteOverlayConfig {
    pub endpoints: RemoteEndpoints,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Retries for idempotent (status/result) requests
    pub max_retries: u32,
}

impl RemoteOverlayConfig {
    pub fn new(submit_url: &str) -> Self {
        Self {
            endpoints: RemoteEndpoints::derive(submit_url),
            request_timeout: Duration::from_secs(60),
            max_retries: 2,
        }
    }

    pub fn with_status_url(mut self, url: impl Into<String>) -> Self {
        self.endpoints.status = url.into();
        self
    }

    pub fn with_result_url(mut self, url: impl Into<String>) -> Self {
        self.endpoints.result = url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct SubmitPayload<'a> {
    video_url: &'a str,
    container: &'a str,
    engine: &'a str,
    shape: &'a str,
    rembg_model: &'a str,
    circle_radius: f64,
    circle_center_x: f64,
    circle_center_y: f64,
    circle_auto_center: bool,
}

impl<'a> From<&'a OverlayRequest> for SubmitPayload<'a> {
    fn from(request: &'a OverlayRequest) -> Self {
        let params = &request.params;
        Self {
            video_url: &request.source_url,
            container: params.container.as_str(),
            engine: params.engine.as_str(),
            shape: request.shape.as_str(),
            rembg_model: &params.rembg_model,
            circle_radius: params.circle.radius,
            circle_center_x: params.circle.center_x,
            circle_center_y: params.circle.center_y,
            circle_auto_center: params.circle.auto_center,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    job_id: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResultResponse {
    overlay_url: Option<String>,
}

/// Map a service status string onto the job state machine.
fn parse_status(raw: &str) -> Option<JobStatus> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "queued" | "pending" | "submitted" | "running" | "processing" => Some(JobStatus::Processing),
        "completed" | "complete" | "done" | "succeeded" => Some(JobStatus::Completed),
        "failed" | "error" | "cancelled" => Some(JobStatus::Failed),
        _ => None,
    }
}

/// reqwest-backed [`RemoteOverlayApi`].
pub struct HttpOverlayClient {
    http: Client,
    config: RemoteOverlayConfig,
}

impl HttpOverlayClient {
    pub fn new(config: RemoteOverlayConfig) -> OverlayResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(OverlayError::Network)?;

        Ok(Self { http, config })
    }

    pub fn endpoints(&self) -> &RemoteEndpoints {
        &self.config.endpoints
    }

    async fn get_job(&self, url: &str, job_id: &str) -> OverlayResult<reqwest::Response> {
        let response = self
            .with_retry(|| async {
                self.http
                    .get(url)
                    .query(&[("job_id", job_id)])
                    .send()
                    .await
                    .map_err(OverlayError::Network)
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OverlayError::protocol(format!(
                "{} returned {}: {}",
                url, status, body
            )));
        }
        Ok(response)
    }

    async fn with_retry<F, Fut, T>(&self, operation: F) -> OverlayResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = OverlayResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "Overlay service request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl RemoteOverlayApi for HttpOverlayClient {
    async fn submit(&self, request: &OverlayRequest) -> OverlayResult<String> {
        let url = &self.config.endpoints.submit;
        debug!(url = %url, shape = %request.shape, "Submitting overlay job");

        let response = self
            .http
            .post(url)
            .json(&SubmitPayload::from(request))
            .send()
            .await
            .map_err(|e| OverlayError::submission(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(OverlayError::submission(format!(
                "service returned {}: {}",
                status, body
            )));
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| OverlayError::submission(format!("unreadable response: {e}")))?;

        match body.job_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => Ok(id),
            None => Err(OverlayError::submission(
                body.error.unwrap_or_else(|| "response carried no job_id".to_string()),
            )),
        }
    }

    async fn status(&self, job_id: &str) -> OverlayResult<RemoteStatus> {
        let response = self.get_job(&self.config.endpoints.status, job_id).await?;
        let body: StatusResponse = response.json().await?;

        let status = parse_status(&body.status)
            .ok_or_else(|| OverlayError::protocol(format!("unknown job status '{}'", body.status)))?;
        Ok(RemoteStatus {
            status,
            error: body.error,
        })
    }

    async fn result(&self, job_id: &str) -> OverlayResult<String> {
        let response = self.get_job(&self.config.endpoints.result, job_id).await?;
        let body: ResultResponse = response.json().await?;

        body.overlay_url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| OverlayError::protocol(format!("job {job_id} result has no overlay_url")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adreel_models::{OverlayParams, OverlayShape};
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> OverlayRequest {
        OverlayRequest::new(
            "https://cdn.example.com/head.mp4",
            "fp",
            OverlayShape::Circle,
            OverlayParams::default(),
        )
    }

    fn client(server: &MockServer) -> HttpOverlayClient {
        let config = RemoteOverlayConfig::new(&format!("{}/submit", server.uri()));
        HttpOverlayClient::new(config).unwrap()
    }

    #[test]
    fn test_derive_function_hosts() {
        let endpoints = RemoteEndpoints::derive("https://team--cutout-submit.example.run");
        assert_eq!(endpoints.status, "https://team--cutout-status.example.run");
        assert_eq!(endpoints.result, "https://team--cutout-result.example.run");
    }

    #[test]
    fn test_derive_path_style() {
        let endpoints = RemoteEndpoints::derive("http://localhost:9000/jobs/submit");
        assert_eq!(endpoints.status, "http://localhost:9000/jobs/status");
        assert_eq!(endpoints.result, "http://localhost:9000/jobs/result");

        let bare = RemoteEndpoints::derive("http://localhost:9000/jobs/");
        assert_eq!(bare.status, "http://localhost:9000/jobs/status");
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("processing"), Some(JobStatus::Processing));
        assert_eq!(parse_status("Completed"), Some(JobStatus::Completed));
        assert_eq!(parse_status("error"), Some(JobStatus::Failed));
        assert_eq!(parse_status("exploded"), None);
    }

    #[tokio::test]
    async fn test_submit_sends_params() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submit"))
            .and(body_partial_json(serde_json::json!({
                "video_url": "https://cdn.example.com/head.mp4",
                "shape": "circle",
                "engine": "rembg",
                "container": "mov",
                "rembg_model": "u2netp",
                "circle_auto_center": true
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"job_id": "job-1"})))
            .mount(&server)
            .await;

        assert_eq!(client(&server).submit(&request()).await.unwrap(), "job-1");
    }

    #[tokio::test]
    async fn test_submit_without_job_id_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/submit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"error": "busy"})))
            .mount(&server)
            .await;

        let err = client(&server).submit(&request()).await.unwrap_err();
        assert!(matches!(err, OverlayError::JobSubmission(ref m) if m == "busy"));
    }

    #[tokio::test]
    async fn test_status_and_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status"))
            .and(query_param("job_id", "job-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "failed", "error": "oom"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/result"))
            .and(query_param("job_id", "job-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"overlay_url": "https://cdn/o.mov"})),
            )
            .mount(&server)
            .await;

        let client = client(&server);
        let status = client.status("job-1").await.unwrap();
        assert_eq!(status.status, JobStatus::Failed);
        assert_eq!(status.error.as_deref(), Some("oom"));
        assert_eq!(client.result("job-1").await.unwrap(), "https://cdn/o.mov");
    }

    #[tokio::test]
    async fn test_result_without_url_is_protocol_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/result"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let err = client(&server).result("job-1").await.unwrap_err();
        assert!(matches!(err, OverlayError::Protocol(_)));
    }
}
