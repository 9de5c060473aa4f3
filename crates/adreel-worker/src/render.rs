//! Render service client.
//!
//! Submits a finished spec and polls until the render reaches a terminal
//! state. Only fully reconciled specs are ever passed in.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use adreel_models::RenderSpec;

pub type RenderResult<T> = Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Render submission rejected: {0}")]
    Rejected(String),

    #[error("Render {id} ended as {status}: {message}")]
    Failed {
        id: String,
        status: String,
        message: String,
    },

    #[error("Render {id} still running after {elapsed:?}")]
    Timeout { id: String, elapsed: Duration },

    #[error("Unexpected render response: {0}")]
    Protocol(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl RenderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RenderError::Network(_) | RenderError::Timeout { .. })
    }
}

#[derive(Clone)]
pub struct RenderConfig {
    /// Base URL; `render` and `render/{id}` are resolved against it
    pub api_url: String,
    pub api_key: Option<String>,
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl RenderConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: None,
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(900),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for RenderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Render state as reported by the service.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderStatus {
    Pending(String),
    Done { url: Option<String> },
    Failed { status: String, error: Option<String> },
}

/// A finished render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderOutput {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Serialize)]
struct SubmitBody<'a> {
    spec: &'a RenderSpec,
}

#[derive(Deserialize)]
struct SubmitResponse {
    id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn parse_status(body: StatusResponse) -> RenderStatus {
    match body.status.to_ascii_lowercase().as_str() {
        "done" | "completed" => RenderStatus::Done { url: body.url },
        "failed" | "cancelled" | "error" => RenderStatus::Failed {
            status: body.status,
            error: body.error,
        },
        _ => RenderStatus::Pending(body.status),
    }
}

#[derive(Debug, Clone)]
pub struct RenderClient {
    http: reqwest::Client,
    config: RenderConfig,
}

impl RenderClient {
    pub fn new(config: RenderConfig) -> RenderResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header("x-api-key", key),
            None => request,
        }
    }

    /// Submit a spec and return the render id.
    pub async fn submit(&self, spec: &RenderSpec) -> RenderResult<String> {
        let response = self
            .authorize(self.http.post(self.url("render")))
            .json(&SubmitBody { spec })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(RenderError::Rejected(format!("HTTP {status}: {text}")));
        }
        let body: SubmitResponse = response.json().await?;
        body.id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| RenderError::Rejected(body.error.unwrap_or_else(|| "response carried no id".to_string())))
    }

    pub async fn status(&self, id: &str) -> RenderResult<RenderStatus> {
        let response = self
            .authorize(self.http.get(self.url(&format!("render/{id}"))))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(RenderError::Protocol(format!(
                "status for {id} returned HTTP {}",
                response.status()
            )));
        }
        let body: StatusResponse = response.json().await?;
        Ok(parse_status(body))
    }

    /// Poll until the render finishes or the timeout passes.
    pub async fn wait(&self, id: &str) -> RenderResult<RenderOutput> {
        let started = Instant::now();
        loop {
            match self.status(id).await? {
                RenderStatus::Done { url } => {
                    info!(render_id = id, url = ?url, elapsed_ms = started.elapsed().as_millis() as u64, "Render finished");
                    return Ok(RenderOutput { id: id.to_string(), url });
                }
                RenderStatus::Failed { status, error } => {
                    warn!(render_id = id, status = %status, "Render failed");
                    return Err(RenderError::Failed {
                        id: id.to_string(),
                        status,
                        message: error.unwrap_or_else(|| "no error message".to_string()),
                    });
                }
                RenderStatus::Pending(state) => {
                    debug!(render_id = id, state = %state, "Render in progress");
                }
            }
            if started.elapsed() + self.config.poll_interval > self.config.timeout {
                return Err(RenderError::Timeout {
                    id: id.to_string(),
                    elapsed: started.elapsed(),
                });
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    pub async fn render(&self, spec: &RenderSpec) -> RenderResult<RenderOutput> {
        let id = self.submit(spec).await?;
        info!(render_id = %id, "Render submitted");
        self.wait(&id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> RenderClient {
        RenderClient::new(
            RenderConfig::new(server.uri())
                .with_api_key("secret")
                .with_poll_interval(Duration::from_millis(10))
                .with_timeout(Duration::from_millis(500)),
        )
        .unwrap()
    }

    #[test]
    fn test_debug_hides_api_key() {
        let config = RenderConfig::new("http://render.local").with_api_key("secret");
        assert!(!format!("{config:?}").contains("secret"));
    }

    #[tokio::test]
    async fn test_render_until_done() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/render"))
            .and(header("x-api-key", "secret"))
            .and(body_partial_json(json!({"spec": {"duration": 6.0}})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "r-1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/render/r-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "rendering"})))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/render/r-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status": "done", "url": "https://cdn/r-1.mp4"})),
            )
            .mount(&server)
            .await;

        let spec = RenderSpec {
            duration: Some(6.0),
            ..Default::default()
        };
        let output = client(&server).render(&spec).await.unwrap();
        assert_eq!(output.id, "r-1");
        assert_eq!(output.url.as_deref(), Some("https://cdn/r-1.mp4"));
    }

    #[tokio::test]
    async fn test_failed_render() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/render/r-2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status": "failed", "error": "bad asset"})),
            )
            .mount(&server)
            .await;

        let err = client(&server).wait("r-2").await.unwrap_err();
        assert!(matches!(err, RenderError::Failed { ref message, .. } if message == "bad asset"));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_rejected_submission() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/render"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = client(&server).submit(&RenderSpec::default()).await.unwrap_err();
        assert!(matches!(err, RenderError::Rejected(msg) if msg.contains("401")));
    }

    #[tokio::test]
    async fn test_render_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/render/r-3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "queued"})))
            .mount(&server)
            .await;

        let err = client(&server).wait("r-3").await.unwrap_err();
        assert!(matches!(err, RenderError::Timeout { .. }));
        assert!(err.is_retryable());
    }
}
