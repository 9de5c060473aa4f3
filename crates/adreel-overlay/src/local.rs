//! Local overlay engine.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use adreel_models::OverlayShape;

use crate::error::{OverlayError, OverlayResult};
use crate::request::OverlayRequest;

/// A cutout engine that runs on this machine and blocks until done.
#[async_trait]
pub trait LocalOverlayEngine: Send + Sync {
    /// Produce the cutout and return its URL (or local path).
    async fn run(&self, request: &OverlayRequest) -> OverlayResult<String>;
}

/// Runs an external cutout command.
///
/// The command receives the source URL, output path and cutout parameters
/// as flags and prints the uploaded result URL as its last line of stdout.
/// When it prints nothing, the output file itself is the result.
#[derive(Debug, Clone)]
pub struct CommandOverlayEngine {
    program: String,
    leading_args: Vec<String>,
    work_dir: PathBuf,
}

impl CommandOverlayEngine {
    pub fn new(program: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            work_dir: work_dir.into(),
        }
    }

    /// Arguments placed before the generated flags.
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn output_path(&self, request: &OverlayRequest) -> PathBuf {
        self.work_dir.join(format!(
            "overlay_{}_{}.{}",
            request.shape.as_str(),
            request.fingerprint.chars().take(12).collect::<String>(),
            request.params.container.as_str()
        ))
    }

    fn build_args(&self, request: &OverlayRequest, output: &Path) -> Vec<String> {
        let params = &request.params;
        let mut args = self.leading_args.clone();
        args.extend([
            "--input-url".to_string(),
            request.source_url.clone(),
            "--output".to_string(),
            output.to_string_lossy().into_owned(),
            "--container".to_string(),
            params.container.as_str().to_string(),
            "--engine".to_string(),
            params.engine.as_str().to_string(),
            "--rembg-model".to_string(),
            params.rembg_model.clone(),
            "--shape".to_string(),
            request.shape.as_str().to_string(),
        ]);
        if request.shape == OverlayShape::Circle {
            args.extend([
                "--circle-radius".to_string(),
                params.circle.radius.to_string(),
                "--circle-center-x".to_string(),
                params.circle.center_x.to_string(),
                "--circle-center-y".to_string(),
                params.circle.center_y.to_string(),
            ]);
            if params.circle.auto_center {
                args.push("--circle-auto-center".to_string());
            }
        }
        args
    }
}

#[async_trait]
impl LocalOverlayEngine for CommandOverlayEngine {
    async fn run(&self, request: &OverlayRequest) -> OverlayResult<String> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let output = self.output_path(request);
        let args = self.build_args(request, &output);

        info!(program = %self.program, shape = %request.shape, "Running local overlay engine");
        debug!(args = ?args, "Local overlay engine arguments");

        let result = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| OverlayError::local_engine(format!("failed to start {}: {}", self.program, e)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            return Err(OverlayError::local_engine(format!(
                "{} exited with {:?}: {}",
                self.program,
                result.status.code(),
                tail.into_iter().rev().collect::<Vec<_>>().join("\n")
            )));
        }

        let stdout = String::from_utf8_lossy(&result.stdout);
        match stdout.lines().map(str::trim).filter(|l| !l.is_empty()).last() {
            Some(line) if line.starts_with("http://") || line.starts_with("https://") => {
                Ok(line.to_string())
            }
            Some(line) if Path::new(line).exists() => Ok(line.to_string()),
            Some(line) => Err(OverlayError::local_engine(format!(
                "unexpected engine output: {line}"
            ))),
            None if output.exists() => Ok(output.to_string_lossy().into_owned()),
            None => Err(OverlayError::local_engine("engine produced no output")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adreel_models::OverlayParams;

    fn request(shape: OverlayShape) -> OverlayRequest {
        OverlayRequest::new("https://cdn/head.mp4", "0123456789abcdef", shape, OverlayParams::default())
    }

    #[test]
    fn test_args_for_rect_skip_circle_flags() {
        let engine = CommandOverlayEngine::new("prepare-overlay", "/tmp/work");
        let req = request(OverlayShape::Rect);
        let args = engine.build_args(&req, &engine.output_path(&req));

        assert_eq!(args[0], "--input-url");
        assert_eq!(args[1], "https://cdn/head.mp4");
        assert!(args[3].ends_with("overlay_rect_0123456789ab.mov"));
        assert!(!args.iter().any(|a| a.starts_with("--circle")));
    }

    #[test]
    fn test_args_for_circle() {
        let engine = CommandOverlayEngine::new("prepare-overlay", "/tmp/work").with_leading_args(["run"]);
        let req = request(OverlayShape::Circle);
        let args = engine.build_args(&req, &engine.output_path(&req));

        assert_eq!(args[0], "run");
        let radius = args.iter().position(|a| a == "--circle-radius").unwrap();
        assert_eq!(args[radius + 1], "0.35");
        assert_eq!(args.last().map(String::as_str), Some("--circle-auto-center"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_last_stdout_line_is_result() {
        let dir = tempfile::tempdir().unwrap();
        // generated flags start at $0, so $5 is the container
        let engine = CommandOverlayEngine::new("sh", dir.path())
            .with_leading_args(["-c", "echo working; echo https://cdn/overlay.$5"]);

        let url = engine.run(&request(OverlayShape::Rect)).await.unwrap();
        assert_eq!(url, "https://cdn/overlay.mov");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failure_reports_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let engine = CommandOverlayEngine::new("sh", dir.path())
            .with_leading_args(["-c", "echo model missing >&2; exit 3"]);

        let err = engine.run(&request(OverlayShape::Circle)).await.unwrap_err();
        match err {
            OverlayError::LocalEngine(msg) => {
                assert!(msg.contains("model missing"));
                assert!(msg.contains("Some(3)"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let dir = tempfile::tempdir().unwrap();
        let engine = CommandOverlayEngine::new("definitely-not-a-real-overlay-tool", dir.path());
        assert!(matches!(
            engine.run(&request(OverlayShape::Rect)).await,
            Err(OverlayError::LocalEngine(_))
        ));
    }
}
