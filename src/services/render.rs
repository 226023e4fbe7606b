use async_trait::async_trait;
use camino::Utf8PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;

/// Default wall-clock budget for one renderer invocation.
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(120);

/// Everything the external renderer needs for one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub input: Utf8PathBuf,
    pub output: Utf8PathBuf,
    pub stylesheet: Utf8PathBuf,
    pub title: String,
    pub math_enabled: bool,
    pub toc_depth: u8,
    pub numbered_sections: bool,
}

/// Errors from a single conversion. Captured at the worker boundary and
/// recorded into the document's result; never propagated past it.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("renderer exited with status {status}: {diagnostic}")]
    Failed { status: i32, diagnostic: String },

    #[error("renderer timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to run renderer: {0}")]
    Process(#[from] std::io::Error),
}

/// External renderer collaborator.
///
/// One method, object-safe, so the orchestrator's concurrency and aggregation
/// logic can be exercised against a fake that records invocations and returns
/// canned results.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> Result<(), ConversionError>;
}

/// Renderer backed by the `pandoc` CLI with the weasyprint PDF engine.
pub struct PandocRenderer {
    timeout: Duration,
}

impl PandocRenderer {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Build the pandoc argument vector for a request.
    pub fn build_command(request: &RenderRequest) -> Vec<String> {
        let mut args = vec![
            request.input.to_string(),
            "--from".to_string(),
            "markdown".to_string(),
            "--to".to_string(),
            "html5".to_string(),
            "--standalone".to_string(),
            "--embed-resources".to_string(),
            "--css".to_string(),
            request.stylesheet.to_string(),
            "--toc".to_string(),
            "--toc-depth".to_string(),
            request.toc_depth.to_string(),
        ];

        if request.numbered_sections {
            args.push("--number-sections".to_string());
        }

        args.push(format!("--metadata=title:{}", request.title));
        args.push("--pdf-engine".to_string());
        args.push("weasyprint".to_string());

        if request.math_enabled {
            args.push("--mathjax".to_string());
            args.push("--mathml".to_string());
        }

        args.push("--output".to_string());
        args.push(request.output.to_string());

        args
    }
}

impl Default for PandocRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Renderer for PandocRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<(), ConversionError> {
        let args = Self::build_command(request);
        tracing::debug!("Executing: pandoc {}", args.join(" "));

        let start = Instant::now();

        let output = timeout(self.timeout, Command::new("pandoc").args(&args).output())
            .await
            .map_err(|_| {
                tracing::warn!("pandoc timed out after {:?} for {}", self.timeout, request.input);
                ConversionError::Timeout(self.timeout)
            })??;

        let duration = start.elapsed();

        if output.status.success() {
            tracing::debug!(
                "pandoc completed {} in {:.2}s",
                request.output,
                duration.as_secs_f32()
            );
            Ok(())
        } else {
            let status = output.status.code().unwrap_or(-1);
            let mut diagnostic = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if diagnostic.is_empty() {
                diagnostic = "renderer produced no diagnostic output".to_string();
            }
            Err(ConversionError::Failed { status, diagnostic })
        }
    }
}
