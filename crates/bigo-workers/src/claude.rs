//! Hosted Claude models through the `claude` command-line tool.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bigo_conductor::{Worker, WorkerError};
use bigo_core::{Backend, ExecutionResult, WorkItem};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::estimate_tokens;

const QUOTA_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Output fragments that mean the account cannot pay for more work.
const QUOTA_MARKERS: [&str; 4] = ["credit", "quota", "balance", "payment"];

/// Claude worker settings.
#[derive(Debug, Clone)]
pub struct ClaudeConfig {
    /// Path to the CLI binary; a bare name is looked up on `PATH`.
    pub cli_path: PathBuf,
    pub model: String,
    pub backend: Backend,
    pub timeout: Duration,
}

impl ClaudeConfig {
    pub fn new(model: impl Into<String>, backend: Backend) -> Self {
        Self {
            cli_path: PathBuf::from("claude"),
            model: model.into(),
            backend,
            timeout: Duration::from_secs(600),
        }
    }

    pub fn with_cli_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cli_path = path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// USD per million (input, output) tokens.
fn price_per_million(model: &str) -> (f64, f64) {
    if model.contains("opus") {
        (15.0, 75.0)
    } else if model.contains("haiku") {
        (0.25, 1.25)
    } else {
        (3.0, 15.0)
    }
}

/// Cost estimate from prompt and response sizes at four characters a token.
pub(crate) fn estimate_cost(model: &str, input_chars: usize, output_chars: usize) -> f64 {
    let (input_price, output_price) = price_per_million(model);
    let input_tokens = input_chars as f64 / 4.0;
    let output_tokens = output_chars as f64 / 4.0;
    (input_tokens * input_price + output_tokens * output_price) / 1_000_000.0
}

/// Worker that shells out to `claude --print --model <model>`.
pub struct ClaudeWorker {
    id: String,
    config: ClaudeConfig,
}

impl ClaudeWorker {
    pub fn new(id: impl Into<String>, config: ClaudeConfig) -> Self {
        Self {
            id: id.into(),
            config,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.cli_path);
        cmd.arg("--print")
            .arg("--model")
            .arg(&self.config.model)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    async fn run_prompt(&self, prompt: &str) -> Result<std::process::Output, WorkerError> {
        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| {
                WorkerError::Process(format!(
                    "failed to spawn {}: {e}",
                    self.config.cli_path.display()
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // The CLI may exit before reading everything; its exit status
            // is what matters.
            if let Err(err) = stdin.write_all(prompt.as_bytes()).await {
                debug!(error = %err, "Failed to write prompt to claude stdin");
            }
        }

        child
            .wait_with_output()
            .await
            .map_err(|e| WorkerError::Process(e.to_string()))
    }
}

#[async_trait]
impl Worker for ClaudeWorker {
    fn id(&self) -> &str {
        &self.id
    }

    fn backend(&self) -> Backend {
        self.config.backend
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        item: &WorkItem,
    ) -> Result<ExecutionResult, WorkerError> {
        let start = Instant::now();
        let prompt = item.prompt_text();
        debug!(worker_id = %self.id, model = %self.config.model, "Running claude");

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WorkerError::Cancelled),
            outcome = tokio::time::timeout(self.config.timeout, self.run_prompt(&prompt)) => outcome,
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let output = match outcome {
            Err(_) => {
                let err = WorkerError::Timeout(self.config.timeout);
                warn!(worker_id = %self.id, error = %err, "Claude execution timed out");
                return Ok(ExecutionResult::failure(err.to_string()).with_duration_ms(duration_ms));
            }
            Ok(Err(err)) => {
                warn!(worker_id = %self.id, error = %err, "Claude execution failed");
                return Ok(ExecutionResult::failure(err.to_string()).with_duration_ms(duration_ms));
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Ok(ExecutionResult::failure(format!(
                "claude exited with code {}: {}",
                code,
                stderr.trim()
            ))
            .with_duration_ms(duration_ms));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        let cost = estimate_cost(&self.config.model, prompt.len(), text.len());
        let tokens = estimate_tokens(prompt.len() + text.len());
        Ok(ExecutionResult::success(text)
            .with_tokens(tokens)
            .with_cost(cost)
            .with_duration_ms(duration_ms))
    }

    /// Send a one-word prompt and look for billing complaints in the output.
    async fn check_quota(&self, cancel: &CancellationToken) -> Result<(), WorkerError> {
        let mut cmd = self.command();
        cmd.arg("hi").stdin(Stdio::null());

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WorkerError::Cancelled),
            outcome = tokio::time::timeout(QUOTA_CHECK_TIMEOUT, cmd.output()) => outcome,
        };
        let output = outcome
            .map_err(|_| WorkerError::Timeout(QUOTA_CHECK_TIMEOUT))?
            .map_err(|e| WorkerError::Process(format!("quota check failed: {e}")))?;

        if output.status.success() {
            return Ok(());
        }

        let combined = format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let lowered = combined.to_lowercase();
        if QUOTA_MARKERS.iter().any(|m| lowered.contains(m)) {
            Err(WorkerError::Quota(format!(
                "quota exceeded or payment required: {}",
                combined.trim()
            )))
        } else {
            Err(WorkerError::Process(format!(
                "quota check failed: {}",
                combined.trim()
            )))
        }
    }
}
