//! Hosted Gemini models through the `generateContent` REST API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bigo_conductor::{Worker, WorkerError};
use bigo_core::{Backend, ExecutionResult, WorkItem};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::estimate_tokens;
use crate::prompt::build_task_prompt;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const QUOTA_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Gemini worker settings.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub backend: Backend,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, backend: Backend) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            backend,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    total_token_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: UsageMetadata,
}

impl GenerateResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.clone())
            .unwrap_or_default()
    }
}

/// Flat USD per million tokens.
fn rate_per_million(backend: Backend) -> f64 {
    match backend {
        Backend::GeminiPro => 7.0,
        _ => 0.5,
    }
}

fn looks_like_quota(status: u16, body: &str) -> bool {
    let body = body.to_lowercase();
    status == 429 || body.contains("quota") || body.contains("resource exhausted")
}

/// Worker backed by the Gemini HTTP API.
pub struct GeminiWorker {
    id: String,
    config: GeminiConfig,
    client: reqwest::Client,
}

impl GeminiWorker {
    pub fn new(id: impl Into<String>, config: GeminiConfig) -> Result<Self, WorkerError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| WorkerError::Transport(e.to_string()))?;
        Ok(Self {
            id: id.into(),
            config: GeminiConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn estimate_cost(&self, tokens: u64) -> f64 {
        tokens as f64 * rate_per_million(self.config.backend) / 1_000_000.0
    }

    async fn generate(&self, prompt: &str) -> Result<GenerateResponse, WorkerError> {
        if self.config.api_key.is_empty() {
            return Err(WorkerError::Transport("missing Gemini API key".into()));
        }

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.model
        );
        debug!(url = %url, "Gemini generateContent");

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&GenerateRequest {
                contents: vec![Content {
                    parts: vec![Part {
                        text: prompt.to_string(),
                    }],
                }],
            })
            .send()
            .await
            .map_err(|e| WorkerError::Transport(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("Gemini returned status {}: {}", status.as_u16(), body);
            return Err(if looks_like_quota(status.as_u16(), &body) {
                WorkerError::Quota(message)
            } else {
                WorkerError::Transport(message)
            });
        }

        response
            .json()
            .await
            .map_err(|e| WorkerError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Worker for GeminiWorker {
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
        let prompt = build_task_prompt(item);

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WorkerError::Cancelled),
            outcome = self.generate(&prompt) => outcome,
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                warn!(worker_id = %self.id, error = %err, "Gemini execution failed");
                return Ok(ExecutionResult::failure(err.to_string()).with_duration_ms(duration_ms));
            }
        };

        let output = response.text();
        let tokens = match response.usage_metadata.total_token_count {
            0 => estimate_tokens(prompt.len() + output.len()),
            reported => reported,
        };
        Ok(ExecutionResult::success(output)
            .with_tokens(tokens)
            .with_cost(self.estimate_cost(tokens))
            .with_duration_ms(duration_ms))
    }

    async fn check_quota(&self, cancel: &CancellationToken) -> Result<(), WorkerError> {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WorkerError::Cancelled),
            outcome = tokio::time::timeout(QUOTA_CHECK_TIMEOUT, self.generate("hi")) => outcome,
        };
        outcome.map_err(|_| WorkerError::Timeout(QUOTA_CHECK_TIMEOUT))??;
        Ok(())
    }
}
