//! Local models through the Ollama HTTP API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bigo_conductor::{Worker, WorkerError};
use bigo_core::{Backend, ExecutionResult, WorkItem};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::prompt::build_task_prompt;

/// Ollama worker settings.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL, e.g. `http://localhost:11434`.
    pub endpoint: String,
    pub model: String,
    pub backend: Backend,
    pub timeout: Duration,
}

impl OllamaConfig {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, backend: Backend) -> Self {
        Self {
            endpoint: endpoint.into(),
            model: model.into(),
            backend,
            timeout: Duration::from_secs(300),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    eval_count: u64,
    #[serde(default)]
    prompt_eval_count: u64,
}

impl GenerateResponse {
    fn total_tokens(&self) -> u64 {
        self.eval_count + self.prompt_eval_count
    }
}

/// Worker backed by an Ollama server. Always free.
pub struct OllamaWorker {
    id: String,
    config: OllamaConfig,
    client: reqwest::Client,
}

impl OllamaWorker {
    pub fn new(id: impl Into<String>, config: OllamaConfig) -> Result<Self, WorkerError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| WorkerError::Transport(e.to_string()))?;
        Ok(Self {
            id: id.into(),
            config: OllamaConfig {
                endpoint: config.endpoint.trim_end_matches('/').to_string(),
                ..config
            },
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, prompt: &str) -> Result<GenerateResponse, WorkerError> {
        let url = format!("{}/api/generate", self.config.endpoint);
        debug!(url = %url, model = %self.config.model, "Ollama generate");

        let response = self
            .client
            .post(&url)
            .json(&GenerateRequest {
                model: &self.config.model,
                prompt,
                stream: false,
            })
            .send()
            .await
            .map_err(|e| WorkerError::Transport(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::Transport(format!(
                "Ollama returned status {}: {}",
                status.as_u16(),
                body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| WorkerError::Decode(e.to_string()))
    }
}

#[async_trait]
impl Worker for OllamaWorker {
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

        match outcome {
            Ok(response) => Ok(ExecutionResult::success(response.response.clone())
                .with_tokens(response.total_tokens())
                .with_cost(0.0)
                .with_duration_ms(duration_ms)),
            Err(err) => {
                warn!(worker_id = %self.id, error = %err, "Ollama execution failed");
                Ok(ExecutionResult::failure(err.to_string()).with_duration_ms(duration_ms))
            }
        }
    }

    /// Local models have no billing quota; this only checks the endpoint
    /// answers.
    async fn check_quota(&self, cancel: &CancellationToken) -> Result<(), WorkerError> {
        let url = format!("{}/api/tags", self.config.endpoint);
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(WorkerError::Cancelled),
            response = self.client.get(&url).send() => response,
        };
        let response =
            response.map_err(|e| WorkerError::Transport(format!("endpoint unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(WorkerError::Transport(format!(
                "endpoint returned status {}",
                response.status().as_u16()
            )));
        }
        Ok(())
    }
}
