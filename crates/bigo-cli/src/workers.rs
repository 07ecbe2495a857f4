//! Worker construction from the `[workers]` configuration.

use std::sync::Arc;
use std::time::Duration;

use bigo_conductor::{Worker, WorkerError};
use bigo_core::{Backend, BackendClass};
use bigo_workers::{
    ClaudeConfig, ClaudeWorker, GeminiConfig, GeminiWorker, OllamaConfig, OllamaWorker,
};
use tracing::{debug, warn};

use crate::config::Config;

/// Worker id for a backend, e.g. `claude-sonnet`.
fn worker_id(backend: Backend) -> String {
    backend.as_str().replace(':', "-")
}

/// Build one worker per configured backend.
///
/// Gemini backends are skipped with a warning when no API key is available.
pub fn build_workers(config: &Config) -> Result<Vec<Arc<dyn Worker>>, WorkerError> {
    let mut workers: Vec<Arc<dyn Worker>> = Vec::new();
    let mut warned_missing_key = false;

    for backend in Backend::ALL {
        let Some(model) = config.model_for(backend) else {
            continue;
        };
        let id = worker_id(backend);

        let worker: Arc<dyn Worker> = match backend.class() {
            BackendClass::Local => {
                let section = &config.workers.ollama;
                let settings = OllamaConfig::new(&section.endpoint, model, backend)
                    .with_timeout(Duration::from_secs(section.timeout_secs));
                Arc::new(OllamaWorker::new(id, settings)?)
            }
            BackendClass::Claude => {
                let section = &config.workers.claude;
                let settings = ClaudeConfig::new(model, backend)
                    .with_cli_path(&section.cli_path)
                    .with_timeout(Duration::from_secs(section.timeout_secs));
                Arc::new(ClaudeWorker::new(id, settings))
            }
            BackendClass::Gemini => {
                let Some(api_key) = config.gemini_api_key() else {
                    if !warned_missing_key {
                        warn!("No Gemini API key configured, Gemini backends disabled");
                        warned_missing_key = true;
                    }
                    continue;
                };
                let section = &config.workers.gemini;
                let settings = GeminiConfig::new(api_key, model, backend)
                    .with_base_url(&section.base_url)
                    .with_timeout(Duration::from_secs(section.timeout_secs));
                Arc::new(GeminiWorker::new(id, settings)?)
            }
        };

        debug!(backend = %backend, model = %model, "Configured worker");
        workers.push(worker);
    }

    Ok(workers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backends(workers: &[Arc<dyn Worker>]) -> Vec<Backend> {
        workers.iter().map(|w| w.backend()).collect()
    }

    #[test]
    fn test_defaults_without_gemini() {
        let mut config = Config::default();
        config.workers.gemini.enabled = false;

        let workers = build_workers(&config).unwrap();
        assert_eq!(
            backends(&workers),
            vec![
                Backend::OllamaFast,
                Backend::Ollama,
                Backend::OllamaReasoning,
                Backend::ClaudeHaiku,
                Backend::ClaudeSonnet,
                Backend::ClaudeOpus,
            ]
        );
        assert_eq!(workers[4].id(), "claude-sonnet");
    }

    #[test]
    fn test_gemini_with_key() {
        let mut config = Config::default();
        config.workers.ollama.enabled = false;
        config.workers.claude.enabled = false;
        config.workers.gemini.api_key = Some("k".into());

        let workers = build_workers(&config).unwrap();
        assert_eq!(
            backends(&workers),
            vec![Backend::GeminiFlash, Backend::GeminiPro]
        );
    }

    #[test]
    fn test_disabled_backend_is_not_built() {
        let mut config = Config::default();
        config.workers.gemini.enabled = false;
        config.disable(Backend::OllamaReasoning);

        let workers = build_workers(&config).unwrap();
        assert!(!backends(&workers).contains(&Backend::OllamaReasoning));
        assert_eq!(workers.len(), 5);
    }
}
