//! Execution pipeline.
//!
//! classify -> persist task -> resolve worker -> execute -> persist execution
//! -> finalize status. A run that cannot be routed or whose backend fails is
//! a normal outcome (`status = failed` in the `RunResult`); only ledger
//! failures are returned as errors.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bigo_core::{
    Backend, ClassificationResult, ExecutionRecord, ExecutionResult, RoutingPolicy, Task,
    TaskId, TaskStatus, Tier, WorkItem,
};
use bigo_ledger::Ledger;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::classifier::Classifier;
use crate::error::ConductorError;
use crate::fallback;
use crate::registry::WorkerRegistry;
use crate::worker::Worker;
use crate::{CANCELLED_ERROR, NO_WORKER_ERROR};

/// Input for one run.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub title: String,
    pub description: String,
    /// Overrides the classified tier and its recommended backend.
    pub forced_tier: Option<Tier>,
    pub context_path: Option<String>,
}

impl RunRequest {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.forced_tier = Some(tier);
        self
    }

    pub fn with_context_path(mut self, path: impl Into<String>) -> Self {
        self.context_path = Some(path.into());
        self
    }
}

/// Outcome of a run or dry run.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Persisted task, `None` for dry runs.
    pub task_id: Option<TaskId>,
    pub classification: ClassificationResult,
    /// Backend the work went to (the recommended one for dry runs).
    pub actual_backend: Option<Backend>,
    pub used_fallback: bool,
    /// Dry runs only: the recommended backend is free right now.
    pub worker_available: bool,
    /// Dry runs only: where the work would go instead.
    pub fallback_backend: Option<Backend>,
    pub execution: Option<ExecutionResult>,
    pub status: TaskStatus,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration: Duration,
    pub validation_required: bool,
    /// Validator quorum is not dispatched yet; a run needing it stops here.
    pub validation_pending: bool,
    pub dry_run: bool,
}

impl RunResult {
    fn new(classification: ClassificationResult, validation_required: bool) -> Self {
        let now = Utc::now();
        Self {
            task_id: None,
            classification,
            actual_backend: None,
            used_fallback: false,
            worker_available: false,
            fallback_backend: None,
            execution: None,
            status: TaskStatus::Pending,
            error: None,
            started_at: now,
            finished_at: now,
            duration: Duration::ZERO,
            validation_required,
            validation_pending: false,
            dry_run: false,
        }
    }

    fn fail(&mut self, error: impl Into<String>) {
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
    }

    fn finish(mut self, start: Instant) -> Self {
        self.finished_at = Utc::now();
        self.duration = start.elapsed();
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, TaskStatus::Done | TaskStatus::Validating)
    }

    /// Cost of the execution, zero when nothing ran.
    pub fn cost_usd(&self) -> f64 {
        self.execution.as_ref().map(|e| e.cost_usd).unwrap_or(0.0)
    }
}

/// A backend disabled by the pre-flight quota check.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaReport {
    pub backend: Backend,
    pub worker_id: String,
    pub message: String,
}

/// Hex SHA-256 of the task input, stored on every execution.
pub fn input_hash(title: &str, description: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"\n");
    hasher.update(description.as_bytes());
    hex::encode(hasher.finalize())
}

/// The routing engine.
pub struct Conductor {
    policy: Arc<RoutingPolicy>,
    classifier: Classifier,
    registry: WorkerRegistry,
    ledger: Arc<Ledger>,
}

impl Conductor {
    pub fn new(policy: Arc<RoutingPolicy>, ledger: Arc<Ledger>) -> Self {
        Self {
            classifier: Classifier::new(Arc::clone(&policy)),
            policy,
            registry: WorkerRegistry::new(),
            ledger,
        }
    }

    /// Replace the built-in classifier (e.g. with custom rules).
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn register_worker(&mut self, worker: Arc<dyn Worker>) {
        self.registry.register(worker);
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn policy(&self) -> &RoutingPolicy {
        &self.policy
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn classify(&self, title: &str, description: &str) -> ClassificationResult {
        self.classifier.classify(title, description)
    }

    fn classify_request(&self, request: &RunRequest) -> ClassificationResult {
        let classification = self.classify(&request.title, &request.description);
        match request.forced_tier {
            Some(tier) => self.classifier.force_tier(classification, tier),
            None => classification,
        }
    }

    /// Probe every registered worker's quota once. Workers that report a
    /// quota failure are unregistered for the rest of the process.
    pub async fn preflight(&mut self, cancel: &CancellationToken) -> Vec<QuotaReport> {
        let mut reports = Vec::new();
        for backend in self.registry.backends() {
            if cancel.is_cancelled() {
                break;
            }
            let Some(worker) = self.registry.get(backend).cloned() else {
                continue;
            };

            match worker.check_quota(cancel).await {
                Ok(()) => debug!(backend = %backend, "Quota check passed"),
                Err(err) if err.is_quota() => {
                    warn!(backend = %backend, error = %err, "Disabling backend after quota check");
                    self.registry.unregister(backend);
                    reports.push(QuotaReport {
                        backend,
                        worker_id: worker.id().to_string(),
                        message: err.to_string(),
                    });
                }
                Err(err) => {
                    warn!(backend = %backend, error = %err, "Quota check inconclusive, keeping worker");
                }
            }
        }
        reports
    }

    pub async fn run(
        &self,
        cancel: &CancellationToken,
        title: &str,
        description: &str,
    ) -> Result<RunResult, ConductorError> {
        self.run_request(cancel, RunRequest::new(title, description))
            .await
    }

    pub async fn run_request(
        &self,
        cancel: &CancellationToken,
        request: RunRequest,
    ) -> Result<RunResult, ConductorError> {
        let start = Instant::now();
        let classification = self.classify_request(&request);
        let tier = classification.tier;
        info!(
            tier = %tier,
            confidence = classification.confidence,
            backend = %classification.recommended_backend,
            "Task classified"
        );

        let mut task = Task::new(&request.title, &request.description, tier)
            .with_backend(classification.recommended_backend);
        if let Some(path) = &request.context_path {
            task = task.with_context_path(path.clone());
        }
        self.ledger.create_task(&task)?;
        info!(task_id = %task.id, tier = %tier, "Task created");

        let validation_required = self.policy.get(tier).requires_validation();
        let mut result = RunResult::new(classification, validation_required);
        result.task_id = Some(task.id.clone());

        let Some(resolution) = fallback::resolve(&self.policy, tier, &self.registry) else {
            // The task row keeps its pending status: it never started.
            warn!(task_id = %task.id, tier = %tier, "No available worker");
            result.fail(NO_WORKER_ERROR);
            return Ok(result.finish(start));
        };
        let backend = resolution.backend();
        result.actual_backend = Some(backend);
        result.used_fallback = resolution.used_fallback;
        result.worker_available = !resolution.used_fallback;
        info!(task_id = %task.id, backend = %backend, fallback = resolution.used_fallback, "Worker resolved");

        if cancel.is_cancelled() {
            self.ledger.update_task_status(&task.id, TaskStatus::Failed)?;
            warn!(task_id = %task.id, "Run cancelled before execution");
            result.fail(CANCELLED_ERROR);
            return Ok(result.finish(start));
        }

        self.ledger.update_task_status(&task.id, TaskStatus::Working)?;

        let item = WorkItem {
            id: task.id.clone(),
            title: task.title.clone(),
            description: task.description.clone(),
            tier,
            backend,
        };
        let worker_id = resolution.lease.worker().id().to_string();
        let exec_start = Instant::now();
        let outcome = resolution.lease.worker().execute(cancel, &item).await;
        let elapsed_ms = exec_start.elapsed().as_millis() as u64;
        drop(resolution);

        let mut execution = match outcome {
            Ok(execution) => execution,
            Err(err) => {
                warn!(task_id = %task.id, backend = %backend, error = %err, "Execution error");
                ExecutionResult::failure(err.to_string())
            }
        };
        if execution.duration_ms == 0 {
            execution.duration_ms = elapsed_ms;
        }

        let record = ExecutionRecord::from_result(task.id.clone(), worker_id, backend, &execution)
            .with_input_hash(input_hash(&task.title, &task.description));
        self.ledger.create_execution(&record)?;

        if !execution.success {
            let error = execution
                .error
                .clone()
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| "execution reported failure".to_string());
            self.ledger.update_task_status(&task.id, TaskStatus::Failed)?;
            warn!(task_id = %task.id, backend = %backend, error = %error, "Task failed");
            result.execution = Some(execution);
            result.fail(error);
            return Ok(result.finish(start));
        }

        let status = if validation_required {
            result.validation_pending = true;
            TaskStatus::Validating
        } else {
            TaskStatus::Done
        };
        self.ledger.update_task_status(&task.id, status)?;
        info!(
            task_id = %task.id,
            backend = %backend,
            status = %status,
            cost_usd = execution.cost_usd,
            tokens = execution.tokens_used,
            "Task finished"
        );

        result.status = status;
        result.execution = Some(execution);
        Ok(result.finish(start))
    }

    /// Classify and preview routing without touching the ledger.
    pub fn dry_run(&self, title: &str, description: &str) -> RunResult {
        self.dry_run_request(&RunRequest::new(title, description))
    }

    pub fn dry_run_request(&self, request: &RunRequest) -> RunResult {
        let start = Instant::now();
        let classification = self.classify_request(request);
        let tier = classification.tier;
        let recommended = classification.recommended_backend;
        let validation_required = self.policy.get(tier).requires_validation();

        let mut result = RunResult::new(classification, validation_required);
        result.dry_run = true;
        result.actual_backend = Some(recommended);
        result.worker_available = self.registry.is_available(recommended);
        if !result.worker_available {
            result.fallback_backend = fallback::preview(&self.policy, tier, &self.registry);
        }
        debug!(
            tier = %tier,
            backend = %recommended,
            available = result.worker_available,
            "Dry run"
        );
        result.finish(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::StubWorker;
    use std::sync::atomic::Ordering;

    fn conductor() -> Conductor {
        Conductor::new(
            Arc::new(RoutingPolicy::default()),
            Arc::new(Ledger::open_in_memory().unwrap()),
        )
    }

    #[test]
    fn test_input_hash_is_sha256_hex() {
        assert_eq!(
            input_hash("fix typo", "in README"),
            "2c1e6f6f0a8412b9d98e275198d9c65061cd5e7e93183088d37b5cc836769620"
        );
        assert_ne!(input_hash("ab", ""), input_hash("a", "b"));
    }

    #[test]
    fn test_dry_run_reports_fallback() {
        let mut c = conductor();
        c.register_worker(StubWorker::new(Backend::ClaudeHaiku));

        let result = c.dry_run("fix the typo in the word recieve", "");
        assert!(result.dry_run);
        assert!(result.task_id.is_none());
        assert_eq!(result.actual_backend, Some(Backend::OllamaFast));
        assert!(!result.worker_available);
        assert_eq!(result.fallback_backend, Some(Backend::ClaudeHaiku));
        assert!(!result.validation_required);
        assert_eq!(c.ledger().get_stats().unwrap().total_tasks, 0);
    }

    #[test]
    fn test_dry_run_with_primary_available() {
        let mut c = conductor();
        c.register_worker(StubWorker::new(Backend::ClaudeOpus));
        let result = c.dry_run_request(
            &RunRequest::new("do the thing", "").with_tier(Tier::Critical),
        );
        assert!(result.worker_available);
        assert!(result.fallback_backend.is_none());
        assert!(result.validation_required);
    }

    #[tokio::test]
    async fn test_cancelled_run_is_failed_without_execution() {
        let mut c = conductor();
        c.register_worker(StubWorker::new(Backend::OllamaFast));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = c
            .run(&cancel, "fix the typo in the word recieve", "")
            .await
            .unwrap();
        assert_eq!(result.status, TaskStatus::Failed);
        assert_eq!(result.error.as_deref(), Some(CANCELLED_ERROR));

        let task_id = result.task_id.unwrap();
        assert_eq!(c.ledger().get_task(&task_id).unwrap().status, TaskStatus::Failed);
        assert!(c.ledger().list_executions(&task_id).unwrap().is_empty());
        // lease released
        assert!(c.registry().is_available(Backend::OllamaFast));
    }

    #[tokio::test]
    async fn test_unavailable_handle_is_skipped() {
        let mut c = conductor();
        let offline = StubWorker::new(Backend::OllamaFast);
        offline.online.store(false, Ordering::SeqCst);
        c.register_worker(offline);
        c.register_worker(StubWorker::new(Backend::Ollama));

        let result = c
            .run(&CancellationToken::new(), "fix the typo in the word recieve", "")
            .await
            .unwrap();
        assert_eq!(result.status, TaskStatus::Done);
        assert_eq!(result.actual_backend, Some(Backend::Ollama));
        assert!(result.used_fallback);
    }
}
