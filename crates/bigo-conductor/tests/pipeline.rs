//! End-to-end pipeline scenarios against an in-memory ledger.

mod common;

use std::sync::Arc;
use std::time::Duration;

use bigo_conductor::{conductor::input_hash, RunRequest, CANCELLED_ERROR, NO_WORKER_ERROR};
use bigo_core::{Backend, ExecutionStatus, TaskStatus, Tier};
use common::{conductor, Behavior, MockWorker};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn typo_runs_on_local_worker_for_free() {
    let mut c = conductor();
    let worker = Arc::new(MockWorker::succeeding(Backend::OllamaFast, 0.0));
    c.register_worker(worker.clone());

    let title = "fix the typo in the word recieve";
    let result = c.run(&CancellationToken::new(), title, "").await.unwrap();

    assert_eq!(result.classification.tier, Tier::Trivial);
    assert_eq!(result.classification.recommended_backend, Backend::OllamaFast);
    assert_eq!(result.status, TaskStatus::Done);
    assert_eq!(result.actual_backend, Some(Backend::OllamaFast));
    assert!(!result.used_fallback);
    assert!(!result.validation_required);
    assert!(result.error.is_none());
    assert_eq!(result.cost_usd(), 0.0);
    assert_eq!(worker.calls(), 1);

    let item = worker.last_item().unwrap();
    assert_eq!(item.title, title);
    assert_eq!(item.tier, Tier::Trivial);
    assert_eq!(item.backend, Backend::OllamaFast);

    let task_id = result.task_id.unwrap();
    let task = c.ledger().get_task(&task_id).unwrap();
    assert_eq!(task.status, TaskStatus::Done);
    assert_eq!(task.tier, Tier::Trivial);
    assert_eq!(task.worker_backend, Some(Backend::OllamaFast));

    let execs = c.ledger().list_executions(&task_id).unwrap();
    assert_eq!(execs.len(), 1);
    assert_eq!(execs[0].status, ExecutionStatus::Completed);
    assert_eq!(execs[0].backend, Backend::OllamaFast);
    assert_eq!(execs[0].worker_id, "mock-ollama-fast");
    assert_eq!(execs[0].tokens_used, 120);
    assert_eq!(execs[0].duration_ms, 15);
    assert_eq!(execs[0].input_hash, input_hash(title, ""));
}

#[tokio::test]
async fn critical_task_without_workers_fails_and_writes_no_execution() {
    let c = conductor();
    let result = c
        .run(
            &CancellationToken::new(),
            "implement authentication for the payment API",
            "",
        )
        .await
        .unwrap();

    assert_eq!(result.classification.tier, Tier::Critical);
    assert_eq!(result.classification.patterns, vec!["security", "payments"]);
    assert_eq!(result.classification.recommended_backend, Backend::ClaudeOpus);
    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(result.error.as_deref(), Some(NO_WORKER_ERROR));
    assert!(result.actual_backend.is_none());
    assert!(result.execution.is_none());

    let task_id = result.task_id.unwrap();
    // Never started, so the row was not moved to failed.
    assert_eq!(c.ledger().get_task(&task_id).unwrap().status, TaskStatus::Pending);
    assert!(c.ledger().list_executions(&task_id).unwrap().is_empty());
    assert_eq!(c.ledger().get_stats().unwrap().total_executions, 0);
}

#[tokio::test]
async fn critical_task_does_not_fall_back_to_local_workers() {
    let mut c = conductor();
    c.register_worker(Arc::new(MockWorker::succeeding(Backend::OllamaReasoning, 0.0)));
    c.register_worker(Arc::new(MockWorker::succeeding(Backend::ClaudeHaiku, 0.001)));

    let result = c
        .run(&CancellationToken::new(), "rotate the encryption secret", "")
        .await
        .unwrap();
    assert_eq!(result.classification.tier, Tier::Critical);
    assert_eq!(result.status, TaskStatus::Failed);
}

#[tokio::test]
async fn standard_task_stops_at_pending_validation() {
    let mut c = conductor();
    c.register_worker(Arc::new(MockWorker::succeeding(Backend::ClaudeSonnet, 0.02)));

    let result = c
        .run(
            &CancellationToken::new(),
            "refactor the widget to use new component pattern, across multiple files",
            "",
        )
        .await
        .unwrap();

    assert_eq!(result.classification.tier, Tier::Standard);
    assert_eq!(result.classification.patterns, vec!["refactor"]);
    assert_eq!(result.classification.estimated_files, 5);
    assert_eq!(result.status, TaskStatus::Validating);
    assert!(result.validation_required);
    assert!(result.validation_pending);
    assert!(result.is_success());

    let task_id = result.task_id.unwrap();
    assert_eq!(
        c.ledger().get_task(&task_id).unwrap().status,
        TaskStatus::Validating
    );
    let stats = c.ledger().get_stats().unwrap();
    assert_eq!(stats.claude.executions, 1);
    assert!((stats.claude.cost_usd - 0.02).abs() < 1e-9);
}

#[tokio::test]
async fn business_failure_marks_task_failed_and_records_attempt() {
    let mut c = conductor();
    c.register_worker(Arc::new(MockWorker::new(
        Backend::OllamaFast,
        Behavior::Fail("model not found".into()),
    )));

    let result = c
        .run(&CancellationToken::new(), "fix the typo in the README", "")
        .await
        .unwrap();
    assert_eq!(result.status, TaskStatus::Failed);
    assert_eq!(result.error.as_deref(), Some("model not found"));
    assert!(!result.execution.as_ref().unwrap().success);

    let task_id = result.task_id.unwrap();
    assert_eq!(c.ledger().get_task(&task_id).unwrap().status, TaskStatus::Failed);
    let execs = c.ledger().list_executions(&task_id).unwrap();
    assert_eq!(execs.len(), 1);
    assert_eq!(execs[0].status, ExecutionStatus::Failed);
    assert_eq!(execs[0].error_msg.as_deref(), Some("model not found"));
}

#[tokio::test]
async fn hard_worker_error_is_reported_like_a_failure() {
    let mut c = conductor();
    c.register_worker(Arc::new(MockWorker::new(
        Backend::OllamaFast,
        Behavior::Error("connection refused".into()),
    )));

    let result = c
        .run(&CancellationToken::new(), "fix the typo in the README", "")
        .await
        .unwrap();
    assert_eq!(result.status, TaskStatus::Failed);
    assert!(result.error.unwrap().contains("connection refused"));
}

#[tokio::test]
async fn cancellation_reaches_the_worker() {
    let mut c = conductor();
    c.register_worker(Arc::new(MockWorker::new(Backend::OllamaFast, Behavior::Hang)));
    let cancel = CancellationToken::new();

    let (result, _) = tokio::join!(
        c.run(&cancel, "fix the typo in the README", ""),
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        }
    );
    let result = result.unwrap();
    assert_eq!(result.status, TaskStatus::Failed);
    assert!(result.error.unwrap().contains("cancelled"));
    assert!(c.registry().is_available(Backend::OllamaFast));
}

#[tokio::test]
async fn cancelled_token_stops_before_execution() {
    let mut c = conductor();
    let worker = Arc::new(MockWorker::succeeding(Backend::OllamaFast, 0.0));
    c.register_worker(worker.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = c.run(&cancel, "fix the typo", "").await.unwrap();
    assert_eq!(result.error.as_deref(), Some(CANCELLED_ERROR));
    assert_eq!(worker.calls(), 0);
}

#[tokio::test]
async fn concurrent_runs_never_share_a_worker() {
    let mut c = conductor();
    let worker = Arc::new(MockWorker::new(
        Backend::OllamaFast,
        Behavior::Slow(Duration::from_millis(50)),
    ));
    c.register_worker(worker.clone());
    let cancel = CancellationToken::new();

    let (a, b) = tokio::join!(
        c.run(&cancel, "fix the typo in the README", ""),
        c.run(&cancel, "fix the spelling in the docs", ""),
    );
    let mut statuses = vec![a.unwrap().status, b.unwrap().status];
    statuses.sort_by_key(|s| s.as_str());

    assert_eq!(statuses, vec![TaskStatus::Done, TaskStatus::Failed]);
    assert_eq!(worker.calls(), 1);
}

#[tokio::test]
async fn quota_preflight_disables_backend_and_run_falls_back() {
    let mut c = conductor();
    c.register_worker(Arc::new(
        MockWorker::succeeding(Backend::ClaudeSonnet, 0.02).with_exhausted_quota(),
    ));
    c.register_worker(Arc::new(MockWorker::succeeding(Backend::ClaudeHaiku, 0.001)));

    let reports = c.preflight(&CancellationToken::new()).await;
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].backend, Backend::ClaudeSonnet);
    assert!(reports[0].message.contains("credit"));
    assert!(!c.registry().contains(Backend::ClaudeSonnet));

    let result = c
        .run(&CancellationToken::new(), "refactor the parser", "")
        .await
        .unwrap();
    assert_eq!(result.classification.recommended_backend, Backend::ClaudeSonnet);
    assert_eq!(result.actual_backend, Some(Backend::ClaudeHaiku));
    assert!(result.used_fallback);
    assert_eq!(result.status, TaskStatus::Validating);
}

#[tokio::test]
async fn forced_tier_overrides_classification() {
    let mut c = conductor();
    c.register_worker(Arc::new(MockWorker::succeeding(Backend::OllamaFast, 0.0)));
    let opus = Arc::new(MockWorker::succeeding(Backend::ClaudeOpus, 0.5));
    c.register_worker(opus.clone());

    let result = c
        .run_request(
            &CancellationToken::new(),
            RunRequest::new("fix the typo", "").with_tier(Tier::Critical),
        )
        .await
        .unwrap();
    assert_eq!(result.classification.tier, Tier::Critical);
    assert_eq!(result.actual_backend, Some(Backend::ClaudeOpus));
    assert_eq!(opus.calls(), 1);

    let task = c.ledger().get_task(&result.task_id.unwrap()).unwrap();
    assert_eq!(task.tier, Tier::Critical);
}

#[tokio::test]
async fn stats_reflect_runs_across_backend_classes() {
    let mut c = conductor();
    c.register_worker(Arc::new(MockWorker::succeeding(Backend::OllamaFast, 0.0)));
    let cancel = CancellationToken::new();

    // Critical work never falls back to a local worker, so this one never starts.
    let stranded = c
        .run(&cancel, "implement authentication for the payment API", "")
        .await
        .unwrap();
    assert_eq!(stranded.status, TaskStatus::Failed);

    c.register_worker(Arc::new(MockWorker::succeeding(Backend::ClaudeSonnet, 0.03)));
    c.run(&cancel, "fix the typo in the README", "").await.unwrap();
    c.run(&cancel, "fix the typo in the changelog", "").await.unwrap();
    c.run(&cancel, "refactor the parser", "").await.unwrap();

    // Opus is missing, so the critical run falls back to Sonnet.
    let fallback = c
        .run(&cancel, "rotate the encryption secret", "")
        .await
        .unwrap();
    assert_eq!(fallback.classification.tier, Tier::Critical);
    assert_eq!(fallback.actual_backend, Some(Backend::ClaudeSonnet));
    assert!(fallback.used_fallback);
    assert_eq!(fallback.status, TaskStatus::Validating);

    let stats = c.ledger().get_stats().unwrap();
    assert_eq!(stats.total_tasks, 5);
    assert_eq!(stats.completed_tasks, 2);
    // two validating plus the never-started pending task
    assert_eq!(stats.non_terminal_tasks, 3);
    assert_eq!(stats.total_executions, 4);
    assert_eq!(stats.local.executions, 2);
    assert_eq!(stats.claude.executions, 2);
    assert!((stats.claude.cost_usd - 0.06).abs() < 1e-9);
    assert_eq!(stats.gemini.executions, 0);
    assert!((stats.estimated_savings - 0.10).abs() < 1e-9);
    assert!((stats.savings_percent - 62.5).abs() < 1e-9);

    let task = c.ledger().get_task(&stranded.task_id.unwrap()).unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
}
