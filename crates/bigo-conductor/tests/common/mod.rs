//! Scripted worker used by the pipeline tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bigo_conductor::{Conductor, Worker, WorkerError};
use bigo_core::{Backend, ExecutionResult, RoutingPolicy, WorkItem};
use bigo_ledger::Ledger;
use tokio_util::sync::CancellationToken;

/// What a `MockWorker` does when asked to execute.
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed { output: String, tokens: u64, cost: f64 },
    /// Report a business failure (`success = false`).
    Fail(String),
    /// Return a hard transport error.
    Error(String),
    /// Sleep, then succeed, unless cancelled first.
    Slow(Duration),
    /// Block until cancelled.
    Hang,
}

pub struct MockWorker {
    id: String,
    backend: Backend,
    behavior: Behavior,
    quota_exhausted: bool,
    calls: AtomicUsize,
    last_item: Mutex<Option<WorkItem>>,
}

impl MockWorker {
    pub fn new(backend: Backend, behavior: Behavior) -> Self {
        Self {
            id: format!("mock-{}", backend.as_str().replace(':', "-")),
            backend,
            behavior,
            quota_exhausted: false,
            calls: AtomicUsize::new(0),
            last_item: Mutex::new(None),
        }
    }

    pub fn succeeding(backend: Backend, cost: f64) -> Self {
        Self::new(
            backend,
            Behavior::Succeed {
                output: format!("done by {backend}"),
                tokens: 120,
                cost,
            },
        )
    }

    pub fn with_exhausted_quota(mut self) -> Self {
        self.quota_exhausted = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_item(&self) -> Option<WorkItem> {
        self.last_item.lock().unwrap().clone()
    }
}

#[async_trait]
impl Worker for MockWorker {
    fn id(&self) -> &str {
        &self.id
    }

    fn backend(&self) -> Backend {
        self.backend
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        item: &WorkItem,
    ) -> Result<ExecutionResult, WorkerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_item.lock().unwrap() = Some(item.clone());

        match &self.behavior {
            Behavior::Succeed {
                output,
                tokens,
                cost,
            } => Ok(ExecutionResult::success(output.clone())
                .with_tokens(*tokens)
                .with_cost(*cost)
                .with_duration_ms(15)),
            Behavior::Fail(error) => Ok(ExecutionResult::failure(error.clone())),
            Behavior::Error(error) => Err(WorkerError::Transport(error.clone())),
            Behavior::Slow(delay) => tokio::select! {
                _ = cancel.cancelled() => Err(WorkerError::Cancelled),
                _ = tokio::time::sleep(*delay) => Ok(ExecutionResult::success("slow but done")),
            },
            Behavior::Hang => {
                cancel.cancelled().await;
                Err(WorkerError::Cancelled)
            }
        }
    }

    async fn check_quota(&self, _cancel: &CancellationToken) -> Result<(), WorkerError> {
        if self.quota_exhausted {
            Err(WorkerError::Quota("credit balance is too low".into()))
        } else {
            Ok(())
        }
    }
}

pub fn conductor() -> Conductor {
    Conductor::new(
        Arc::new(RoutingPolicy::default()),
        Arc::new(Ledger::open_in_memory().unwrap()),
    )
}
