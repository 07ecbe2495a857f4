//! Worker capability interface implemented by backend adapters.

use std::time::Duration;

use async_trait::async_trait;
use bigo_core::{Backend, ExecutionResult, WorkItem};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors a worker can raise instead of returning an `ExecutionResult`.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Billing, credit or rate-limit exhaustion. Disables the backend for
    /// the rest of the process when seen during preflight.
    #[error("Quota exhausted: {0}")]
    Quota(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Execution cancelled")]
    Cancelled,

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to decode backend response: {0}")]
    Decode(String),
}

impl WorkerError {
    pub fn is_quota(&self) -> bool {
        matches!(self, WorkerError::Quota(_))
    }
}

/// A handle bound to exactly one backend identity.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Worker identifier recorded on executions (e.g. "ollama-fast").
    fn id(&self) -> &str;

    /// Backend identity this handle serves.
    fn backend(&self) -> Backend;

    /// Whether the handle can take work at all. Busy tracking is done by the
    /// registry lease, not here.
    fn available(&self) -> bool {
        true
    }

    /// Run one work item. Implementations must observe `cancel`.
    ///
    /// A backend that answers but reports failure returns
    /// `Ok(ExecutionResult { success: false, .. })`.
    async fn execute(
        &self,
        cancel: &CancellationToken,
        item: &WorkItem,
    ) -> Result<ExecutionResult, WorkerError>;

    /// Pre-flight probe run once before any routing.
    async fn check_quota(&self, cancel: &CancellationToken) -> Result<(), WorkerError>;
}
