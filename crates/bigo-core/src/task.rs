//! Task types.

use crate::{Backend, TaskId, TaskStatus, Tier};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A Task represents a unit of requested work as recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier.
    pub id: TaskId,

    /// Parent task, for subtask decomposition.
    pub parent_id: Option<TaskId>,

    /// Short title.
    pub title: String,

    /// Free-text description.
    pub description: String,

    /// Assigned complexity tier.
    pub tier: Tier,

    /// Current lifecycle status.
    pub status: TaskStatus,

    /// Backend the task was routed to (provisional until a worker starts).
    pub worker_backend: Option<Backend>,

    /// Optional path to context material for the task.
    pub context_path: Option<String>,

    /// When the task was created.
    pub created_at: DateTime<Utc>,

    /// Last status change.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a new pending Task with a fresh identifier.
    pub fn new(title: impl Into<String>, description: impl Into<String>, tier: Tier) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::generate(),
            parent_id: None,
            title: title.into(),
            description: description.into(),
            tier,
            status: TaskStatus::Pending,
            worker_backend: None,
            context_path: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder method to set a specific ID (useful for testing).
    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = id;
        self
    }

    /// Builder method to set the parent task.
    pub fn with_parent(mut self, parent: TaskId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    /// Builder method to set the routed backend.
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.worker_backend = Some(backend);
        self
    }

    /// Builder method to set the context path.
    pub fn with_context_path(mut self, path: impl Into<String>) -> Self {
        self.context_path = Some(path.into());
        self
    }

    /// Check if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// The projection of a Task handed to a worker for execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    pub tier: Tier,
    /// Backend actually resolved for this run.
    pub backend: Backend,
}

impl WorkItem {
    /// Title and description joined the way prompts and input hashes see them.
    pub fn prompt_text(&self) -> String {
        if self.description.is_empty() {
            self.title.clone()
        } else {
            format!("{}\n\n{}", self.title, self.description)
        }
    }
}
