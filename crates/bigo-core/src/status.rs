//! Task lifecycle status and its forward-only state machine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// Lifecycle state of a Task.
///
/// ```text
/// pending -> working -> [validating -> approved | rejected] -> done | failed
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task created, no worker started yet.
    #[default]
    Pending,
    /// Task bound to a worker but not yet started.
    Assigned,
    /// A worker is executing the task.
    Working,
    /// Execution succeeded and awaits validator quorum.
    Validating,
    /// Quorum approved the execution.
    Approved,
    /// Quorum rejected the execution.
    Rejected,
    /// Task completed successfully.
    Done,
    /// Task failed.
    Failed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 8] = [
        TaskStatus::Pending,
        TaskStatus::Assigned,
        TaskStatus::Working,
        TaskStatus::Validating,
        TaskStatus::Approved,
        TaskStatus::Rejected,
        TaskStatus::Done,
        TaskStatus::Failed,
    ];

    /// Statuses counted as "in flight" by ledger statistics.
    pub const NON_TERMINAL: [TaskStatus; 4] = [
        TaskStatus::Pending,
        TaskStatus::Assigned,
        TaskStatus::Working,
        TaskStatus::Validating,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Assigned => "assigned",
            TaskStatus::Working => "working",
            TaskStatus::Validating => "validating",
            TaskStatus::Approved => "approved",
            TaskStatus::Rejected => "rejected",
            TaskStatus::Done => "done",
            TaskStatus::Failed => "failed",
        }
    }

    /// Returns true if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// Whether moving from `self` to `next` is a legal forward transition.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, Assigned | Working | Failed)
                | (Assigned, Working | Failed)
                | (Working, Validating | Done | Failed)
                | (Validating, Approved | Rejected | Failed)
                | (Approved, Done)
                | (Rejected, Failed)
        )
    }

    /// Validate a transition, returning the target status on success.
    pub fn transition(self, next: TaskStatus) -> Result<TaskStatus, CoreError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidStateTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::InvalidStatus(s.to_string()))
    }
}
