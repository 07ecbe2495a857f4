//! Ledger errors.

use std::path::PathBuf;

use bigo_core::{CoreError, TaskId};
use thiserror::Error;

/// Errors returned by ledger operations. Every variant is fatal to the
/// caller's run: history integrity is not best-effort.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ledger not initialized at {}", .0.display())]
    NotInitialized(PathBuf),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Corrupt ledger row: {0}")]
    CorruptRow(String),

    #[error("Ledger connection lock poisoned")]
    Poisoned,
}
