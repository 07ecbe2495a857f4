//! Ledger connection and CRUD operations.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use bigo_core::{Backend, ExecutionId, ExecutionRecord, Task, TaskId, TaskStatus, Tier};

use crate::error::LedgerError;
use crate::schema;
use crate::stats::{self, Stats};

/// SQLite-backed store of tasks and executions.
pub struct Ledger {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl Ledger {
    /// Create (or upgrade in place) a ledger database at `path`.
    pub fn init(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        schema::configure(&conn)?;
        schema::create(&conn)?;
        info!(path = %path.display(), "Ledger initialized");

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an existing ledger database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LedgerError::NotInitialized(path.to_path_buf()));
        }

        let conn = Connection::open(path)?;
        schema::configure(&conn)?;
        debug!(path = %path.display(), "Ledger opened");

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Create a throwaway in-memory ledger with the full schema.
    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let conn = Connection::open_in_memory()?;
        schema::configure(&conn)?;
        schema::create(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Database file path, `None` for in-memory ledgers.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, LedgerError> {
        self.conn.lock().map_err(|_| LedgerError::Poisoned)
    }

    /// Schema version marker, if the metadata table has one.
    pub fn schema_version(&self) -> Result<Option<String>, LedgerError> {
        let conn = self.lock()?;
        let version = conn
            .query_row(
                "SELECT value FROM metadata WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version)
    }

    /// Insert a new task.
    pub fn create_task(&self, task: &Task) -> Result<(), LedgerError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO tasks (id, parent_id, title, description, tier, status, worker_backend,
                                context_path, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                task.id.as_str(),
                task.parent_id.as_ref().map(|p| p.as_str()),
                task.title,
                task.description,
                task.tier.ordinal(),
                task.status.as_str(),
                task.worker_backend.map(|b| b.as_str()),
                task.context_path,
                task.created_at.to_rfc3339(),
                task.updated_at.to_rfc3339(),
            ],
        )?;
        debug!(task_id = %task.id, tier = %task.tier, "Task recorded");
        Ok(())
    }

    /// Fetch a task by id.
    pub fn get_task(&self, id: &TaskId) -> Result<Task, LedgerError> {
        let conn = self.lock()?;
        let row = conn
            .query_row(
                "SELECT id, parent_id, title, description, tier, status, worker_backend,
                        context_path, created_at, updated_at
                 FROM tasks WHERE id = ?1",
                params![id.as_str()],
                TaskRow::from_row,
            )
            .optional()?;

        match row {
            Some(row) => row.into_task(),
            None => Err(LedgerError::TaskNotFound(id.clone())),
        }
    }

    /// Most recently created tasks first.
    pub fn list_tasks(&self, limit: usize) -> Result<Vec<Task>, LedgerError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, parent_id, title, description, tier, status, worker_backend,
                    context_path, created_at, updated_at
             FROM tasks ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit as i64], TaskRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(TaskRow::into_task).collect()
    }

    /// Move a task to `status`, stamping `updated_at`.
    ///
    /// The current status is read in the same transaction; a backward or
    /// otherwise illegal transition is rejected and nothing is written.
    pub fn update_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<(), LedgerError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let current: Option<String> = tx
            .query_row(
                "SELECT status FROM tasks WHERE id = ?1",
                params![id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let current: TaskStatus = current
            .ok_or_else(|| LedgerError::TaskNotFound(id.clone()))?
            .parse()?;
        current.transition(status)?;

        tx.execute(
            "UPDATE tasks SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), Utc::now().to_rfc3339(), id.as_str()],
        )?;
        tx.commit()?;

        debug!(task_id = %id, from = %current, to = %status, "Task status updated");
        Ok(())
    }

    /// Append an execution record. The owning task must exist.
    pub fn create_execution(&self, exec: &ExecutionRecord) -> Result<(), LedgerError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let exists: bool = tx.query_row(
            "SELECT EXISTS(SELECT 1 FROM tasks WHERE id = ?1)",
            params![exec.task_id.as_str()],
            |row| row.get(0),
        )?;
        if !exists {
            return Err(LedgerError::TaskNotFound(exec.task_id.clone()));
        }

        tx.execute(
            "INSERT INTO executions (id, task_id, worker_id, backend, input_hash, output,
                                     tokens_used, cost_usd, duration_ms, status, error_msg,
                                     created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                exec.id.as_str(),
                exec.task_id.as_str(),
                exec.worker_id,
                exec.backend.as_str(),
                exec.input_hash,
                exec.output,
                exec.tokens_used as i64,
                exec.cost_usd,
                exec.duration_ms as i64,
                exec.status.as_str(),
                exec.error_msg,
                exec.created_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;

        debug!(
            execution_id = %exec.id,
            task_id = %exec.task_id,
            backend = %exec.backend,
            "Execution recorded"
        );
        Ok(())
    }

    /// All executions of a task, oldest first.
    pub fn list_executions(&self, task_id: &TaskId) -> Result<Vec<ExecutionRecord>, LedgerError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, task_id, worker_id, backend, input_hash, output, tokens_used, cost_usd,
                    duration_ms, status, error_msg, created_at
             FROM executions WHERE task_id = ?1 ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows = stmt
            .query_map(params![task_id.as_str()], ExecutionRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(ExecutionRow::into_record).collect()
    }

    /// Aggregate statistics over the whole ledger.
    pub fn get_stats(&self) -> Result<Stats, LedgerError> {
        let conn = self.lock()?;
        stats::collect(&conn)
    }
}

/// Raw `tasks` row before domain conversion.
struct TaskRow {
    id: String,
    parent_id: Option<String>,
    title: String,
    description: Option<String>,
    tier: i64,
    status: String,
    worker_backend: Option<String>,
    context_path: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TaskRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            parent_id: row.get(1)?,
            title: row.get(2)?,
            description: row.get(3)?,
            tier: row.get(4)?,
            status: row.get(5)?,
            worker_backend: row.get(6)?,
            context_path: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_task(self) -> Result<Task, LedgerError> {
        Ok(Task {
            id: TaskId::from(self.id),
            parent_id: self.parent_id.map(TaskId::from),
            title: self.title,
            description: self.description.unwrap_or_default(),
            tier: Tier::from_ordinal(self.tier)?,
            status: self.status.parse()?,
            worker_backend: self
                .worker_backend
                .filter(|b| !b.is_empty())
                .map(|b| b.parse::<Backend>())
                .transpose()?,
            context_path: self.context_path,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

/// Raw `executions` row before domain conversion.
struct ExecutionRow {
    id: String,
    task_id: String,
    worker_id: Option<String>,
    backend: String,
    input_hash: Option<String>,
    output: Option<String>,
    tokens_used: i64,
    cost_usd: f64,
    duration_ms: i64,
    status: String,
    error_msg: Option<String>,
    created_at: String,
}

impl ExecutionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            task_id: row.get(1)?,
            worker_id: row.get(2)?,
            backend: row.get(3)?,
            input_hash: row.get(4)?,
            output: row.get(5)?,
            tokens_used: row.get(6)?,
            cost_usd: row.get(7)?,
            duration_ms: row.get(8)?,
            status: row.get(9)?,
            error_msg: row.get(10)?,
            created_at: row.get(11)?,
        })
    }

    fn into_record(self) -> Result<ExecutionRecord, LedgerError> {
        Ok(ExecutionRecord {
            id: ExecutionId::from(self.id),
            task_id: TaskId::from(self.task_id),
            worker_id: self.worker_id.unwrap_or_default(),
            backend: self.backend.parse()?,
            input_hash: self.input_hash.unwrap_or_default(),
            output: self.output.unwrap_or_default(),
            tokens_used: self.tokens_used.max(0) as u64,
            cost_usd: self.cost_usd,
            duration_ms: self.duration_ms.max(0) as u64,
            status: self.status.parse()?,
            error_msg: self.error_msg.filter(|e| !e.is_empty()),
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

/// Accept RFC 3339 (what we write) and SQLite's `CURRENT_TIMESTAMP` format.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, LedgerError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|_| LedgerError::CorruptRow(format!("bad timestamp '{value}'")))
}
