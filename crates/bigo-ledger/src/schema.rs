//! Ledger schema.

use rusqlite::Connection;

/// Value stored under `metadata.schema_version`.
pub const SCHEMA_VERSION: &str = "1";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        parent_id TEXT REFERENCES tasks(id),
        title TEXT NOT NULL,
        description TEXT,
        tier INTEGER DEFAULT 2,
        status TEXT DEFAULT 'pending',
        worker_backend TEXT,
        context_path TEXT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS executions (
        id TEXT PRIMARY KEY,
        task_id TEXT NOT NULL REFERENCES tasks(id),
        worker_id TEXT,
        backend TEXT NOT NULL,
        input_hash TEXT,
        output TEXT,
        tokens_used INTEGER DEFAULT 0,
        cost_usd REAL DEFAULT 0,
        duration_ms INTEGER DEFAULT 0,
        status TEXT DEFAULT 'pending',
        error_msg TEXT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );

    -- Validator verdicts. Nothing writes here until quorum dispatch exists.
    CREATE TABLE IF NOT EXISTS validations (
        id TEXT PRIMARY KEY,
        execution_id TEXT NOT NULL REFERENCES executions(id),
        validator_id TEXT,
        backend TEXT NOT NULL,
        verdict TEXT,
        findings TEXT,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
    CREATE INDEX IF NOT EXISTS idx_tasks_tier ON tasks(tier);
    CREATE INDEX IF NOT EXISTS idx_executions_task ON executions(task_id);
    CREATE INDEX IF NOT EXISTS idx_executions_backend ON executions(backend);
    CREATE INDEX IF NOT EXISTS idx_validations_execution ON validations(execution_id);

    CREATE TABLE IF NOT EXISTS metadata (
        key TEXT PRIMARY KEY,
        value TEXT,
        updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );
";

/// Enable foreign keys on a fresh connection.
pub(crate) fn configure(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", true)
}

/// Create all tables and indexes and stamp the schema version.
pub(crate) fn create(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)?;
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value, updated_at)
         VALUES ('schema_version', ?1, CURRENT_TIMESTAMP)",
        [SCHEMA_VERSION],
    )?;
    Ok(())
}
