//! Aggregate ledger statistics and the savings estimate.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use bigo_core::{BackendClass, TaskStatus};

use crate::error::LedgerError;

/// Flat cost assumed for a task had it run on a paid hosted backend instead.
pub const ASSUMED_HOSTED_COST_PER_TASK: f64 = 0.05;

/// Execution count and summed cost for one backend class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassStats {
    pub executions: u64,
    pub cost_usd: f64,
}

/// Ledger-wide statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_tasks: u64,
    /// Tasks still pending, assigned, working or validating.
    pub non_terminal_tasks: u64,
    pub completed_tasks: u64,
    pub total_executions: u64,
    pub local: ClassStats,
    pub claude: ClassStats,
    pub gemini: ClassStats,
    pub estimated_savings: f64,
    pub savings_percent: f64,
}

impl Stats {
    /// Fill in `estimated_savings` and `savings_percent` from the class totals.
    ///
    /// Every local or gemini execution is credited with the assumed hosted
    /// cost, minus what gemini actually charged.
    pub fn compute_savings(&mut self) {
        let offloaded = (self.local.executions + self.gemini.executions) as f64;
        self.estimated_savings = offloaded * ASSUMED_HOSTED_COST_PER_TASK - self.gemini.cost_usd;

        let denominator = self.claude.cost_usd + self.gemini.cost_usd + self.estimated_savings;
        self.savings_percent = if denominator > 0.0 {
            self.estimated_savings / denominator * 100.0
        } else {
            0.0
        };
    }

    /// Total spend across all classes.
    pub fn total_cost_usd(&self) -> f64 {
        self.local.cost_usd + self.claude.cost_usd + self.gemini.cost_usd
    }
}

fn count(conn: &Connection, sql: &str) -> Result<u64, LedgerError> {
    let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
    Ok(n.max(0) as u64)
}

fn class_stats(conn: &Connection, class: BackendClass) -> Result<ClassStats, LedgerError> {
    let pattern = format!("{}%", class.prefix());
    let (n, cost): (i64, f64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(cost_usd), 0) FROM executions WHERE backend LIKE ?1",
        params![pattern],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(ClassStats {
        executions: n.max(0) as u64,
        cost_usd: cost,
    })
}

pub(crate) fn collect(conn: &Connection) -> Result<Stats, LedgerError> {
    let non_terminal = TaskStatus::NON_TERMINAL
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ");

    let mut stats = Stats {
        total_tasks: count(conn, "SELECT COUNT(*) FROM tasks")?,
        non_terminal_tasks: count(
            conn,
            &format!("SELECT COUNT(*) FROM tasks WHERE status IN ({non_terminal})"),
        )?,
        completed_tasks: count(conn, "SELECT COUNT(*) FROM tasks WHERE status = 'done'")?,
        total_executions: count(conn, "SELECT COUNT(*) FROM executions")?,
        local: class_stats(conn, BackendClass::Local)?,
        claude: class_stats(conn, BackendClass::Claude)?,
        gemini: class_stats(conn, BackendClass::Gemini)?,
        ..Stats::default()
    };
    stats.compute_savings();
    Ok(stats)
}
