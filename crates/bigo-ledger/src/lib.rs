//! BigO Ledger
//!
//! Durable store for tasks, executions and (future) validations, backed by a
//! single SQLite connection. All writes go through one connection guarded by
//! a mutex, which serialises conflicting updates of the same task.

mod error;
mod ledger;
mod schema;
mod stats;

pub use error::LedgerError;
pub use ledger::Ledger;
pub use schema::SCHEMA_VERSION;
pub use stats::{ClassStats, Stats, ASSUMED_HOSTED_COST_PER_TASK};
