//! Conductor errors.

use bigo_ledger::LedgerError;
use thiserror::Error;

/// Fatal run errors.
///
/// Only persistence failures end up here. A run that cannot find a worker,
/// is cancelled, or fails on its backend still returns `Ok(RunResult)` with
/// `status = failed`.
#[derive(Debug, Error)]
pub enum ConductorError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}
