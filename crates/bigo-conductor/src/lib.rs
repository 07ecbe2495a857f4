//! BigO Conductor
//!
//! The routing engine: classify free-text work into a tier, pick a backend
//! through the routing policy and its fallback chains, execute on a leased
//! worker, and record the outcome in the ledger.

pub mod classifier;
pub mod conductor;
pub mod error;
pub mod fallback;
pub mod registry;
pub mod worker;

pub use classifier::{Classifier, ClassifierRules, Pattern, ScopeCue};
pub use conductor::{Conductor, QuotaReport, RunRequest, RunResult};
pub use error::ConductorError;
pub use fallback::{resolve, Resolution};
pub use registry::{WorkerLease, WorkerRegistry};
pub use worker::{Worker, WorkerError};

/// Error message for a run no worker could be found for.
pub const NO_WORKER_ERROR: &str = "no available worker for this task tier";

/// Error message for a run cancelled before it reached a worker.
pub const CANCELLED_ERROR: &str = "run cancelled before execution";
