//! BigO Core Domain Types
//!
//! This crate contains pure domain types with no dependencies on:
//! - Network or subprocess backends
//! - Database
//! - Runtime specifics
//!
//! Everything the classifier, the ledger and the conductor exchange is
//! defined here, including the static tier routing policy.

pub mod backend;
pub mod classification;
pub mod error;
pub mod execution;
pub mod ids;
pub mod policy;
pub mod status;
pub mod task;
pub mod tier;

// Re-export commonly used types
pub use backend::{Backend, BackendClass};
pub use classification::ClassificationResult;
pub use error::CoreError;
pub use execution::{ExecutionRecord, ExecutionResult, ExecutionStatus};
pub use ids::{ExecutionId, TaskId, ValidationId};
pub use policy::{RoutingPolicy, TierPolicy};
pub use status::TaskStatus;
pub use task::{Task, WorkItem};
pub use tier::Tier;
