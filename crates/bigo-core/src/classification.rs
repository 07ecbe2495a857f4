//! Classifier output.

use crate::{Backend, Tier};
use serde::{Deserialize, Serialize};

/// Result of classifying one task description. Never persisted verbatim;
/// its tier and backend seed the Task record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub tier: Tier,
    /// 0.0..=0.95, a function of the winning score only.
    pub confidence: f64,
    pub recommended_backend: Backend,
    pub reasoning: String,
    /// Names of the winning tier's matched patterns, in declaration order.
    pub patterns: Vec<String>,
    pub estimated_lines: u32,
    pub estimated_files: u32,
}
