//! Core domain errors.

use thiserror::Error;

/// Core domain errors for BigO.
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    /// Unknown tier name or ordinal.
    #[error("Invalid tier: {0}")]
    InvalidTier(String),

    /// Unknown backend identity.
    #[error("Invalid backend: {0}")]
    InvalidBackend(String),

    /// Unknown task status string.
    #[error("Invalid task status: {0}")]
    InvalidStatus(String),

    /// Invalid state transition.
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Routing policy is missing a tier or otherwise malformed.
    #[error("Invalid routing policy: {0}")]
    InvalidPolicy(String),
}
