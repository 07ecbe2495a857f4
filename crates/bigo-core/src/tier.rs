//! Task complexity tiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// Ordinal complexity classification driving backend selection.
///
/// Tiers are totally ordered by severity; the discriminant is the value
/// persisted in the ledger's `tasks.tier` column.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Tier {
    /// Simple edits, formatting, typos.
    Trivial = 0,
    /// Straightforward changes following clear patterns.
    Simple = 1,
    /// Feature work and refactoring; the default when nothing matches.
    #[default]
    Standard = 2,
    /// Architecture and multi-file changes.
    Complex = 3,
    /// Security, payments, core logic, breaking changes.
    Critical = 4,
}

impl Tier {
    /// All tiers in ascending severity.
    pub const ALL: [Tier; 5] = [
        Tier::Trivial,
        Tier::Simple,
        Tier::Standard,
        Tier::Complex,
        Tier::Critical,
    ];

    /// Integer ordinal (0..=4).
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Tier for a persisted ordinal.
    pub fn from_ordinal(value: i64) -> Result<Self, CoreError> {
        match value {
            0 => Ok(Tier::Trivial),
            1 => Ok(Tier::Simple),
            2 => Ok(Tier::Standard),
            3 => Ok(Tier::Complex),
            4 => Ok(Tier::Critical),
            other => Err(CoreError::InvalidTier(other.to_string())),
        }
    }

    /// Lowercase name, as used in configuration files and CLI flags.
    pub fn name(self) -> &'static str {
        match self {
            Tier::Trivial => "trivial",
            Tier::Simple => "simple",
            Tier::Standard => "standard",
            Tier::Complex => "complex",
            Tier::Critical => "critical",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Tier::Trivial => "TRIVIAL",
            Tier::Simple => "SIMPLE",
            Tier::Standard => "STANDARD",
            Tier::Complex => "COMPLEX",
            Tier::Critical => "CRITICAL",
        };
        f.write_str(label)
    }
}

impl FromStr for Tier {
    type Err = CoreError;

    /// Accepts `standard`, `STANDARD` or `t2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        if let Some(ordinal) = lower.strip_prefix('t') {
            if let Ok(n) = ordinal.parse::<i64>() {
                return Tier::from_ordinal(n);
            }
        }
        Tier::ALL
            .into_iter()
            .find(|tier| tier.name() == lower)
            .ok_or_else(|| CoreError::InvalidTier(s.to_string()))
    }
}
