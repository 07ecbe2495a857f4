//! Tier routing policy: the static tier -> backend table plus fallback chains.
//!
//! The policy is plain data. It is built once at startup (from defaults or
//! from the `[routing]` configuration section), validated, and then shared
//! read-only by the classifier and the conductor.

use serde::{Deserialize, Serialize};

use crate::{Backend, CoreError, Tier};

/// Routing configuration for a single tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierPolicy {
    /// Backend tried first.
    pub primary: Backend,

    /// Backend used for validators, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<Backend>,

    /// Number of validators required.
    #[serde(default)]
    pub validator_count: u32,

    /// Approvals that constitute acceptance.
    #[serde(default)]
    pub required_approvals: u32,

    /// Alternates tried in order when the primary is missing or busy.
    #[serde(default)]
    pub fallbacks: Vec<Backend>,
}

impl TierPolicy {
    pub fn requires_validation(&self) -> bool {
        self.validator_count > 0
    }
}

/// The complete routing table, exactly one entry per tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingPolicy {
    pub trivial: TierPolicy,
    pub simple: TierPolicy,
    pub standard: TierPolicy,
    pub complex: TierPolicy,
    pub critical: TierPolicy,
}

impl RoutingPolicy {
    /// Look up the policy for a tier.
    pub fn get(&self, tier: Tier) -> &TierPolicy {
        match tier {
            Tier::Trivial => &self.trivial,
            Tier::Simple => &self.simple,
            Tier::Standard => &self.standard,
            Tier::Complex => &self.complex,
            Tier::Critical => &self.critical,
        }
    }

    pub fn primary(&self, tier: Tier) -> Backend {
        self.get(tier).primary
    }

    /// Fallback candidates for a tier, excluding its primary.
    pub fn fallbacks(&self, tier: Tier) -> impl Iterator<Item = Backend> + '_ {
        let policy = self.get(tier);
        policy
            .fallbacks
            .iter()
            .copied()
            .filter(move |b| *b != policy.primary)
    }

    /// Check internal consistency of the table.
    pub fn validate(&self) -> Result<(), CoreError> {
        for tier in Tier::ALL {
            let policy = self.get(tier);
            if policy.required_approvals > policy.validator_count {
                return Err(CoreError::InvalidPolicy(format!(
                    "{}: required_approvals ({}) exceeds validator_count ({})",
                    tier.name(),
                    policy.required_approvals,
                    policy.validator_count
                )));
            }
            if policy.validator_count > 0 && policy.validator.is_none() {
                return Err(CoreError::InvalidPolicy(format!(
                    "{}: validator_count is {} but no validator backend is set",
                    tier.name(),
                    policy.validator_count
                )));
            }
        }

        let critical = self.get(Tier::Critical);
        if let Some(free) = std::iter::once(critical.primary)
            .chain(critical.fallbacks.iter().copied())
            .find(|b| b.is_free())
        {
            return Err(CoreError::InvalidPolicy(format!(
                "critical: local backend {} is not allowed",
                free
            )));
        }
        Ok(())
    }
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        let cheap_fallbacks = vec![Backend::Ollama, Backend::OllamaFast, Backend::ClaudeHaiku];
        let capable_fallbacks = vec![Backend::ClaudeOpus, Backend::ClaudeSonnet];

        Self {
            trivial: TierPolicy {
                primary: Backend::OllamaFast,
                validator: None,
                validator_count: 0,
                required_approvals: 0,
                fallbacks: cheap_fallbacks.clone(),
            },
            simple: TierPolicy {
                primary: Backend::Ollama,
                validator: Some(Backend::Ollama),
                validator_count: 1,
                required_approvals: 1,
                fallbacks: cheap_fallbacks,
            },
            standard: TierPolicy {
                primary: Backend::ClaudeSonnet,
                validator: Some(Backend::ClaudeSonnet),
                validator_count: 2,
                required_approvals: 2,
                fallbacks: vec![
                    Backend::ClaudeSonnet,
                    Backend::OllamaReasoning,
                    Backend::ClaudeHaiku,
                ],
            },
            complex: TierPolicy {
                primary: Backend::ClaudeSonnet,
                validator: Some(Backend::ClaudeSonnet),
                validator_count: 3,
                required_approvals: 2,
                fallbacks: capable_fallbacks.clone(),
            },
            critical: TierPolicy {
                primary: Backend::ClaudeOpus,
                validator: Some(Backend::ClaudeSonnet),
                validator_count: 5,
                required_approvals: 4,
                fallbacks: capable_fallbacks,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_valid() {
        RoutingPolicy::default().validate().unwrap();
    }

    #[test]
    fn test_default_primaries() {
        let policy = RoutingPolicy::default();
        assert_eq!(policy.primary(Tier::Trivial), Backend::OllamaFast);
        assert_eq!(policy.primary(Tier::Simple), Backend::Ollama);
        assert_eq!(policy.primary(Tier::Standard), Backend::ClaudeSonnet);
        assert_eq!(policy.primary(Tier::Complex), Backend::ClaudeSonnet);
        assert_eq!(policy.primary(Tier::Critical), Backend::ClaudeOpus);
    }

    #[test]
    fn test_only_trivial_skips_validation() {
        let policy = RoutingPolicy::default();
        for tier in Tier::ALL {
            assert_eq!(
                policy.get(tier).requires_validation(),
                tier != Tier::Trivial,
                "{tier}"
            );
        }
    }

    #[test]
    fn test_fallbacks_exclude_primary() {
        let policy = RoutingPolicy::default();
        let standard: Vec<_> = policy.fallbacks(Tier::Standard).collect();
        assert_eq!(standard, vec![Backend::OllamaReasoning, Backend::ClaudeHaiku]);
        let critical: Vec<_> = policy.fallbacks(Tier::Critical).collect();
        assert_eq!(critical, vec![Backend::ClaudeSonnet]);
    }

    #[test]
    fn test_rejects_local_backend_for_critical() {
        let mut policy = RoutingPolicy::default();
        policy.critical.fallbacks.push(Backend::OllamaReasoning);
        assert!(matches!(
            policy.validate(),
            Err(CoreError::InvalidPolicy(_))
        ));
    }

    #[test]
    fn test_rejects_quorum_larger_than_validators() {
        let mut policy = RoutingPolicy::default();
        policy.simple.required_approvals = 3;
        assert!(policy.validate().is_err());
    }
}
