//! Fallback resolution: primary backend first, then the tier's fallback chain.

use bigo_core::{Backend, RoutingPolicy, Tier};
use tracing::{debug, info};

use crate::registry::{WorkerLease, WorkerRegistry};

/// A leased worker chosen for a tier.
#[derive(Debug)]
pub struct Resolution {
    pub lease: WorkerLease,
    /// The lease is not on the tier's primary backend.
    pub used_fallback: bool,
}

impl Resolution {
    pub fn backend(&self) -> Backend {
        self.lease.backend()
    }
}

/// Candidate backends for `tier`, primary first, without duplicates.
pub fn candidates(policy: &RoutingPolicy, tier: Tier) -> impl Iterator<Item = Backend> + '_ {
    std::iter::once(policy.primary(tier)).chain(policy.fallbacks(tier))
}

/// Lease the first reachable backend for `tier`.
///
/// `None` means no registered handle in the chain is free; the caller
/// reports that as a failed run.
pub fn resolve(policy: &RoutingPolicy, tier: Tier, registry: &WorkerRegistry) -> Option<Resolution> {
    let primary = policy.primary(tier);
    for backend in candidates(policy, tier) {
        if let Some(lease) = registry.try_acquire(backend) {
            let used_fallback = backend != primary;
            if used_fallback {
                info!(tier = %tier, primary = %primary, fallback = %backend, "Using fallback worker");
            }
            return Some(Resolution {
                lease,
                used_fallback,
            });
        }
        debug!(tier = %tier, backend = %backend, "Backend not available");
    }
    None
}

/// Non-leasing preview of what `resolve` would pick right now.
pub fn preview(policy: &RoutingPolicy, tier: Tier, registry: &WorkerRegistry) -> Option<Backend> {
    candidates(policy, tier).find(|b| registry.is_available(*b))
}
