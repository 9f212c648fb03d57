//! Watchdog — the three optional liveness tiers that run against the
//! Session Registry as a reader (tier 2 also writes protocol mail and,
//! on terminate, the registry's own state transition).
//!
//! - Tier 0 (mechanical): process/tmux liveness probe plus a
//!   last-activity clock, on a fixed interval.
//! - Tier 1 (triage): an optional, pluggable AI probe invoked when tier 0
//!   escalates, to classify *why* a session is stalled.
//! - Tier 2 (monitor contract): the rule that a `monitor`-capability
//!   session is persistent and never auto-completed by `log session-end`.

mod liveness;
mod runner;
mod triage;
mod types;

pub use liveness::{LivenessProbe, ProcessLivenessProbe};
pub use runner::Watchdog;
pub use triage::{NullTriageProbe, TriageProbe, TriageVerdict};
pub use types::{HealthAction, HealthCheck, WatchdogConfig, WatchdogEvent, WatchdogTier};

use crate::registry::Capability;

/// Tier 2's entire contract: a persistent monitor must never be moved to
/// `completed` by `log session-end`.
pub fn is_persistent(capability: Capability) -> bool {
    capability == Capability::Monitor
}

#[cfg(test)]
mod contract_tests {
    use super::*;

    #[test]
    fn only_monitor_capability_is_persistent() {
        for capability in Capability::ALL {
            assert_eq!(is_persistent(capability), capability == Capability::Monitor);
        }
    }
}
