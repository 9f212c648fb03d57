//! Data model for the watchdog's tier 0 health checks.

use serde::{Deserialize, Serialize};

/// Per-capability thresholds read from project config.
#[derive(Debug, Clone, Copy)]
pub struct WatchdogConfig {
    pub tier0_interval_ms: u64,
    pub stale_threshold_ms: i64,
    pub zombie_threshold_ms: i64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            tier0_interval_ms: 30_000,
            stale_threshold_ms: 5 * 60_000,
            zombie_threshold_ms: 20 * 60_000,
        }
    }
}

/// The action tier 0 derives for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthAction {
    None,
    Escalate,
    Terminate,
    Investigate,
}

/// Result of one tier-0 pass over one session.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    pub agent_name: String,
    pub action: HealthAction,
    pub reconciliation_note: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogTier {
    Tier0,
    Tier1,
    Tier2,
}

/// Emitted once per session per `poll_once` pass, for the caller to log
/// or record into the event store.
#[derive(Debug, Clone)]
pub struct WatchdogEvent {
    pub tier: WatchdogTier,
    pub check: HealthCheck,
}
