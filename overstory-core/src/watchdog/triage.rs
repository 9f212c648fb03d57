//! Tier 1: an optional AI probe invoked only when tier 0 escalates, to
//! classify what kind of stall a session is in. Pluggable and mockable,
//! mirroring how the merge resolver's tier 3/4 helper is a trait rather
//! than a hardcoded subprocess call.

use crate::registry::AgentSession;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriageVerdict {
    /// The session looks genuinely stuck; tier 0's escalation stands.
    Confirmed,
    /// The session is mid a long-but-legitimate operation; don't
    /// escalate further this cycle.
    FalsePositive,
    /// The probe couldn't reach a verdict.
    Unknown,
}

pub trait TriageProbe: Send + Sync {
    fn classify(&self, session: &AgentSession) -> TriageVerdict;
}

/// Default when no tier 1 probe is configured: tier 0's verdict always
/// stands.
pub struct NullTriageProbe;

impl TriageProbe for NullTriageProbe {
    fn classify(&self, _session: &AgentSession) -> TriageVerdict {
        TriageVerdict::Unknown
    }
}
