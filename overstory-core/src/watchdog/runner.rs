//! Tier 0/1 runner. Reads the Session Registry, derives a `HealthCheck` per
//! active session, and applies it: escalating state + progressive nudge mail,
//! or terminating a zombie. Tier 2's contract lives in `watchdog::is_persistent`
//! and is enforced by the `log session-end` CLI verb, not here.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use super::liveness::{LivenessProbe, ProcessLivenessProbe};
use super::triage::{NullTriageProbe, TriageProbe, TriageVerdict};
use super::types::{HealthAction, HealthCheck, WatchdogConfig, WatchdogEvent, WatchdogTier};
use crate::mail::{MailClient, MessageType, NewMessage, Priority};
use crate::registry::{AgentSession, SessionRegistry, SessionState};

const WATCHDOG_SENDER: &str = "watchdog";

/// Escalation level at which tier 0 kills the session outright.
const TERMINATE_AT_LEVEL: u8 = 3;

pub struct Watchdog {
    registry: Arc<SessionRegistry>,
    mail: Arc<MailClient>,
    probe: Box<dyn LivenessProbe>,
    triage: Box<dyn TriageProbe>,
    config: WatchdogConfig,
}

impl Watchdog {
    pub fn new(registry: Arc<SessionRegistry>, mail: Arc<MailClient>, config: WatchdogConfig) -> Self {
        Self {
            registry,
            mail,
            probe: Box::new(ProcessLivenessProbe),
            triage: Box::new(NullTriageProbe),
            config,
        }
    }

    pub fn with_probe(mut self, probe: Box<dyn LivenessProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_triage(mut self, triage: Box<dyn TriageProbe>) -> Self {
        self.triage = triage;
        self
    }

    /// One pass over every active session. Returns the tier 0 (and, where
    /// triggered, tier 1) events for the caller to log or record.
    pub fn poll_once(&self) -> Vec<WatchdogEvent> {
        let active = match self.registry.get_active() {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(error = %e, "watchdog: failed to read active sessions");
                return Vec::new();
            }
        };

        let mut events = Vec::with_capacity(active.len());
        for session in &active {
            let check = self.tier0_check(session);
            self.apply(session, &check);
            events.push(WatchdogEvent {
                tier: WatchdogTier::Tier0,
                check: check.clone(),
            });

            if check.action == HealthAction::Escalate {
                let verdict = self.triage.classify(session);
                events.push(WatchdogEvent {
                    tier: WatchdogTier::Tier1,
                    check: HealthCheck {
                        agent_name: session.agent_name.clone(),
                        action: triage_verdict_to_action(verdict),
                        reconciliation_note: None,
                    },
                });
            }
        }
        events
    }

    /// Mechanical liveness + staleness check for one session. Pure function
    /// of the probe and the clock; does not mutate anything.
    fn tier0_check(&self, session: &AgentSession) -> HealthCheck {
        let tmux_alive = self.probe.tmux_session_alive(&session.tmux_session);
        let pid_alive = session.pid.map(|pid| self.probe.pid_alive(pid));
        let idle_ms = (Utc::now() - session.last_activity).num_milliseconds();

        let reconciliation_note = if !tmux_alive {
            Some(format!(
                "registry state {:?} but tmux session {} is gone",
                session.state, session.tmux_session
            ))
        } else if pid_alive == Some(false) {
            Some(format!(
                "registry state {:?} but pid {} is not running",
                session.state,
                session.pid.unwrap_or_default()
            ))
        } else {
            None
        };

        let action = if !tmux_alive || idle_ms >= self.config.zombie_threshold_ms {
            HealthAction::Terminate
        } else if idle_ms >= self.config.stale_threshold_ms {
            HealthAction::Escalate
        } else if reconciliation_note.is_some() {
            HealthAction::Investigate
        } else {
            HealthAction::None
        };

        HealthCheck {
            agent_name: session.agent_name.clone(),
            action,
            reconciliation_note,
        }
    }

    fn apply(&self, session: &AgentSession, check: &HealthCheck) {
        match check.action {
            HealthAction::Escalate => self.escalate(session),
            HealthAction::Terminate => self.terminate(session),
            HealthAction::None | HealthAction::Investigate => {}
        }
    }

    fn escalate(&self, session: &AgentSession) {
        let now = Utc::now();
        if let Err(e) = self.registry.set_stalled_since(&session.agent_name, now) {
            warn!(agent = %session.agent_name, error = %e, "watchdog: failed to set stalled_since");
        }
        if let Err(e) = self.registry.update_state(&session.agent_name, SessionState::Stalled) {
            warn!(agent = %session.agent_name, error = %e, "watchdog: failed to mark stalled");
        }

        let level = session.escalation_level.saturating_add(1).min(TERMINATE_AT_LEVEL);
        if let Err(e) = self.registry.update_escalation(&session.agent_name, level) {
            warn!(agent = %session.agent_name, error = %e, "watchdog: failed to bump escalation level");
        }

        self.send_progressive_nudge(session, level);

        if level >= TERMINATE_AT_LEVEL {
            self.terminate(session);
        }
    }

    fn terminate(&self, session: &AgentSession) {
        self.probe.kill_session(&session.tmux_session);
        if let Err(e) = self.registry.update_state(&session.agent_name, SessionState::Zombie) {
            warn!(agent = %session.agent_name, error = %e, "watchdog: failed to mark zombie");
        }
    }

    /// Each escalate step sends a mail of increasing severity to the
    /// stalled agent itself, so its next `checkInject` surfaces the nudge.
    fn send_progressive_nudge(&self, session: &AgentSession, level: u8) {
        let priority = match level {
            1 => Priority::Normal,
            2 => Priority::High,
            _ => Priority::Urgent,
        };
        let subject = format!("watchdog: stalled (escalation level {level})");
        let body = format!(
            "No activity detected from {} for longer than the stale threshold. \
             Please report status or continue your task.",
            session.agent_name
        );
        let msg = NewMessage::new(WATCHDOG_SENDER, session.agent_name.clone(), subject, body, MessageType::HealthCheck)
            .with_priority(priority);

        if let Err(e) = self.mail.send(msg) {
            warn!(agent = %session.agent_name, error = %e, "watchdog: failed to send progressive nudge");
        }
    }
}

fn triage_verdict_to_action(verdict: TriageVerdict) -> HealthAction {
    match verdict {
        TriageVerdict::Confirmed => HealthAction::Escalate,
        TriageVerdict::FalsePositive => HealthAction::None,
        TriageVerdict::Unknown => HealthAction::Investigate,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;

    use super::*;
    use crate::events::EventStore;
    use crate::mail::{MailStore, NudgeBoard};
    use crate::registry::Capability;
    use crate::watchdog::liveness::FakeLivenessProbe;

    fn harness() -> (Arc<SessionRegistry>, Arc<MailClient>, tempfile::TempDir) {
        let registry = Arc::new(SessionRegistry::open_in_memory().unwrap());
        let mail_store = Arc::new(MailStore::open_in_memory().unwrap());
        let events = Arc::new(EventStore::open_in_memory().unwrap());
        let tmp = tempfile::tempdir().unwrap();
        let nudges = NudgeBoard::new(tmp.path().join("nudges"));
        let mail = Arc::new(MailClient::new(mail_store, registry.clone(), events, nudges, None));
        (registry, mail, tmp)
    }

    fn sample(name: &str) -> AgentSession {
        let mut s = AgentSession::new_booting(
            name,
            Capability::Builder,
            format!("/wt/{name}"),
            format!("overstory/{name}/bd-1"),
            "bd-1",
            format!("tmux-{name}"),
            None,
            0,
            None,
        );
        s.state = SessionState::Working;
        s
    }

    #[test]
    fn fresh_session_is_untouched() {
        let (registry, mail, _tmp) = harness();
        registry.upsert(&sample("alice")).unwrap();

        let wd = Watchdog::new(registry.clone(), mail, WatchdogConfig::default())
            .with_probe(Box::new(FakeLivenessProbe::new(true, true)));

        let events = wd.poll_once();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].check.action, HealthAction::None);
        assert_eq!(registry.get_by_name("alice").unwrap().unwrap().state, SessionState::Working);
    }

    #[test]
    fn stale_session_escalates_and_nudges() {
        let (registry, mail, _tmp) = harness();
        let mut s = sample("bob");
        s.last_activity = Utc::now() - Duration::milliseconds(10 * 60_000);
        registry.upsert(&s).unwrap();

        let config = WatchdogConfig {
            tier0_interval_ms: 1_000,
            stale_threshold_ms: 5 * 60_000,
            zombie_threshold_ms: 20 * 60_000,
        };
        let wd = Watchdog::new(registry.clone(), mail.clone(), config)
            .with_probe(Box::new(FakeLivenessProbe::new(true, true)));

        let events = wd.poll_once();
        assert_eq!(events[0].check.action, HealthAction::Escalate);

        let updated = registry.get_by_name("bob").unwrap().unwrap();
        assert_eq!(updated.state, SessionState::Stalled);
        assert_eq!(updated.escalation_level, 1);
        assert!(updated.stalled_since.is_some());

        let check_inject = mail.check_inject("bob").unwrap();
        assert!(check_inject.contains("PRIORITY"));
    }

    #[test]
    fn repeated_escalation_terminates_at_level_three() {
        let (registry, mail, _tmp) = harness();
        let mut s = sample("carol");
        s.last_activity = Utc::now() - Duration::milliseconds(10 * 60_000);
        s.escalation_level = 2;
        registry.upsert(&s).unwrap();

        let config = WatchdogConfig {
            tier0_interval_ms: 1_000,
            stale_threshold_ms: 5 * 60_000,
            zombie_threshold_ms: 20 * 60_000,
        };
        let probe = Arc::new(FakeLivenessProbe::new(true, true));
        let wd = Watchdog::new(registry.clone(), mail, config).with_probe(probe_box(probe.clone()));

        wd.poll_once();

        let updated = registry.get_by_name("carol").unwrap().unwrap();
        assert_eq!(updated.state, SessionState::Zombie);
        assert_eq!(updated.escalation_level, 3);
        assert_eq!(probe.killed.lock().unwrap().as_slice(), ["tmux-carol"]);
    }

    #[test]
    fn dead_tmux_session_terminates_immediately() {
        let (registry, mail, _tmp) = harness();
        registry.upsert(&sample("dave")).unwrap();

        let wd = Watchdog::new(registry.clone(), mail, WatchdogConfig::default())
            .with_probe(Box::new(FakeLivenessProbe::new(false, true)));

        let events = wd.poll_once();
        assert_eq!(events[0].check.action, HealthAction::Terminate);
        assert_eq!(registry.get_by_name("dave").unwrap().unwrap().state, SessionState::Zombie);
    }

    #[test]
    fn mismatched_pid_without_staleness_is_investigate_only() {
        let (registry, mail, _tmp) = harness();
        let mut s = sample("erin");
        s.pid = Some(4242);
        registry.upsert(&s).unwrap();

        let wd = Watchdog::new(registry.clone(), mail, WatchdogConfig::default())
            .with_probe(Box::new(FakeLivenessProbe::new(true, false)));

        let events = wd.poll_once();
        assert_eq!(events[0].check.action, HealthAction::Investigate);
        assert!(events[0].check.reconciliation_note.is_some());
        assert_eq!(registry.get_by_name("erin").unwrap().unwrap().state, SessionState::Working);
    }

    #[test]
    fn triage_confirmed_stall_reports_as_escalate() {
        let (registry, mail, _tmp) = harness();
        let mut s = sample("frank");
        s.last_activity = Utc::now() - Duration::milliseconds(10 * 60_000);
        registry.upsert(&s).unwrap();

        struct AlwaysConfirmed;
        impl TriageProbe for AlwaysConfirmed {
            fn classify(&self, _session: &AgentSession) -> TriageVerdict {
                TriageVerdict::Confirmed
            }
        }

        let wd = Watchdog::new(registry, mail, WatchdogConfig::default())
            .with_probe(Box::new(FakeLivenessProbe::new(true, true)))
            .with_triage(Box::new(AlwaysConfirmed));

        let events = wd.poll_once();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].tier, WatchdogTier::Tier1);
        assert_eq!(events[1].check.action, HealthAction::Escalate);
    }

    fn probe_box(probe: Arc<FakeLivenessProbe>) -> Box<dyn LivenessProbe> {
        Box::new(ArcProbe(probe))
    }

    struct ArcProbe(Arc<FakeLivenessProbe>);
    impl LivenessProbe for ArcProbe {
        fn tmux_session_alive(&self, tmux_session: &str) -> bool {
            self.0.tmux_session_alive(tmux_session)
        }
        fn pid_alive(&self, pid: i64) -> bool {
            self.0.pid_alive(pid)
        }
        fn kill_session(&self, tmux_session: &str) {
            self.0.kill_session(tmux_session)
        }
    }
}
