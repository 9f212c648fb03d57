//! Mail Client — the semantic layer workers and the orchestrator actually
//! call. Wraps the Mail Store with addressing (including `@all`/`@capability`
//! broadcasts), auto-nudge delivery, and event recording.

use std::sync::Arc;

use tracing::warn;

use super::nudge::{NudgeBoard, NudgeMarker};
use super::store::{MailStore, MailStoreError};
use super::types::{MailPurgeOptions, Message, MessageQuery, MessageType, NewMessage};
use crate::events::{EventStore, EventType, NewEvent};
use crate::registry::{Capability, RegistryError, SessionRegistry};

pub type ClientResult<T> = Result<T, MailClientError>;

#[derive(Debug, thiserror::Error)]
pub enum MailClientError {
    #[error("mail store error: {0}")]
    Store(#[from] MailStoreError),
    #[error("session registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("unknown broadcast group: {0}")]
    UnknownGroup(String),
    #[error("broadcast resolved to zero recipients")]
    EmptyBroadcast,
}

pub struct MailClient {
    store: Arc<MailStore>,
    registry: Arc<SessionRegistry>,
    events: Arc<EventStore>,
    nudges: NudgeBoard,
    run_id: Option<String>,
}

impl MailClient {
    pub fn new(
        store: Arc<MailStore>,
        registry: Arc<SessionRegistry>,
        events: Arc<EventStore>,
        nudges: NudgeBoard,
        run_id: Option<String>,
    ) -> Self {
        Self {
            store,
            registry,
            events,
            nudges,
            run_id,
        }
    }

    /// Resolve `to` against the live session set, expanding `@all` and
    /// `@<capability>` (plural or singular) broadcasts.
    fn resolve_recipients(&self, from: &str, to: &str) -> ClientResult<Vec<String>> {
        if !to.starts_with('@') {
            return Ok(vec![to.to_string()]);
        }

        let active = self.registry.get_active()?;
        let group = &to[1..];

        let matches: Vec<String> = if group == "all" {
            active
                .iter()
                .map(|s| s.agent_name.clone())
                .filter(|n| n != from)
                .collect()
        } else {
            let capability = Capability::from_group_token(group)
                .ok_or_else(|| MailClientError::UnknownGroup(to.to_string()))?;
            active
                .iter()
                .filter(|s| s.capability == capability)
                .map(|s| s.agent_name.clone())
                .filter(|n| n != from)
                .collect()
        };

        if matches.is_empty() {
            return Err(MailClientError::EmptyBroadcast);
        }
        Ok(matches)
    }

    /// Send one message. Broadcast addresses expand into N independent
    /// messages, N event rows, and (for auto-nudge-worthy sends) N nudge
    /// markers.
    pub fn send(&self, new_msg: NewMessage) -> ClientResult<Vec<Message>> {
        let recipients = self.resolve_recipients(&new_msg.from, &new_msg.to)?;
        let is_merge_ready_from_lead = new_msg.message_type == MessageType::MergeReady;
        let auto_nudge = new_msg.is_auto_nudge_worthy();

        let mut sent = Vec::with_capacity(recipients.len());
        for recipient in &recipients {
            let mut msg = new_msg.clone();
            msg.to = recipient.clone();
            let stored = self.store.insert(msg)?;

            if let Err(e) = self.events.insert(
                NewEvent::new(stored.from.clone(), EventType::MailSent)
                    .with_run(self.run_id.clone())
                    .with_data(stored.id.clone()),
            ) {
                warn!(error = %e, "failed to record mail_sent event");
            }

            if auto_nudge {
                let marker = NudgeMarker {
                    from: stored.from.clone(),
                    reason: stored.message_type.as_str().to_string(),
                    subject: stored.subject.clone(),
                    message_id: stored.id.clone(),
                    created_at: stored.created_at,
                };
                if let Err(e) = self.nudges.write(recipient, &marker) {
                    warn!(agent = %recipient, error = %e, "failed to write nudge marker");
                }
            }

            sent.push(stored);
        }

        if is_merge_ready_from_lead {
            self.warn_if_merge_ready_uncovered(&new_msg.from);
        }

        Ok(sent)
    }

    /// Advisory stderr warning when a `merge_ready` send has no matching
    /// reviewer in the active-session set. Never blocks the send.
    fn warn_if_merge_ready_uncovered(&self, sender: &str) {
        let Ok(active) = self.registry.get_active() else {
            return;
        };
        let Some(sender_session) = active.iter().find(|s| s.agent_name == sender) else {
            return;
        };
        if sender_session.capability != Capability::Lead {
            return;
        }
        let parent = sender_session.parent_agent.clone();

        let sibling_reviewers = active
            .iter()
            .filter(|s| s.capability == Capability::Reviewer && s.parent_agent == parent)
            .count();
        let sibling_builders = active
            .iter()
            .filter(|s| s.capability == Capability::Builder && s.parent_agent == parent)
            .count();

        if sibling_reviewers == 0 {
            eprintln!("warning: merge_ready from {sender} has no active reviewer sibling");
        } else if sibling_reviewers < sibling_builders {
            eprintln!(
                "note: merge_ready from {sender}: {sibling_reviewers} reviewer(s) cover {sibling_builders} builder(s)"
            );
        }
    }

    pub fn reply(&self, thread_seed: &Message, from: &str, body: &str) -> ClientResult<Vec<Message>> {
        let thread_id = thread_seed
            .thread_id
            .clone()
            .unwrap_or_else(|| thread_seed.id.clone());
        let msg = NewMessage::new(
            from,
            thread_seed.from.clone(),
            format!("Re: {}", thread_seed.subject),
            body,
            MessageType::Status,
        )
        .with_thread(thread_id);
        self.send(msg)
    }

    pub fn list(&self, query: &MessageQuery) -> ClientResult<Vec<Message>> {
        Ok(self.store.get_all(query)?)
    }

    /// Returns unread mail for `agent` and marks it read.
    pub fn check(&self, agent: &str) -> ClientResult<Vec<Message>> {
        let unread = self.store.get_unread(agent)?;
        for msg in &unread {
            self.store.mark_read(&msg.id)?;
        }
        Ok(unread)
    }

    /// Formats the injection banner pasted into a worker's next prompt:
    /// priority nudge line (if a marker was pending), then the normal
    /// unread-message digest.
    pub fn check_inject(&self, agent: &str) -> ClientResult<String> {
        let mut out = String::new();

        if let Ok(Some(marker)) = self.nudges.take(agent) {
            out.push_str(&format!(
                "PRIORITY: {} message from {} — \"{}\"\n",
                marker.reason, marker.from, marker.subject
            ));
        }

        let unread = self.check(agent)?;
        for msg in &unread {
            out.push_str(&format!("--- {} (from {}) ---\n{}\n", msg.subject, msg.from, msg.body));
        }
        Ok(out)
    }

    pub fn broadcast(&self, new_msg: NewMessage) -> ClientResult<Vec<Message>> {
        self.send(new_msg)
    }

    pub fn purge(&self, opts: &MailPurgeOptions) -> ClientResult<u64> {
        Ok(self.store.purge(opts)?)
    }

    pub fn close(self) {}
}
