//! Data model for mail messages.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Semantic and protocol message kinds. Protocol kinds (and priority >= high)
/// are auto-nudge triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    // Semantic
    Status,
    Question,
    Result,
    Error,
    // Protocol
    WorkerDone,
    MergeReady,
    Merged,
    MergeFailed,
    Escalation,
    HealthCheck,
    Dispatch,
    Assign,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageType::Status => "status",
            MessageType::Question => "question",
            MessageType::Result => "result",
            MessageType::Error => "error",
            MessageType::WorkerDone => "worker_done",
            MessageType::MergeReady => "merge_ready",
            MessageType::Merged => "merged",
            MessageType::MergeFailed => "merge_failed",
            MessageType::Escalation => "escalation",
            MessageType::HealthCheck => "health_check",
            MessageType::Dispatch => "dispatch",
            MessageType::Assign => "assign",
        }
    }

    /// Protocol types are always auto-nudge triggers regardless of priority.
    pub fn is_protocol(self) -> bool {
        !matches!(
            self,
            MessageType::Status | MessageType::Question | MessageType::Result | MessageType::Error
        )
    }
}

impl std::str::FromStr for MessageType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "status" => MessageType::Status,
            "question" => MessageType::Question,
            "result" => MessageType::Result,
            "error" => MessageType::Error,
            "worker_done" => MessageType::WorkerDone,
            "merge_ready" => MessageType::MergeReady,
            "merged" => MessageType::Merged,
            "merge_failed" => MessageType::MergeFailed,
            "escalation" => MessageType::Escalation,
            "health_check" => MessageType::HealthCheck,
            "dispatch" => MessageType::Dispatch,
            "assign" => MessageType::Assign,
            other => return Err(format!("unknown message type: {other}")),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn is_auto_nudge_worthy(self) -> bool {
        self >= Priority::High
    }
}

impl std::str::FromStr for Priority {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "low" => Priority::Low,
            "normal" => Priority::Normal,
            "high" => Priority::High,
            "urgent" => Priority::Urgent,
            other => return Err(format!("unknown priority: {other}")),
        })
    }
}

/// One row in the durable message table. Immutable except `read`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub priority: Priority,
    pub message_type: MessageType,
    pub thread_id: Option<String>,
    pub payload: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Generates the `"msg-" + 12 random base36 characters` id form.
pub fn generate_message_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..12)
        .map(|_| {
            let idx = rng.gen_range(0..ID_ALPHABET.len());
            ID_ALPHABET[idx] as char
        })
        .collect();
    format!("msg-{suffix}")
}

/// Fields supplied by a caller composing a new message; `id` is
/// auto-generated when empty, `createdAt` and `read` are assigned by the
/// store.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub id: Option<String>,
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
    pub priority: Priority,
    pub message_type: MessageType,
    pub thread_id: Option<String>,
    pub payload: Option<String>,
}

impl NewMessage {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
        message_type: MessageType,
    ) -> Self {
        Self {
            id: None,
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            priority: Priority::Normal,
            message_type,
            thread_id: None,
            payload: None,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn is_auto_nudge_worthy(&self) -> bool {
        self.message_type.is_protocol() || self.priority.is_auto_nudge_worthy()
    }
}

/// Filters honoured by `getAll`.
#[derive(Debug, Clone, Default)]
pub struct MessageQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub unread: Option<bool>,
    pub limit: Option<u32>,
}

/// Options for mail `purge`.
#[derive(Debug, Clone, Default)]
pub struct MailPurgeOptions {
    pub all: bool,
    pub older_than_ms: Option<i64>,
    pub agent: Option<String>,
}
