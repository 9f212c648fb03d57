//! Data model for a single stored observability event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    ToolStart,
    ToolEnd,
    SessionStart,
    SessionEnd,
    MailSent,
    MailReceived,
    Spawn,
    Error,
    Custom,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::ToolStart => "tool_start",
            EventType::ToolEnd => "tool_end",
            EventType::SessionStart => "session_start",
            EventType::SessionEnd => "session_end",
            EventType::MailSent => "mail_sent",
            EventType::MailReceived => "mail_received",
            EventType::Spawn => "spawn",
            EventType::Error => "error",
            EventType::Custom => "custom",
        }
    }
}

impl std::str::FromStr for EventType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "tool_start" => EventType::ToolStart,
            "tool_end" => EventType::ToolEnd,
            "session_start" => EventType::SessionStart,
            "session_end" => EventType::SessionEnd,
            "mail_sent" => EventType::MailSent,
            "mail_received" => EventType::MailReceived,
            "spawn" => EventType::Spawn,
            "error" => EventType::Error,
            "custom" => EventType::Custom,
            other => return Err(format!("unknown event type: {other}")),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }
}

impl std::str::FromStr for Level {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "debug" => Level::Debug,
            "info" => Level::Info,
            "warn" => Level::Warn,
            "error" => Level::Error,
            other => return Err(format!("unknown level: {other}")),
        })
    }
}

/// One append-only observability record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    pub id: i64,
    pub run_id: Option<String>,
    pub agent_name: String,
    pub session_id: Option<String>,
    pub event_type: EventType,
    pub tool_name: Option<String>,
    pub tool_args: Option<String>,
    pub tool_duration_ms: Option<i64>,
    pub level: Level,
    pub data: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied by the caller when inserting a new event; `id` and
/// `created_at` are assigned by the store
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub run_id: Option<String>,
    pub agent_name: String,
    pub session_id: Option<String>,
    pub event_type: EventType,
    pub tool_name: Option<String>,
    pub tool_args: Option<String>,
    pub level: Level,
    pub data: Option<String>,
}

impl NewEvent {
    pub fn new(agent_name: impl Into<String>, event_type: EventType) -> Self {
        Self {
            run_id: None,
            agent_name: agent_name.into(),
            session_id: None,
            event_type,
            tool_name: None,
            tool_args: None,
            level: Level::Info,
            data: None,
        }
    }

    pub fn with_run(mut self, run_id: Option<String>) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn with_session(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_tool(mut self, tool_name: impl Into<String>, tool_args: Option<String>) -> Self {
        self.tool_name = Some(tool_name.into());
        self.tool_args = tool_args;
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_data(mut self, data: impl Into<String>) -> Self {
        self.data = Some(data.into());
        self
    }
}

/// Query options honoured by `getByAgent`/`getByRun`/`getErrors`/`getTimeline`
///
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub limit: Option<u32>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub level: Option<Level>,
}

/// Aggregate per-tool timing stats returned by `getToolStats`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolStats {
    pub tool_name: String,
    pub call_count: u64,
    pub avg_duration_ms: f64,
    pub max_duration_ms: i64,
    pub error_count: u64,
}

/// Options for `purge`
#[derive(Debug, Clone, Default)]
pub struct PurgeOptions {
    pub all: bool,
    pub older_than_ms: Option<i64>,
    pub agent_name: Option<String>,
}
