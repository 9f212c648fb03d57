//! Data model for an agent session and a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The closed set of agent capabilities.
///
/// Any `match` on this type must be total or default to the safest policy,
/// which is the non-implementation branch (no write tools).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Scout,
    Builder,
    Reviewer,
    Lead,
    Merger,
    Coordinator,
    Supervisor,
    Monitor,
}

impl Capability {
    pub const ALL: [Capability; 8] = [
        Capability::Scout,
        Capability::Builder,
        Capability::Reviewer,
        Capability::Lead,
        Capability::Merger,
        Capability::Coordinator,
        Capability::Supervisor,
        Capability::Monitor,
    ];

    /// Implementation capabilities get write tools and a path-boundary shell
    /// guard instead of an outright Write/Edit block
    pub fn is_implementation(self) -> bool {
        matches!(self, Capability::Builder | Capability::Merger)
    }

    /// Coordination capabilities (lead/coordinator/supervisor) are additionally
    /// whitelisted for `git add`/`git commit`
    pub fn is_coordination(self) -> bool {
        matches!(
            self,
            Capability::Lead | Capability::Coordinator | Capability::Supervisor
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Scout => "scout",
            Capability::Builder => "builder",
            Capability::Reviewer => "reviewer",
            Capability::Lead => "lead",
            Capability::Merger => "merger",
            Capability::Coordinator => "coordinator",
            Capability::Supervisor => "supervisor",
            Capability::Monitor => "monitor",
        }
    }

    /// Plural/group address form used by `@<capability>` broadcasts,
    /// e.g. `@builders` as well as `@builder` both resolve to `Builder`.
    pub fn from_group_token(token: &str) -> Option<Self> {
        let singular = token.strip_suffix('s').unwrap_or(token);
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == token || c.as_str() == singular)
    }
}

impl std::str::FromStr for Capability {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown capability: {s}"))
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of one agent session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Booting,
    Working,
    Completed,
    Stalled,
    Zombie,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Booting => "booting",
            SessionState::Working => "working",
            SessionState::Completed => "completed",
            SessionState::Stalled => "stalled",
            SessionState::Zombie => "zombie",
        }
    }

    /// The "active" set used by `getActive` and broadcast resolution
    pub fn is_active(self) -> bool {
        matches!(
            self,
            SessionState::Booting | SessionState::Working | SessionState::Stalled
        )
    }
}

impl std::str::FromStr for SessionState {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "booting" => SessionState::Booting,
            "working" => SessionState::Working,
            "completed" => SessionState::Completed,
            "stalled" => SessionState::Stalled,
            "zombie" => SessionState::Zombie,
            other => return Err(format!("unknown session state: {other}")),
        })
    }
}

/// The authoritative live record of one worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSession {
    pub agent_name: String,
    pub id: String,
    pub capability: Capability,

    pub worktree_path: String,
    pub branch_name: String,
    pub bead_id: String,
    pub tmux_session: String,
    pub pid: Option<i64>,

    pub parent_agent: Option<String>,
    pub depth: u32,
    pub run_id: Option<String>,

    pub state: SessionState,

    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub escalation_level: u8,
    pub stalled_since: Option<DateTime<Utc>>,
}

impl AgentSession {
    /// Build a freshly-booted session the way the Spawner does.
    pub fn new_booting(
        agent_name: impl Into<String>,
        capability: Capability,
        worktree_path: impl Into<String>,
        branch_name: impl Into<String>,
        bead_id: impl Into<String>,
        tmux_session: impl Into<String>,
        parent_agent: Option<String>,
        depth: u32,
        run_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            agent_name: agent_name.into(),
            id: uuid::Uuid::new_v4().to_string(),
            capability,
            worktree_path: worktree_path.into(),
            branch_name: branch_name.into(),
            bead_id: bead_id.into(),
            tmux_session: tmux_session.into(),
            pid: None,
            parent_agent,
            depth,
            run_id,
            state: SessionState::Booting,
            started_at: now,
            last_activity: now,
            escalation_level: 0,
            stalled_since: None,
        }
    }
}

/// Status of a Run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Active,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Active => "active",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "active" => RunStatus::Active,
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            other => return Err(format!("unknown run status: {other}")),
        })
    }
}

/// Groups sessions spawned by one orchestrator session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub agent_count: u32,
    pub status: RunStatus,
}

impl Run {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            completed_at: None,
            agent_count: 0,
            status: RunStatus::Active,
        }
    }
}

impl Default for Run {
    fn default() -> Self {
        Self::new()
    }
}
