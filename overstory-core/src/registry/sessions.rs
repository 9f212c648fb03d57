//! Session Registry — authoritative state for every live worker.
//!
//! SQLite-backed, one row per `agent_name`. All mutation goes through this
//! store; every other component is a reader.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::types::{AgentSession, Capability, SessionState};
use crate::db;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("session not found: {0}")]
    NotFound(String),
}

pub struct SessionRegistry {
    conn: Mutex<rusqlite::Connection>,
}

const CREATE_SQL: &str = "
CREATE TABLE IF NOT EXISTS sessions (
    agent_name      TEXT PRIMARY KEY,
    id              TEXT NOT NULL,
    capability      TEXT NOT NULL,
    worktree_path   TEXT NOT NULL,
    branch_name     TEXT NOT NULL,
    bead_id         TEXT NOT NULL,
    tmux_session    TEXT NOT NULL,
    pid             INTEGER,
    parent_agent    TEXT,
    depth           INTEGER NOT NULL DEFAULT 0,
    run_id          TEXT,
    state           TEXT NOT NULL,
    started_at      TEXT NOT NULL,
    last_activity   TEXT NOT NULL,
    escalation_level INTEGER NOT NULL DEFAULT 0,
    stalled_since   TEXT
);
CREATE INDEX IF NOT EXISTS idx_sessions_run ON sessions(run_id);
CREATE INDEX IF NOT EXISTS idx_sessions_state ON sessions(state);
";

impl SessionRegistry {
    pub fn open(path: impl AsRef<Path>) -> RegistryResult<Self> {
        let conn = db::open(path)?;
        conn.execute_batch(CREATE_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> RegistryResult<Self> {
        let conn = db::open_in_memory()?;
        conn.execute_batch(CREATE_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    /// Insert or fully replace a session row.
    pub fn upsert(&self, session: &AgentSession) -> RegistryResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO sessions (
                agent_name, id, capability, worktree_path, branch_name, bead_id,
                tmux_session, pid, parent_agent, depth, run_id, state,
                started_at, last_activity, escalation_level, stalled_since
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)
            ON CONFLICT(agent_name) DO UPDATE SET
                id=excluded.id, capability=excluded.capability,
                worktree_path=excluded.worktree_path, branch_name=excluded.branch_name,
                bead_id=excluded.bead_id, tmux_session=excluded.tmux_session,
                pid=excluded.pid, parent_agent=excluded.parent_agent,
                depth=excluded.depth, run_id=excluded.run_id, state=excluded.state,
                started_at=excluded.started_at, last_activity=excluded.last_activity,
                escalation_level=excluded.escalation_level, stalled_since=excluded.stalled_since",
            params![
                session.agent_name,
                session.id,
                session.capability.as_str(),
                session.worktree_path,
                session.branch_name,
                session.bead_id,
                session.tmux_session,
                session.pid,
                session.parent_agent,
                session.depth,
                session.run_id,
                session.state.as_str(),
                session.started_at.to_rfc3339(),
                session.last_activity.to_rfc3339(),
                session.escalation_level,
                session.stalled_since.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    pub fn remove(&self, name: &str) -> RegistryResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM sessions WHERE agent_name = ?1", params![name])?;
        Ok(())
    }

    pub fn get_by_name(&self, name: &str) -> RegistryResult<Option<AgentSession>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM sessions WHERE agent_name = ?1",
            params![name],
            row_to_session,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn get_all(&self) -> RegistryResult<Vec<AgentSession>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM sessions ORDER BY started_at ASC")?;
        let rows = stmt
            .query_map([], row_to_session)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Sessions in {booting, working, stalled}.
    pub fn get_active(&self) -> RegistryResult<Vec<AgentSession>> {
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|s| s.state.is_active())
            .collect())
    }

    pub fn update_state(&self, name: &str, state: SessionState) -> RegistryResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE sessions SET state = ?1 WHERE agent_name = ?2",
            params![state.as_str(), name],
        )?;
        if changed == 0 {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        Ok(())
    }

    pub fn update_last_activity(&self, name: &str) -> RegistryResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE sessions SET last_activity = ?1 WHERE agent_name = ?2",
            params![Utc::now().to_rfc3339(), name],
        )?;
        if changed == 0 {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        Ok(())
    }

    pub fn update_escalation(&self, name: &str, level: u8) -> RegistryResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE sessions SET escalation_level = ?1 WHERE agent_name = ?2",
            params![level, name],
        )?;
        if changed == 0 {
            return Err(RegistryError::NotFound(name.to_string()));
        }
        Ok(())
    }

    /// Mark `stalled_since` when entering the stalled state for the first time.
    pub fn set_stalled_since(
        &self,
        name: &str,
        since: DateTime<Utc>,
    ) -> RegistryResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE sessions SET stalled_since = ?1 WHERE agent_name = ?2 AND stalled_since IS NULL",
            params![since.to_rfc3339(), name],
        )?;
        Ok(())
    }

    pub fn set_pid(&self, name: &str, pid: i64) -> RegistryResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE sessions SET pid = ?1 WHERE agent_name = ?2",
            params![pid, name],
        )?;
        Ok(())
    }
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<AgentSession> {
    let capability: String = row.get("capability")?;
    let state: String = row.get("state")?;
    let started_at: String = row.get("started_at")?;
    let last_activity: String = row.get("last_activity")?;
    let stalled_since: Option<String> = row.get("stalled_since")?;

    Ok(AgentSession {
        agent_name: row.get("agent_name")?,
        id: row.get("id")?,
        capability: capability.parse().unwrap_or(Capability::Scout),
        worktree_path: row.get("worktree_path")?,
        branch_name: row.get("branch_name")?,
        bead_id: row.get("bead_id")?,
        tmux_session: row.get("tmux_session")?,
        pid: row.get("pid")?,
        parent_agent: row.get("parent_agent")?,
        depth: row.get("depth")?,
        run_id: row.get("run_id")?,
        state: state.parse().unwrap_or(SessionState::Booting),
        started_at: DateTime::parse_from_rfc3339(&started_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        last_activity: DateTime::parse_from_rfc3339(&last_activity)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        escalation_level: row.get("escalation_level")?,
        stalled_since: stalled_since.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|d| d.with_timezone(&Utc))
        }),
    })
}
