//! Companion RunStore for the Session Registry.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::types::{Run, RunStatus};
use crate::db;

pub type RunResult<T> = Result<T, RunError>;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("run not found: {0}")]
    NotFound(String),
}

pub struct RunStore {
    conn: Mutex<rusqlite::Connection>,
}

const CREATE_SQL: &str = "
CREATE TABLE IF NOT EXISTS runs (
    id           TEXT PRIMARY KEY,
    started_at   TEXT NOT NULL,
    completed_at TEXT,
    agent_count  INTEGER NOT NULL DEFAULT 0,
    status       TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_runs_status ON runs(status);
";

impl RunStore {
    pub fn open(path: impl AsRef<Path>) -> RunResult<Self> {
        let conn = db::open(path)?;
        conn.execute_batch(CREATE_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> RunResult<Self> {
        let conn = db::open_in_memory()?;
        conn.execute_batch(CREATE_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create a new active run. At most one active run is expected at a
    /// time, but this store doesn't enforce that itself — `getActiveRun`
    /// always returns the most recent, which is what callers rely on.
    pub fn create_run(&self, run: &Run) -> RunResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO runs (id, started_at, completed_at, agent_count, status)
             VALUES (?1,?2,?3,?4,?5)",
            params![
                run.id,
                run.started_at.to_rfc3339(),
                run.completed_at.map(|t| t.to_rfc3339()),
                run.agent_count,
                run.status.as_str(),
            ],
        )?;
        Ok(())
    }

    pub fn get_run(&self, id: &str) -> RunResult<Option<Run>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM runs WHERE id = ?1", params![id], row_to_run)
            .optional()
            .map_err(Into::into)
    }

    /// Most-recent active run, or None.
    pub fn get_active_run(&self) -> RunResult<Option<Run>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM runs WHERE status = 'active' ORDER BY started_at DESC LIMIT 1",
            [],
            row_to_run,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn list_runs(&self) -> RunResult<Vec<Run>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM runs ORDER BY started_at DESC")?;
        let rows = stmt
            .query_map([], row_to_run)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn increment_agent_count(&self, id: &str) -> RunResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE runs SET agent_count = agent_count + 1 WHERE id = ?1",
            params![id],
        )?;
        if changed == 0 {
            return Err(RunError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Close a run: sets both `status` and `completed_at` atomically.
    pub fn complete_run(&self, id: &str, status: RunStatus) -> RunResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE runs SET status = ?1, completed_at = ?2 WHERE id = ?3",
            params![status.as_str(), Utc::now().to_rfc3339(), id],
        )?;
        if changed == 0 {
            return Err(RunError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

fn row_to_run(row: &rusqlite::Row) -> rusqlite::Result<Run> {
    let started_at: String = row.get("started_at")?;
    let completed_at: Option<String> = row.get("completed_at")?;
    let status: String = row.get("status")?;

    Ok(Run {
        id: row.get("id")?,
        started_at: DateTime::parse_from_rfc3339(&started_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        completed_at: completed_at.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|d| d.with_timezone(&Utc))
        }),
        agent_count: row.get("agent_count")?,
        status: status.parse().unwrap_or(RunStatus::Active),
    })
}
