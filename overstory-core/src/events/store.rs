//! Event Store — append-only observability log.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::types::{EventQuery, EventType, Level, NewEvent, PurgeOptions, StoredEvent, ToolStats};
use crate::db;

pub type EventResult<T> = Result<T, EventStoreError>;

#[derive(Debug, thiserror::Error)]
pub enum EventStoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result of a successful `correlateToolEnd` call.
#[derive(Debug, Clone, Copy)]
pub struct Correlation {
    pub start_id: i64,
    pub duration_ms: i64,
}

pub struct EventStore {
    conn: Mutex<rusqlite::Connection>,
}

const CREATE_SQL: &str = "
CREATE TABLE IF NOT EXISTS events (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id            TEXT,
    agent_name        TEXT NOT NULL,
    session_id        TEXT,
    event_type        TEXT NOT NULL,
    tool_name         TEXT,
    tool_args         TEXT,
    tool_duration_ms  INTEGER,
    level             TEXT NOT NULL,
    data              TEXT,
    created_at        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_events_agent ON events(agent_name, created_at);
CREATE INDEX IF NOT EXISTS idx_events_run ON events(run_id, created_at);
CREATE INDEX IF NOT EXISTS idx_events_level ON events(level);
CREATE INDEX IF NOT EXISTS idx_events_correlation ON events(agent_name, tool_name, event_type, tool_duration_ms);
";

impl EventStore {
    pub fn open(path: impl AsRef<Path>) -> EventResult<Self> {
        let conn = db::open(path)?;
        conn.execute_batch(CREATE_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> EventResult<Self> {
        let conn = db::open_in_memory()?;
        conn.execute_batch(CREATE_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Assigns a monotone id, auto-fills `createdAt`.
    pub fn insert(&self, event: NewEvent) -> EventResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO events (
                run_id, agent_name, session_id, event_type, tool_name, tool_args,
                tool_duration_ms, level, data, created_at
            ) VALUES (?1,?2,?3,?4,?5,?6,NULL,?7,?8,?9)",
            params![
                event.run_id,
                event.agent_name,
                event.session_id,
                event.event_type.as_str(),
                event.tool_name,
                event.tool_args,
                event.level.as_str(),
                event.data,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Find the most recent uncorrelated `tool_start` for `(agent, tool)` and
    /// write its measured duration. Idempotent: a second call for the same
    /// start row returns `None` because the `WHERE tool_duration_ms IS NULL`
    /// clause on the `UPDATE` — not just the `SELECT` — makes the second
    /// writer's update affect zero rows.
    pub fn correlate_tool_end(
        &self,
        agent_name: &str,
        tool_name: &str,
    ) -> EventResult<Option<Correlation>> {
        let conn = self.conn.lock().unwrap();

        let start: Option<(i64, String)> = conn
            .query_row(
                "SELECT id, created_at FROM events
                 WHERE agent_name = ?1 AND tool_name = ?2 AND event_type = 'tool_start'
                   AND tool_duration_ms IS NULL
                 ORDER BY id DESC LIMIT 1",
                params![agent_name, tool_name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((start_id, started_at)) = start else {
            return Ok(None);
        };

        let started_at = DateTime::parse_from_rfc3339(&started_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        let duration_ms = (Utc::now() - started_at).num_milliseconds().max(0);

        let updated = conn.execute(
            "UPDATE events SET tool_duration_ms = ?1
             WHERE id = ?2 AND tool_duration_ms IS NULL",
            params![duration_ms, start_id],
        )?;

        if updated == 0 {
            // Raced with another correlator for the same row.
            return Ok(None);
        }

        Ok(Some(Correlation {
            start_id,
            duration_ms,
        }))
    }

    pub fn get_by_agent(&self, agent_name: &str, query: &EventQuery) -> EventResult<Vec<StoredEvent>> {
        self.query_events(
            "agent_name = ?",
            vec![Box::new(agent_name.to_string())],
            query,
            true,
        )
    }

    pub fn get_by_run(&self, run_id: &str, query: &EventQuery) -> EventResult<Vec<StoredEvent>> {
        self.query_events(
            "run_id = ?",
            vec![Box::new(run_id.to_string())],
            query,
            true,
        )
    }

    /// Errors, ordered descending.
    pub fn get_errors(&self, query: &EventQuery) -> EventResult<Vec<StoredEvent>> {
        self.query_events(
            "(event_type = 'error' OR level = 'error')",
            Vec::new(),
            query,
            false,
        )
    }

    /// Chronological ascending timeline.
    pub fn get_timeline(&self, query: &EventQuery) -> EventResult<Vec<StoredEvent>> {
        self.query_events("1=1", Vec::new(), query, true)
    }

    fn query_events(
        &self,
        base_clause: &str,
        base_params: Vec<Box<dyn rusqlite::ToSql>>,
        query: &EventQuery,
        ascending: bool,
    ) -> EventResult<Vec<StoredEvent>> {
        let conn = self.conn.lock().unwrap();
        let mut sql = format!("SELECT * FROM events WHERE {base_clause}");
        let mut bound = base_params;

        if let Some(since) = query.since {
            sql.push_str(" AND created_at >= ?");
            bound.push(Box::new(since.to_rfc3339()));
        }
        if let Some(until) = query.until {
            sql.push_str(" AND created_at <= ?");
            bound.push(Box::new(until.to_rfc3339()));
        }
        if let Some(level) = query.level {
            sql.push_str(" AND level = ?");
            bound.push(Box::new(level.as_str().to_string()));
        }
        sql.push_str(if ascending {
            " ORDER BY id ASC"
        } else {
            " ORDER BY id DESC"
        });
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut stmt = conn.prepare(&sql)?;
        let refs: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|v| v.as_ref()).collect();

        let rows = stmt
            .query_map(refs.as_slice(), row_to_event)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Aggregate per-tool stats across all recorded calls.
    pub fn get_tool_stats(&self) -> EventResult<Vec<ToolStats>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT tool_name,
                    COUNT(*) as call_count,
                    AVG(COALESCE(tool_duration_ms, 0)) as avg_duration,
                    MAX(COALESCE(tool_duration_ms, 0)) as max_duration,
                    SUM(CASE WHEN event_type = 'error' THEN 1 ELSE 0 END) as error_count
             FROM events
             WHERE tool_name IS NOT NULL
             GROUP BY tool_name
             ORDER BY call_count DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ToolStats {
                    tool_name: row.get(0)?,
                    call_count: row.get::<_, i64>(1)? as u64,
                    avg_duration_ms: row.get(2)?,
                    max_duration_ms: row.get(3)?,
                    error_count: row.get::<_, i64>(4)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Returns the count deleted.
    pub fn purge(&self, opts: &PurgeOptions) -> EventResult<u64> {
        let conn = self.conn.lock().unwrap();
        if opts.all {
            let n = conn.execute("DELETE FROM events", [])?;
            return Ok(n as u64);
        }

        let mut sql = String::from("DELETE FROM events WHERE 1=1");
        let mut extra: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(older_than_ms) = opts.older_than_ms {
            let cutoff = Utc::now() - chrono::Duration::milliseconds(older_than_ms);
            sql.push_str(" AND created_at < ?");
            extra.push(Box::new(cutoff.to_rfc3339()));
        }
        if let Some(agent) = &opts.agent_name {
            sql.push_str(" AND agent_name = ?");
            extra.push(Box::new(agent.clone()));
        }
        let bound: Vec<&dyn rusqlite::ToSql> = extra.iter().map(|v| v.as_ref()).collect();
        let n = conn.execute(&sql, bound.as_slice())?;
        Ok(n as u64)
    }
}

fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<StoredEvent> {
    let event_type: String = row.get("event_type")?;
    let level: String = row.get("level")?;
    let created_at: String = row.get("created_at")?;

    Ok(StoredEvent {
        id: row.get("id")?,
        run_id: row.get("run_id")?,
        agent_name: row.get("agent_name")?,
        session_id: row.get("session_id")?,
        event_type: event_type.parse().unwrap_or(EventType::Custom),
        tool_name: row.get("tool_name")?,
        tool_args: row.get("tool_args")?,
        tool_duration_ms: row.get("tool_duration_ms")?,
        level: level.parse().unwrap_or(Level::Info),
        data: row.get("data")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_assigns_monotone_ids() {
        let store = EventStore::open_in_memory().unwrap();
        let id1 = store
            .insert(NewEvent::new("agent-a", EventType::ToolStart))
            .unwrap();
        let id2 = store
            .insert(NewEvent::new("agent-a", EventType::ToolEnd))
            .unwrap();
        assert!(id2 > id1);
    }

    #[test]
    fn correlate_tool_end_is_idempotent() {
        let store = EventStore::open_in_memory().unwrap();
        store
            .insert(
                NewEvent::new("agent-a", EventType::ToolStart).with_tool("bash", None),
            )
            .unwrap();

        let first = store.correlate_tool_end("agent-a", "bash").unwrap();
        assert!(first.is_some());
        assert!(first.unwrap().duration_ms >= 0);

        let second = store.correlate_tool_end("agent-a", "bash").unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn correlate_picks_most_recent_uncorrelated_start() {
        let store = EventStore::open_in_memory().unwrap();
        store
            .insert(NewEvent::new("a", EventType::ToolStart).with_tool("bash", None))
            .unwrap();
        let second_start = store
            .insert(NewEvent::new("a", EventType::ToolStart).with_tool("bash", None))
            .unwrap();

        let corr = store.correlate_tool_end("a", "bash").unwrap().unwrap();
        assert_eq!(corr.start_id, second_start);
    }

    #[test]
    fn get_errors_descending() {
        let store = EventStore::open_in_memory().unwrap();
        store
            .insert(NewEvent::new("a", EventType::Error).with_level(Level::Error))
            .unwrap();
        store
            .insert(NewEvent::new("a", EventType::Error).with_level(Level::Error))
            .unwrap();

        let errors = store.get_errors(&EventQuery::default()).unwrap();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].id > errors[1].id);
    }

    #[test]
    fn timeline_ascending() {
        let store = EventStore::open_in_memory().unwrap();
        store
            .insert(NewEvent::new("a", EventType::SessionStart))
            .unwrap();
        store
            .insert(NewEvent::new("a", EventType::SessionEnd))
            .unwrap();

        let timeline = store.get_timeline(&EventQuery::default()).unwrap();
        assert!(timeline[0].id < timeline[1].id);
    }

    #[test]
    fn purge_older_than() {
        let store = EventStore::open_in_memory().unwrap();
        store.insert(NewEvent::new("a", EventType::Custom)).unwrap();

        let deleted = store
            .purge(&PurgeOptions {
                all: false,
                older_than_ms: Some(-1000), // "older than the future" => deletes nothing
                agent_name: None,
            })
            .unwrap();
        assert_eq!(deleted, 0);

        let deleted_all = store
            .purge(&PurgeOptions {
                all: true,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(deleted_all, 1);
    }
}
