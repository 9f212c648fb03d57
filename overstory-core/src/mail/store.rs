//! Mail Store — durable message table with the same storage model as the
//! event store. The only component whose schema evolves in place: old
//! installations missing the `payload` column or the full protocol-type
//! check set are migrated on open.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::types::{generate_message_id, MailPurgeOptions, Message, MessageQuery, MessageType, NewMessage, Priority};
use crate::db;

pub type MailResult<T> = Result<T, MailStoreError>;

#[derive(Debug, thiserror::Error)]
pub enum MailStoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("message id already exists: {0}")]
    DuplicateId(String),
}

pub struct MailStore {
    conn: Mutex<rusqlite::Connection>,
}

const ALL_TYPES: &[&str] = &[
    "status",
    "question",
    "result",
    "error",
    "worker_done",
    "merge_ready",
    "merged",
    "merge_failed",
    "escalation",
    "health_check",
    "dispatch",
    "assign",
];

const ALL_PRIORITIES: &[&str] = &["low", "normal", "high", "urgent"];

fn create_sql() -> String {
    let types = ALL_TYPES
        .iter()
        .map(|t| format!("'{t}'"))
        .collect::<Vec<_>>()
        .join(",");
    let priorities = ALL_PRIORITIES
        .iter()
        .map(|p| format!("'{p}'"))
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "CREATE TABLE mail (
            id          TEXT PRIMARY KEY,
            from_agent  TEXT NOT NULL,
            to_agent    TEXT NOT NULL,
            subject     TEXT NOT NULL,
            body        TEXT NOT NULL,
            priority    TEXT NOT NULL CHECK (priority IN ({priorities})),
            type        TEXT NOT NULL CHECK (type IN ({types})),
            thread_id   TEXT,
            payload     TEXT,
            read        INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_mail_to_read ON mail(to_agent, read, created_at);
        CREATE INDEX IF NOT EXISTS idx_mail_thread ON mail(thread_id);
        CREATE INDEX IF NOT EXISTS idx_mail_created ON mail(created_at);"
    )
}

/// Runs the in-place schema migration described by the store's contract: if
/// the `mail` table is missing the `payload` column or the full
/// protocol-type check set, rebuild it transactionally, copying rows and
/// rewriting any now-invalid `type` value to `status`.
fn run_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    let table_exists: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='mail'",
            [],
            |_| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !table_exists {
        conn.execute_batch(&create_sql())?;
        return Ok(());
    }

    let has_payload: bool = {
        let mut stmt = conn.prepare("PRAGMA table_info(mail)")?;
        let cols = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        cols.iter().any(|c| c == "payload")
    };

    let table_sql: String = conn.query_row(
        "SELECT sql FROM sqlite_master WHERE type='table' AND name='mail'",
        [],
        |row| row.get(0),
    )?;
    let has_full_type_set = ALL_TYPES.iter().all(|t| table_sql.contains(t));

    if has_payload && has_full_type_set {
        return Ok(());
    }

    conn.execute_batch("BEGIN IMMEDIATE")?;
    let migration = (|| -> rusqlite::Result<()> {
        conn.execute_batch("ALTER TABLE mail RENAME TO mail_old")?;
        conn.execute_batch(&create_sql())?;

        let mut stmt = conn.prepare("SELECT * FROM mail_old")?;

        let rows: Vec<(String, String, String, String, String, String, String, Option<String>, Option<String>, i64, String)> = stmt
            .query_map([], |row| {
                let raw_type: String = row.get("type")?;
                let fixed_type = if ALL_TYPES.contains(&raw_type.as_str()) {
                    raw_type
                } else {
                    "status".to_string()
                };
                let raw_priority: String = row.get("priority").unwrap_or_else(|_| "normal".to_string());
                let fixed_priority = if ALL_PRIORITIES.contains(&raw_priority.as_str()) {
                    raw_priority
                } else {
                    "normal".to_string()
                };
                Ok((
                    row.get("id")?,
                    row.get("from_agent")?,
                    row.get("to_agent")?,
                    row.get("subject")?,
                    row.get("body")?,
                    fixed_priority,
                    fixed_type,
                    row.get("thread_id").unwrap_or(None),
                    row.get("payload").unwrap_or(None),
                    row.get("read").unwrap_or(0),
                    row.get("created_at")?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        for r in rows {
            conn.execute(
                "INSERT INTO mail (id, from_agent, to_agent, subject, body, priority, type, thread_id, payload, read, created_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
                params![r.0, r.1, r.2, r.3, r.4, r.5, r.6, r.7, r.8, r.9, r.10],
            )?;
        }

        conn.execute_batch("DROP TABLE mail_old")?;
        Ok(())
    })();

    match migration {
        Ok(()) => conn.execute_batch("COMMIT")?,
        Err(e) => {
            conn.execute_batch("ROLLBACK").ok();
            return Err(e);
        }
    }
    Ok(())
}

impl MailStore {
    pub fn open(path: impl AsRef<Path>) -> MailResult<Self> {
        let conn = db::open(path)?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> MailResult<Self> {
        let conn = db::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Generates an id if the caller left one unset; fails with
    /// `DuplicateId` if the id is already present.
    pub fn insert(&self, msg: NewMessage) -> MailResult<Message> {
        let conn = self.conn.lock().unwrap();
        let id = msg.id.clone().unwrap_or_else(generate_message_id);

        let exists: bool = conn
            .query_row("SELECT 1 FROM mail WHERE id = ?1", params![id], |_| Ok(true))
            .optional()?
            .unwrap_or(false);
        if exists {
            return Err(MailStoreError::DuplicateId(id));
        }

        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO mail (id, from_agent, to_agent, subject, body, priority, type, thread_id, payload, read, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,0,?10)",
            params![
                id,
                msg.from,
                msg.to,
                msg.subject,
                msg.body,
                msg.priority.as_str(),
                msg.message_type.as_str(),
                msg.thread_id,
                msg.payload,
                created_at.to_rfc3339(),
            ],
        )?;

        Ok(Message {
            id,
            from: msg.from,
            to: msg.to,
            subject: msg.subject,
            body: msg.body,
            priority: msg.priority,
            message_type: msg.message_type,
            thread_id: msg.thread_id,
            payload: msg.payload,
            read: false,
            created_at,
        })
    }

    /// Unread messages addressed to `agent`, chronologically ascending.
    pub fn get_unread(&self, agent: &str) -> MailResult<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM mail WHERE to_agent = ?1 AND read = 0 ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![agent], row_to_message)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Filtered listing, descending by creation time.
    pub fn get_all(&self, query: &MessageQuery) -> MailResult<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut sql = String::from("SELECT * FROM mail WHERE 1=1");
        let mut bound: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(from) = &query.from {
            sql.push_str(" AND from_agent = ?");
            bound.push(Box::new(from.clone()));
        }
        if let Some(to) = &query.to {
            sql.push_str(" AND to_agent = ?");
            bound.push(Box::new(to.clone()));
        }
        if let Some(unread) = query.unread {
            sql.push_str(" AND read = ?");
            bound.push(Box::new(if unread { 0 } else { 1 }));
        }
        sql.push_str(" ORDER BY created_at DESC");
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let mut stmt = conn.prepare(&sql)?;
        let refs: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|v| v.as_ref()).collect();
        let rows = stmt
            .query_map(refs.as_slice(), row_to_message)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_by_id(&self, id: &str) -> MailResult<Option<Message>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT * FROM mail WHERE id = ?1", params![id], row_to_message)
            .optional()
            .map_err(Into::into)
    }

    pub fn get_by_thread(&self, thread_id: &str) -> MailResult<Vec<Message>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM mail WHERE thread_id = ?1 OR id = ?1 ORDER BY created_at ASC",
        )?;
        let rows = stmt
            .query_map(params![thread_id], row_to_message)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn mark_read(&self, id: &str) -> MailResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("UPDATE mail SET read = 1 WHERE id = ?1", params![id])?;
        Ok(())
    }

    pub fn purge(&self, opts: &MailPurgeOptions) -> MailResult<u64> {
        let conn = self.conn.lock().unwrap();
        if opts.all {
            let n = conn.execute("DELETE FROM mail", [])?;
            return Ok(n as u64);
        }

        let mut sql = String::from("DELETE FROM mail WHERE 1=1");
        let mut bound: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(older_than_ms) = opts.older_than_ms {
            let cutoff = Utc::now() - chrono::Duration::milliseconds(older_than_ms);
            sql.push_str(" AND created_at < ?");
            bound.push(Box::new(cutoff.to_rfc3339()));
        }
        if let Some(agent) = &opts.agent {
            sql.push_str(" AND (from_agent = ? OR to_agent = ?)");
            bound.push(Box::new(agent.clone()));
            bound.push(Box::new(agent.clone()));
        }
        let refs: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|v| v.as_ref()).collect();
        let n = conn.execute(&sql, refs.as_slice())?;
        Ok(n as u64)
    }
}

fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<Message> {
    let priority: String = row.get("priority")?;
    let message_type: String = row.get("type")?;
    let created_at: String = row.get("created_at")?;
    let read: i64 = row.get("read")?;

    Ok(Message {
        id: row.get("id")?,
        from: row.get("from_agent")?,
        to: row.get("to_agent")?,
        subject: row.get("subject")?,
        body: row.get("body")?,
        priority: priority.parse().unwrap_or(Priority::Normal),
        message_type: message_type.parse().unwrap_or(MessageType::Status),
        thread_id: row.get("thread_id")?,
        payload: row.get("payload")?,
        read: read != 0,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_generates_id_when_unset() {
        let store = MailStore::open_in_memory().unwrap();
        let msg = store
            .insert(NewMessage::new("alice", "bob", "hi", "body", MessageType::Status))
            .unwrap();
        assert!(msg.id.starts_with("msg-"));
        assert_eq!(msg.id.len(), 16);
    }

    #[test]
    fn duplicate_id_rejected() {
        let store = MailStore::open_in_memory().unwrap();
        let mut msg = NewMessage::new("alice", "bob", "hi", "body", MessageType::Status);
        msg.id = Some("msg-fixedvalue1".to_string());
        store.insert(msg.clone()).unwrap();
        let err = store.insert(msg).unwrap_err();
        assert!(matches!(err, MailStoreError::DuplicateId(_)));
    }

    #[test]
    fn unread_then_mark_read() {
        let store = MailStore::open_in_memory().unwrap();
        let msg = store
            .insert(NewMessage::new("alice", "bob", "hi", "body", MessageType::Status))
            .unwrap();

        assert_eq!(store.get_unread("bob").unwrap().len(), 1);
        store.mark_read(&msg.id).unwrap();
        assert_eq!(store.get_unread("bob").unwrap().len(), 0);
        assert!(store.get_by_id(&msg.id).unwrap().unwrap().read);
    }

    #[test]
    fn get_all_filters_and_orders_descending() {
        let store = MailStore::open_in_memory().unwrap();
        store
            .insert(NewMessage::new("alice", "bob", "first", "b", MessageType::Status))
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store
            .insert(NewMessage::new("alice", "carol", "second", "b", MessageType::Status))
            .unwrap();

        let to_bob = store
            .get_all(&MessageQuery {
                to: Some("bob".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(to_bob.len(), 1);

        let all = store.get_all(&MessageQuery::default()).unwrap();
        assert_eq!(all[0].subject, "second");
    }

    #[test]
    fn migration_is_idempotent_on_a_fresh_store() {
        let conn = db::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM mail", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn migration_rebuilds_legacy_table_without_payload() {
        let conn = db::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE mail (
                id TEXT PRIMARY KEY,
                from_agent TEXT NOT NULL,
                to_agent TEXT NOT NULL,
                subject TEXT NOT NULL,
                body TEXT NOT NULL,
                priority TEXT NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('status','question','result','error')),
                thread_id TEXT,
                read INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO mail (id, from_agent, to_agent, subject, body, priority, type, read, created_at)
             VALUES ('msg-legacy0001', 'a', 'b', 's', 'body', 'normal', 'legacy_kind', 0, '2024-01-01T00:00:00Z')",
            [],
        )
        .unwrap();

        run_migrations(&conn).unwrap();

        let has_payload: bool = {
            let mut stmt = conn.prepare("PRAGMA table_info(mail)").unwrap();
            let cols = stmt
                .query_map([], |row| row.get::<_, String>(1))
                .unwrap()
                .collect::<Result<Vec<_>, _>>()
                .unwrap();
            cols.iter().any(|c| c == "payload")
        };
        assert!(has_payload);

        let rewritten_type: String = conn
            .query_row(
                "SELECT type FROM mail WHERE id = 'msg-legacy0001'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(rewritten_type, "status");
    }
}
