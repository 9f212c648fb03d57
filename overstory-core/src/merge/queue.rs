//! Merge Queue — durable FIFO queue with explicit state transitions.
//!
//! `pending -> merging -> {merged, conflict, failed}`; `conflict` and
//! `failed` are terminal for the entry.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

use super::types::{MergeEntry, MergeStatus, ResolvedTier};
use crate::db;

pub type QueueResult<T> = Result<T, MergeQueueError>;

#[derive(Debug, thiserror::Error)]
pub enum MergeQueueError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("branch already queued: {0}")]
    AlreadyQueued(String),
    #[error("entry not found: {0}")]
    NotFound(String),
}

pub struct MergeQueue {
    conn: Mutex<rusqlite::Connection>,
}

const CREATE_SQL: &str = "
CREATE TABLE IF NOT EXISTS merge_queue (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    branch_name     TEXT NOT NULL UNIQUE,
    bead_id         TEXT NOT NULL,
    agent_name      TEXT NOT NULL,
    files_modified  TEXT NOT NULL,
    enqueued_at     TEXT NOT NULL,
    status          TEXT NOT NULL,
    resolved_tier   TEXT
);
CREATE INDEX IF NOT EXISTS idx_merge_status ON merge_queue(status, enqueued_at, id);
";

impl MergeQueue {
    pub fn open(path: impl AsRef<Path>) -> QueueResult<Self> {
        let conn = db::open(path)?;
        conn.execute_batch(CREATE_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> QueueResult<Self> {
        let conn = db::open_in_memory()?;
        conn.execute_batch(CREATE_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Rejects if a non-terminal entry for the branch already exists.
    pub fn enqueue(&self, entry: &MergeEntry) -> QueueResult<()> {
        let conn = self.conn.lock().unwrap();

        let existing_status: Option<String> = conn
            .query_row(
                "SELECT status FROM merge_queue WHERE branch_name = ?1",
                params![entry.branch_name],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(status) = existing_status {
            let status: MergeStatus = status.parse().unwrap_or(MergeStatus::Failed);
            if !status.is_terminal() {
                return Err(MergeQueueError::AlreadyQueued(entry.branch_name.clone()));
            }
            conn.execute(
                "DELETE FROM merge_queue WHERE branch_name = ?1",
                params![entry.branch_name],
            )?;
        }

        conn.execute(
            "INSERT INTO merge_queue (branch_name, bead_id, agent_name, files_modified, enqueued_at, status, resolved_tier)
             VALUES (?1,?2,?3,?4,?5,?6,NULL)",
            params![
                entry.branch_name,
                entry.bead_id,
                entry.agent_name,
                serde_json::to_string(&entry.files_modified)?,
                entry.enqueued_at.to_rfc3339(),
                entry.status.as_str(),
            ],
        )?;
        Ok(())
    }

    /// Oldest `pending` entry, or `None`. Does not mutate.
    /// Ordering: `enqueued_at` ascending, ties broken by insertion id.
    pub fn peek(&self) -> QueueResult<Option<MergeEntry>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT * FROM merge_queue WHERE status = 'pending' ORDER BY enqueued_at ASC, id ASC LIMIT 1",
            [],
            row_to_entry,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn update_status(
        &self,
        branch_name: &str,
        status: MergeStatus,
        tier: Option<ResolvedTier>,
    ) -> QueueResult<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE merge_queue SET status = ?1, resolved_tier = ?2 WHERE branch_name = ?3",
            params![status.as_str(), tier.map(|t| t.as_str()), branch_name],
        )?;
        if changed == 0 {
            return Err(MergeQueueError::NotFound(branch_name.to_string()));
        }
        Ok(())
    }

    /// Enumerate in insertion order, optionally filtered by status.
    pub fn list(&self, status: Option<MergeStatus>) -> QueueResult<Vec<MergeEntry>> {
        let conn = self.conn.lock().unwrap();
        match status {
            Some(status) => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM merge_queue WHERE status = ?1 ORDER BY enqueued_at ASC, id ASC",
                )?;
                let rows = stmt
                    .query_map(params![status.as_str()], row_to_entry)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            }
            None => {
                let mut stmt =
                    conn.prepare("SELECT * FROM merge_queue ORDER BY enqueued_at ASC, id ASC")?;
                let rows = stmt
                    .query_map([], row_to_entry)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            }
        }
    }

    pub fn close(self) {}
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<MergeEntry> {
    let files_modified: String = row.get("files_modified")?;
    let enqueued_at: String = row.get("enqueued_at")?;
    let status: String = row.get("status")?;
    let resolved_tier: Option<String> = row.get("resolved_tier")?;

    Ok(MergeEntry {
        branch_name: row.get("branch_name")?,
        bead_id: row.get("bead_id")?,
        agent_name: row.get("agent_name")?,
        files_modified: serde_json::from_str(&files_modified).unwrap_or_default(),
        enqueued_at: DateTime::parse_from_rfc3339(&enqueued_at)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        status: status.parse().unwrap_or(MergeStatus::Pending),
        resolved_tier: resolved_tier.and_then(|t| t.parse().ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_ordering_by_enqueue_time() {
        let queue = MergeQueue::open_in_memory().unwrap();
        let mut e1 = MergeEntry::new("overstory/a/bd-1", "bd-1", "a", vec!["f1".to_string()]);
        queue.enqueue(&e1).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let e2 = MergeEntry::new("overstory/b/bd-2", "bd-2", "b", vec!["f2".to_string()]);
        queue.enqueue(&e2).unwrap();

        let peeked = queue.peek().unwrap().unwrap();
        assert_eq!(peeked.branch_name, e1.branch_name);

        queue.update_status(&e1.branch_name, MergeStatus::Merged, Some(ResolvedTier::CleanMerge)).unwrap();
        e1.status = MergeStatus::Merged;

        let next = queue.peek().unwrap().unwrap();
        assert_eq!(next.branch_name, e2.branch_name);
    }

    #[test]
    fn duplicate_non_terminal_branch_rejected() {
        let queue = MergeQueue::open_in_memory().unwrap();
        let entry = MergeEntry::new("overstory/a/bd-1", "bd-1", "a", vec![]);
        queue.enqueue(&entry).unwrap();

        let err = queue.enqueue(&entry).unwrap_err();
        assert!(matches!(err, MergeQueueError::AlreadyQueued(_)));
    }

    #[test]
    fn terminal_branch_can_be_requeued() {
        let queue = MergeQueue::open_in_memory().unwrap();
        let entry = MergeEntry::new("overstory/a/bd-1", "bd-1", "a", vec![]);
        queue.enqueue(&entry).unwrap();
        queue
            .update_status(&entry.branch_name, MergeStatus::Failed, None)
            .unwrap();

        queue.enqueue(&entry).unwrap();
        let listed = queue.list(None).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].status, MergeStatus::Pending);
    }
}
