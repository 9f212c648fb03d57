//! Pending Nudge Marker — one small JSON file per recipient, deployed
//! file-based so a worker's own hook can deliver the interrupt at a safe
//! point instead of the sender writing keystrokes mid-tool-call.

use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum NudgeError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type NudgeResult<T> = Result<T, NudgeError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NudgeMarker {
    pub from: String,
    pub reason: String,
    pub subject: String,
    pub message_id: String,
    pub created_at: DateTime<Utc>,
}

pub struct NudgeBoard {
    dir: PathBuf,
}

impl NudgeBoard {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn marker_path(&self, agent: &str) -> PathBuf {
        self.dir.join(format!("{agent}.json"))
    }

    /// Writes (or overwrites) the marker for `agent`. Concurrent sends to
    /// the same recipient overwrite one another — only the latest nudge
    /// matters, so the write is create-then-rename rather than appended.
    pub fn write(&self, agent: &str, marker: &NudgeMarker) -> NudgeResult<()> {
        fs::create_dir_all(&self.dir)?;
        let final_path = self.marker_path(agent);
        let tmp_path = self.dir.join(format!(".{agent}.json.tmp"));
        let body = serde_json::to_vec_pretty(marker)?;
        fs::write(&tmp_path, body)?;
        fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }

    /// Reads and deletes the marker for `agent`, tolerating races by
    /// attempting deletion unconditionally after the read.
    pub fn take(&self, agent: &str) -> NudgeResult<Option<NudgeMarker>> {
        let path = self.marker_path(agent);
        let marker = match fs::read(&path) {
            Ok(bytes) => Some(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        match fs::remove_file(&path) {
            Ok(()) | Err(_) => {}
        }
        Ok(marker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_marker() -> NudgeMarker {
        NudgeMarker {
            from: "lead-1".to_string(),
            reason: "merge ready".to_string(),
            subject: "please review".to_string(),
            message_id: "msg-abc123def456".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn write_then_take_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let board = NudgeBoard::new(dir.path());
        board.write("builder-1", &sample_marker()).unwrap();

        let taken = board.take("builder-1").unwrap().unwrap();
        assert_eq!(taken.from, "lead-1");

        assert!(board.take("builder-1").unwrap().is_none());
    }

    #[test]
    fn newer_nudge_overwrites_older() {
        let dir = tempfile::tempdir().unwrap();
        let board = NudgeBoard::new(dir.path());
        let mut first = sample_marker();
        first.subject = "first".to_string();
        board.write("builder-1", &first).unwrap();

        let mut second = sample_marker();
        second.subject = "second".to_string();
        board.write("builder-1", &second).unwrap();

        let taken = board.take("builder-1").unwrap().unwrap();
        assert_eq!(taken.subject, "second");
    }

    #[test]
    fn take_on_missing_marker_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let board = NudgeBoard::new(dir.path());
        assert!(board.take("nobody").unwrap().is_none());
    }
}
