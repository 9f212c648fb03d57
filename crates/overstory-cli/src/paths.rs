//! Resolves the `.overstory/` file layout described in the external
//! interfaces section: every durable store, the manifest, the hook
//! bundles, and the per-recipient nudge markers all hang off one root.

use std::path::{Path, PathBuf};

/// All paths a CLI invocation might touch, rooted at `<project>/.overstory/`.
#[derive(Debug, Clone)]
pub struct OverstoryPaths {
    pub root: PathBuf,
}

impl OverstoryPaths {
    /// `project_root` is the repository root; `.overstory/` is a direct child.
    pub fn new(project_root: impl AsRef<Path>) -> Self {
        Self {
            root: project_root.as_ref().join(".overstory"),
        }
    }

    /// Walk up from the current directory looking for an existing
    /// `.overstory/` directory; falls back to `<cwd>/.overstory` so `init`
    /// has somewhere to create it.
    pub fn discover() -> std::io::Result<Self> {
        let cwd = std::env::current_dir()?;
        let mut dir = cwd.as_path();
        loop {
            if dir.join(".overstory").is_dir() {
                return Ok(Self::new(dir));
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => return Ok(Self::new(&cwd)),
            }
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.yaml")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("agent-manifest.json")
    }

    pub fn agent_defs_dir(&self) -> PathBuf {
        self.root.join("agent-defs")
    }

    pub fn hooks_json_path(&self) -> PathBuf {
        self.root.join("hooks.json")
    }

    pub fn agents_dir(&self) -> PathBuf {
        self.root.join("agents")
    }

    pub fn agent_identity_path(&self, name: &str) -> PathBuf {
        self.agents_dir().join(name).join("identity.yaml")
    }

    pub fn agent_checkpoint_path(&self, name: &str) -> PathBuf {
        self.agents_dir().join(name).join("checkpoint.json")
    }

    pub fn worktrees_dir(&self) -> PathBuf {
        self.root.join("worktrees")
    }

    pub fn mail_db(&self) -> PathBuf {
        self.root.join("mail.db")
    }

    pub fn events_db(&self) -> PathBuf {
        self.root.join("events.db")
    }

    pub fn sessions_db(&self) -> PathBuf {
        self.root.join("sessions.db")
    }

    pub fn metrics_db(&self) -> PathBuf {
        self.root.join("metrics.db")
    }

    pub fn merge_queue_db(&self) -> PathBuf {
        self.root.join("merge-queue.db")
    }

    pub fn pending_nudges_dir(&self) -> PathBuf {
        self.root.join("pending-nudges")
    }

    pub fn current_run_path(&self) -> PathBuf {
        self.root.join("current-run.txt")
    }
}
