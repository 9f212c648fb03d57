//! Worktree / Session Spawner (component H). Creates a worktree, deploys
//! the guard bundle, launches a detached terminal session running the
//! coding-assistant subprocess, and registers the new session.
//!
//! Not wired to a CLI verb: spec.md §6 doesn't list one (spawning is driven
//! by whatever external dispatcher picks the next task off the tracker —
//! itself out of scope per §1), so this is exposed as a library-shaped
//! module for that integration point and exercised directly by its tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use overstory_core::{AgentSession, Capability, GuardGenerator, RunStore, SessionRegistry};

pub struct SpawnRequest {
    pub agent_name: String,
    pub capability: Capability,
    pub bead_id: String,
    pub parent_agent: Option<String>,
    pub depth: u32,
    pub run_id: Option<String>,
}

pub struct SpawnedSession {
    pub agent_name: String,
    pub worktree_path: PathBuf,
    pub branch_name: String,
    pub tmux_session: String,
}

pub struct Spawner {
    repo_root: PathBuf,
    worktrees_base_dir: PathBuf,
    canonical_branch: String,
    registry: Arc<SessionRegistry>,
    runs: Arc<RunStore>,
    assistant_command: String,
}

impl Spawner {
    pub fn new(
        repo_root: impl Into<PathBuf>,
        worktrees_base_dir: impl Into<PathBuf>,
        canonical_branch: impl Into<String>,
        registry: Arc<SessionRegistry>,
        runs: Arc<RunStore>,
        assistant_command: impl Into<String>,
    ) -> Self {
        Self {
            repo_root: repo_root.into(),
            worktrees_base_dir: worktrees_base_dir.into(),
            canonical_branch: canonical_branch.into(),
            registry,
            runs,
            assistant_command: assistant_command.into(),
        }
    }

    /// Runs the full spawn sequence. Failure after worktree creation cleans
    /// up the worktree; failure after the tmux session starts additionally
    /// kills that session.
    pub fn spawn(&self, request: SpawnRequest) -> Result<SpawnedSession> {
        let worktree_path = self.worktrees_base_dir.join(&request.agent_name);
        let branch_name = format!("overstory/{}/{}", request.agent_name, request.bead_id);
        let tmux_session = format!("overstory-{}", request.agent_name);

        self.create_worktree(&worktree_path, &branch_name)?;

        if let Err(e) = self.deploy_guard_bundle(&worktree_path, request.capability, &request.agent_name) {
            let _ = self.remove_worktree(&worktree_path);
            return Err(e);
        }

        if let Err(e) = self.launch_terminal(&worktree_path, &tmux_session, &request.agent_name) {
            let _ = self.kill_terminal(&tmux_session);
            let _ = self.remove_worktree(&worktree_path);
            return Err(e);
        }

        let session = AgentSession::new_booting(
            request.agent_name.clone(),
            request.capability,
            worktree_path.display().to_string(),
            branch_name.clone(),
            request.bead_id,
            tmux_session.clone(),
            request.parent_agent,
            request.depth,
            request.run_id.clone(),
        );
        if let Err(e) = self.registry.upsert(&session) {
            let _ = self.kill_terminal(&tmux_session);
            let _ = self.remove_worktree(&worktree_path);
            return Err(e.into());
        }

        if let Some(run_id) = &request.run_id {
            if let Err(e) = self.runs.increment_agent_count(run_id) {
                tracing::warn!(run_id, error = %e, "failed to increment run agent count");
            }
        }

        Ok(SpawnedSession {
            agent_name: request.agent_name,
            worktree_path,
            branch_name,
            tmux_session,
        })
    }

    fn create_worktree(&self, worktree_path: &Path, branch_name: &str) -> Result<()> {
        if worktree_path.exists() {
            bail!("worktree already exists at {}", worktree_path.display());
        }
        std::fs::create_dir_all(&self.worktrees_base_dir)
            .context("failed to create worktrees base directory")?;

        let output = Command::new("git")
            .args([
                "worktree",
                "add",
                "-b",
                branch_name,
                &worktree_path.display().to_string(),
                &self.canonical_branch,
            ])
            .current_dir(&self.repo_root)
            .output()
            .context("failed to run git worktree add")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git worktree add failed: {stderr}");
        }
        Ok(())
    }

    fn remove_worktree(&self, worktree_path: &Path) -> Result<()> {
        let output = Command::new("git")
            .args(["worktree", "remove", "--force", &worktree_path.display().to_string()])
            .current_dir(&self.repo_root)
            .output()
            .context("failed to run git worktree remove")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(path = %worktree_path.display(), stderr = %stderr, "git worktree remove warning");
        }
        Ok(())
    }

    fn deploy_guard_bundle(&self, worktree_path: &Path, capability: Capability, agent_name: &str) -> Result<()> {
        let worktree_root = worktree_path.display().to_string();
        let bundle = GuardGenerator::generate(capability, &worktree_root, &self.canonical_branch);
        let json = bundle
            .to_json_string()
            .context("failed to serialize guard bundle")?;

        let claude_dir = worktree_path.join(".claude");
        std::fs::create_dir_all(&claude_dir)
            .with_context(|| format!("failed to create {}", claude_dir.display()))?;
        let settings_path = claude_dir.join("settings.local.json");
        std::fs::write(&settings_path, json)
            .with_context(|| format!("failed to write {}", settings_path.display()))?;

        tracing::info!(agent = agent_name, path = %settings_path.display(), "deployed guard bundle");
        Ok(())
    }

    fn launch_terminal(&self, worktree_path: &Path, tmux_session: &str, agent_name: &str) -> Result<()> {
        let has_session = Command::new("tmux")
            .args(["has-session", "-t", tmux_session])
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
        if has_session {
            bail!("tmux session {tmux_session} already exists");
        }

        let status = Command::new("tmux")
            .args([
                "new-session",
                "-d",
                "-s",
                tmux_session,
                "-c",
                &worktree_path.display().to_string(),
                &self.assistant_command,
            ])
            .env("OVERSTORY_AGENT_NAME", agent_name)
            .env("OVERSTORY_WORKTREE_PATH", worktree_path.display().to_string())
            .status()
            .context("failed to launch tmux session")?;

        if !status.success() {
            bail!("tmux new-session exited with {status}");
        }
        Ok(())
    }

    fn kill_terminal(&self, tmux_session: &str) -> Result<()> {
        let output = Command::new("tmux")
            .args(["kill-session", "-t", tmux_session])
            .output()
            .context("failed to run tmux kill-session")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(session = tmux_session, stderr = %stderr, "tmux kill-session warning");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use overstory_core::RunStore;

    fn init_repo(dir: &Path) {
        for args in [
            vec!["init", "-b", "main"],
            vec!["config", "user.email", "test@test.com"],
            vec!["config", "user.name", "Test"],
        ] {
            Command::new("git").args(&args).current_dir(dir).output().unwrap();
        }
        std::fs::write(dir.join("README.md"), "hello").unwrap();
        Command::new("git").args(["add", "."]).current_dir(dir).output().unwrap();
        Command::new("git")
            .args(["commit", "-m", "init"])
            .current_dir(dir)
            .output()
            .unwrap();
    }

    #[test]
    fn create_worktree_rejects_existing_path() {
        let repo = tempfile::tempdir().unwrap();
        init_repo(repo.path());
        let worktrees = repo.path().join("worktrees");
        std::fs::create_dir_all(worktrees.join("dup")).unwrap();

        let spawner = Spawner::new(
            repo.path(),
            worktrees.clone(),
            "main",
            Arc::new(SessionRegistry::open_in_memory().unwrap()),
            Arc::new(RunStore::open_in_memory().unwrap()),
            "true",
        );

        let err = spawner
            .create_worktree(&worktrees.join("dup"), "overstory/dup/bd-1")
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }

    #[test]
    fn deploy_guard_bundle_writes_settings_file() {
        let repo = tempfile::tempdir().unwrap();
        init_repo(repo.path());
        let worktree = repo.path().join("wt");
        std::fs::create_dir_all(&worktree).unwrap();

        let spawner = Spawner::new(
            repo.path(),
            repo.path().join("worktrees"),
            "main",
            Arc::new(SessionRegistry::open_in_memory().unwrap()),
            Arc::new(RunStore::open_in_memory().unwrap()),
            "true",
        );
        spawner
            .deploy_guard_bundle(&worktree, Capability::Builder, "builder-1")
            .unwrap();

        let settings = worktree.join(".claude").join("settings.local.json");
        assert!(settings.exists());
        let contents = std::fs::read_to_string(settings).unwrap();
        assert!(contents.contains("PreToolUse"));
    }
}
