//! `overstory init [--force]` — scaffolds the `.overstory/` directory.

use anyhow::{bail, Context, Result};

use crate::config::ProjectConfig;
use crate::paths::OverstoryPaths;

const DEFAULT_AGENT_MANIFEST: &str = r#"{
  "version": "1",
  "agents": {
    "scout-1": {
      "file": "scout-1.md",
      "model": "sonnet",
      "tools": ["Read", "Grep", "Glob"],
      "capabilities": ["scout"],
      "canSpawn": false
    },
    "builder-1": {
      "file": "builder-1.md",
      "model": "sonnet",
      "tools": ["Read", "Write", "Edit", "Bash"],
      "capabilities": ["builder"],
      "canSpawn": false
    }
  }
}
"#;

const DEFAULT_SCOUT_PROMPT: &str = "# Scout\n\nInvestigate the codebase and report findings. You have no write tools.\n";
const DEFAULT_BUILDER_PROMPT: &str = "# Builder\n\nImplement the assigned task inside your worktree boundary.\n";

fn default_hooks_json() -> serde_json::Value {
    serde_json::json!({
        "hooks": {
            "SessionStart": [],
            "UserPromptSubmit": [
                { "matcher": "", "hooks": [{ "type": "command", "command": "overstory prime --agent \"$OVERSTORY_AGENT_NAME\"" }] }
            ],
            "PreToolUse": [
                { "matcher": "*", "hooks": [{ "type": "command", "command": "overstory log tool-start --agent \"$OVERSTORY_AGENT_NAME\" --stdin" }] }
            ],
            "PostToolUse": [
                { "matcher": "*", "hooks": [{ "type": "command", "command": "overstory log tool-end --agent \"$OVERSTORY_AGENT_NAME\" --stdin" }] }
            ],
            "Stop": [
                { "matcher": "", "hooks": [{ "type": "command", "command": "overstory log session-end --agent \"$OVERSTORY_AGENT_NAME\"" }] }
            ],
            "PreCompact": []
        }
    })
}

pub struct InitReport {
    pub root: std::path::PathBuf,
    pub created: bool,
}

pub fn run(project_name: &str, force: bool) -> Result<InitReport> {
    let paths = OverstoryPaths::discover().context("failed to resolve project root")?;

    if paths.root.is_dir() && !force {
        bail!(
            "{} already exists; pass --force to reinitialize",
            paths.root.display()
        );
    }

    std::fs::create_dir_all(&paths.root)?;
    std::fs::create_dir_all(paths.agent_defs_dir())?;
    std::fs::create_dir_all(paths.agents_dir())?;
    std::fs::create_dir_all(paths.worktrees_dir())?;
    std::fs::create_dir_all(paths.pending_nudges_dir())?;

    let config = ProjectConfig::new(project_name);
    config.save(paths.config_path())?;

    std::fs::write(paths.manifest_path(), DEFAULT_AGENT_MANIFEST)?;
    std::fs::write(paths.agent_defs_dir().join("scout-1.md"), DEFAULT_SCOUT_PROMPT)?;
    std::fs::write(paths.agent_defs_dir().join("builder-1.md"), DEFAULT_BUILDER_PROMPT)?;

    let hooks_json = serde_json::to_string_pretty(&default_hooks_json())?;
    std::fs::write(paths.hooks_json_path(), &hooks_json)?;

    let claude_dir = paths.root.parent().unwrap_or(&paths.root).join(".claude");
    std::fs::create_dir_all(&claude_dir)?;
    std::fs::write(claude_dir.join("settings.json"), &hooks_json)?;

    // Touch the stores so they exist with their schemas applied.
    overstory_core::EventStore::open(paths.events_db())?;
    overstory_core::MailStore::open(paths.mail_db())?;
    overstory_core::SessionRegistry::open(paths.sessions_db())?;
    overstory_core::RunStore::open(paths.sessions_db())?;
    overstory_core::MergeQueue::open(paths.merge_queue_db())?;

    Ok(InitReport {
        root: paths.root,
        created: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static CWD_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn init_scaffolds_expected_layout() {
        let _guard = CWD_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        let report = run("demo-project", false);
        std::env::set_current_dir(original).unwrap();

        let report = report.unwrap();
        assert!(report.root.join("config.yaml").exists());
        assert!(report.root.join("agent-manifest.json").exists());
        assert!(report.root.join("agent-defs").join("builder-1.md").exists());
        assert!(report.root.join("hooks.json").exists());
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let _guard = CWD_LOCK.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(dir.path()).unwrap();

        run("demo-project", false).unwrap();
        let second = run("demo-project", false);
        std::env::set_current_dir(original).unwrap();

        assert!(second.is_err());
    }
}
