//! `overstory worktree list|clean`

use std::process::Command;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use overstory_core::SessionState;
use serde::Serialize;

use crate::context::AppContext;
use crate::output::Reportable;

#[derive(Debug, Subcommand)]
pub enum WorktreeCommands {
    /// List known worker worktrees and their session state.
    List(ListArgs),
    /// Remove worktrees for completed (or all) sessions.
    Clean(CleanArgs),
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct CleanArgs {
    #[arg(long)]
    pub completed: bool,
    #[arg(long)]
    pub all: bool,
    #[arg(long)]
    pub force: bool,
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct WorktreeRow {
    agent_name: String,
    worktree_path: String,
    branch_name: String,
    state: String,
}

#[derive(Serialize)]
struct WorktreeListReport {
    worktrees: Vec<WorktreeRow>,
}

impl Reportable for WorktreeListReport {
    fn to_human(&self) -> String {
        if self.worktrees.is_empty() {
            return "(no worktrees)".to_string();
        }
        self.worktrees
            .iter()
            .map(|w| format!("{}\t{}\t{}\t{}", w.agent_name, w.state, w.branch_name, w.worktree_path))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Serialize)]
struct CleanReport {
    removed: Vec<String>,
}

impl Reportable for CleanReport {
    fn to_human(&self) -> String {
        if self.removed.is_empty() {
            return "nothing to clean".to_string();
        }
        format!("removed {} worktree(s): {}", self.removed.len(), self.removed.join(", "))
    }
}

pub fn run(ctx: &AppContext, cmd: WorktreeCommands) -> Result<()> {
    match cmd {
        WorktreeCommands::List(args) => list(ctx, args),
        WorktreeCommands::Clean(args) => clean(ctx, args),
    }
}

fn list(ctx: &AppContext, args: ListArgs) -> Result<()> {
    let sessions = ctx.registry.get_all()?;
    let worktrees = sessions
        .into_iter()
        .map(|s| WorktreeRow {
            agent_name: s.agent_name,
            worktree_path: s.worktree_path,
            branch_name: s.branch_name,
            state: s.state.as_str().to_string(),
        })
        .collect();
    WorktreeListReport { worktrees }.print(args.json);
    Ok(())
}

fn clean(ctx: &AppContext, args: CleanArgs) -> Result<()> {
    if !args.completed && !args.all {
        anyhow::bail!("pass --completed or --all to select which worktrees to clean");
    }

    let sessions = ctx.registry.get_all()?;
    let repo_root = std::env::current_dir().context("failed to resolve current directory")?;
    let mut removed = Vec::new();

    for session in sessions {
        let eligible = args.all || session.state == SessionState::Completed;
        if !eligible {
            continue;
        }

        if !args.force && session.state.is_active() {
            tracing::warn!(agent = %session.agent_name, "skipping active session without --force");
            continue;
        }

        let mut git_args = vec!["worktree", "remove", &session.worktree_path];
        if args.force {
            git_args.push("--force");
        }
        let output = Command::new("git")
            .args(&git_args)
            .current_dir(&repo_root)
            .output()
            .context("failed to run git worktree remove")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(agent = %session.agent_name, stderr = %stderr, "git worktree remove failed");
            continue;
        }

        ctx.registry.remove(&session.agent_name)?;
        removed.push(session.agent_name);
    }

    CleanReport { removed }.print(args.json);
    Ok(())
}
