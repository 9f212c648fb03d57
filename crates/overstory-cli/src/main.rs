//! `overstory` — the CLI surface (component L) over the coordination fabric
//! in `overstory-core`, plus the Worktree/Session Spawner (component H),
//! which shells out to `git worktree` and `tmux` and so lives in this
//! binary crate rather than the library.
//!
//! One `Commands` variant per verb in spec.md §6; each subcommand builds a
//! fresh [`AppContext`] against `.overstory/` and hands off to its `run`.
//! The CLI itself — flag parsing, verb dispatch — is deliberately thin; the
//! semantics live in `overstory-core` and in the command modules here.

mod commands;
mod config;
mod context;
mod hook_input;
mod init;
mod output;
mod paths;
mod spawner;
mod tool_filter;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::feed::FeedArgs;
use commands::inspect::InspectArgs;
use commands::log::LogCommands;
use commands::mail::MailCommands;
use commands::metrics::MetricsArgs;
use commands::nudge::NudgeArgs;
use commands::prime::PrimeArgs;
use commands::replay::ReplayArgs;
use commands::worktree::WorktreeCommands;
use context::AppContext;

#[derive(Debug, Parser)]
#[command(name = "overstory", about = "Coordination fabric for the Overstory agent fleet")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scaffold `.overstory/` in the current project.
    Init {
        #[arg(long)]
        force: bool,
        #[arg(long)]
        project: Option<String>,
    },
    /// Inter-agent mail: send, check, list, read, reply, purge.
    #[command(subcommand)]
    Mail(MailCommands),
    /// Inspect or clean up worker worktrees.
    #[command(subcommand)]
    Worktree(WorktreeCommands),
    /// Replay the stored event timeline for a run or a set of agents.
    Replay(ReplayArgs),
    /// Tail the event store, optionally following as new events arrive.
    Feed(FeedArgs),
    /// Aggregate per-tool timing stats.
    Metrics(MetricsArgs),
    /// Inspect one agent's session state, recent events, and terminal pane.
    Inspect(InspectArgs),
    /// Hook entrypoints: tool-start, tool-end, session-end.
    #[command(subcommand)]
    Log(LogCommands),
    /// Emit the context text pasted into a worker's next prompt.
    Prime(PrimeArgs),
    /// Deliver a file-based reminder to an agent.
    Nudge(NudgeArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(err) = dispatch(cli.command) {
        eprintln!("error: {err:#}");
        std::process::exit(exit_code_for(&err));
    }
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<overstory_core::OverstoryError>() {
        return e.exit_code();
    }
    if err.downcast_ref::<clap::Error>().is_some() {
        return 1;
    }
    2
}

fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Init { force, project } => {
            let project = project.unwrap_or_else(default_project_name);
            let report = init::run(&project, force)?;
            println!(
                "initialized {} ({})",
                report.root.display(),
                if report.created { "created" } else { "reused" }
            );
            Ok(())
        }
        Commands::Mail(cmd) => commands::mail::run(&AppContext::load()?, cmd),
        Commands::Worktree(cmd) => commands::worktree::run(&AppContext::load()?, cmd),
        Commands::Replay(args) => commands::replay::run(&AppContext::load()?, args),
        Commands::Feed(args) => commands::feed::run(&AppContext::load()?, args),
        Commands::Metrics(args) => commands::metrics::run(&AppContext::load()?, args),
        Commands::Inspect(args) => commands::inspect::run(&AppContext::load()?, args),
        Commands::Log(cmd) => commands::log::run(&AppContext::load()?, cmd),
        Commands::Prime(args) => commands::prime::run(&AppContext::load()?, args),
        Commands::Nudge(args) => commands::nudge::run(&AppContext::load()?, args),
    }
}

fn default_project_name() -> String {
    std::env::current_dir()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "overstory-project".to_string())
}
