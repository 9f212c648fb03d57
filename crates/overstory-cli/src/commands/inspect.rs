//! `overstory inspect <agent> [--json] [--follow] [--limit <n>] [--no-tmux]`
//!
//! Shows one agent's registry row plus its recent event history, and — unless
//! `--no-tmux` — a snapshot of its terminal-multiplexer pane.

use std::process::Command;
use std::thread::sleep;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use overstory_core::{AgentSession, EventQuery, StoredEvent};
use serde::Serialize;

use crate::context::AppContext;
use crate::output::Reportable;

#[derive(Debug, Args)]
pub struct InspectArgs {
    pub agent: String,
    #[arg(long)]
    pub json: bool,
    #[arg(long)]
    pub follow: bool,
    #[arg(long, default_value_t = 20)]
    pub limit: u32,
    #[arg(long = "no-tmux")]
    pub no_tmux: bool,
}

#[derive(Serialize)]
struct InspectReport {
    session: Option<AgentSession>,
    recent_events: Vec<StoredEvent>,
    pane: Option<String>,
}

impl Reportable for InspectReport {
    fn to_human(&self) -> String {
        let mut out = String::new();
        match &self.session {
            Some(s) => {
                out.push_str(&format!(
                    "{} [{}] capability={} branch={} worktree={} last_activity={}\n",
                    s.agent_name,
                    s.state.as_str(),
                    s.capability.as_str(),
                    s.branch_name,
                    s.worktree_path,
                    s.last_activity.to_rfc3339(),
                ));
            }
            None => out.push_str("(no registered session for this agent)\n"),
        }
        if !self.recent_events.is_empty() {
            out.push_str("--- recent events ---\n");
            for e in &self.recent_events {
                out.push_str(&format!(
                    "{} {} {}\n",
                    e.created_at.to_rfc3339(),
                    e.event_type.as_str(),
                    e.tool_name.as_deref().unwrap_or("")
                ));
            }
        }
        if let Some(pane) = &self.pane {
            out.push_str("--- tmux pane ---\n");
            out.push_str(pane);
        }
        out
    }
}

fn capture_pane(tmux_session: &str) -> Option<String> {
    let output = Command::new("tmux")
        .args(["capture-pane", "-t", tmux_session, "-p"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).to_string())
}

fn snapshot(ctx: &AppContext, args: &InspectArgs) -> Result<InspectReport> {
    let session = ctx.registry.get_by_name(&args.agent)?;
    let query = EventQuery {
        limit: Some(args.limit),
        ..Default::default()
    };
    let mut recent_events = ctx.events.get_by_agent(&args.agent, &query)?;
    recent_events.sort_by_key(|e| e.id);

    let pane = if args.no_tmux {
        None
    } else {
        session.as_ref().and_then(|s| capture_pane(&s.tmux_session))
    };

    Ok(InspectReport {
        session,
        recent_events,
        pane,
    })
}

pub fn run(ctx: &AppContext, args: InspectArgs) -> Result<()> {
    loop {
        let report = snapshot(ctx, &args)?;
        report.print(args.json);

        if !args.follow {
            break;
        }
        sleep(Duration::from_millis(2000));
    }
    Ok(())
}
