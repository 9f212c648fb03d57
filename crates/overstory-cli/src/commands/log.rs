//! `overstory log tool-start|tool-end|session-end` — the hook entrypoint.
//!
//! Invoked by the host's PreToolUse/PostToolUse/Stop hooks (once per tool
//! call, many times per worker). Records events, updates `lastActivity`,
//! and drives the booting->working->completed session transitions.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use overstory_core::{EventType, Level, NewEvent, SessionState};
use serde::Serialize;

use crate::context::AppContext;
use crate::hook_input::HookInput;
use crate::output::Reportable;
use crate::tool_filter::filter_tool_args;

#[derive(Debug, Subcommand)]
pub enum LogCommands {
    /// Record a tool_start event; transitions a booting session to working.
    ToolStart(ToolStartArgs),
    /// Correlate and record a tool_end event with measured duration.
    ToolEnd(ToolEndArgs),
    /// Record session_end; transitions the session to completed unless the
    /// agent is a persistent monitor.
    SessionEnd(SessionEndArgs),
}

#[derive(Debug, Args)]
pub struct ToolStartArgs {
    #[arg(long)]
    pub agent: String,
    #[arg(long = "tool-name")]
    pub tool_name: Option<String>,
    #[arg(long)]
    pub stdin: bool,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ToolEndArgs {
    #[arg(long)]
    pub agent: String,
    #[arg(long = "tool-name")]
    pub tool_name: Option<String>,
    #[arg(long)]
    pub stdin: bool,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct SessionEndArgs {
    #[arg(long)]
    pub agent: String,
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct LogReport {
    recorded: bool,
    event_id: Option<i64>,
    note: Option<String>,
}

impl Reportable for LogReport {
    fn to_human(&self) -> String {
        match &self.note {
            Some(note) => note.clone(),
            None => format!("recorded event {}", self.event_id.unwrap_or(-1)),
        }
    }
}

pub fn run(ctx: &AppContext, cmd: LogCommands) -> Result<()> {
    match cmd {
        LogCommands::ToolStart(args) => tool_start(ctx, args),
        LogCommands::ToolEnd(args) => tool_end(ctx, args),
        LogCommands::SessionEnd(args) => session_end(ctx, args),
    }
}

fn resolve_tool_name(flag: Option<String>, hook: Option<&HookInput>) -> String {
    flag.or_else(|| hook.and_then(|h| h.tool_name.clone()))
        .unwrap_or_else(|| "unknown".to_string())
}

fn tool_start(ctx: &AppContext, args: ToolStartArgs) -> Result<()> {
    let hook = if args.stdin {
        Some(HookInput::read_from_stdin().context("failed to read hook input")?)
    } else {
        None
    };
    let tool_name = resolve_tool_name(args.tool_name, hook.as_ref());
    let tool_input = hook.as_ref().map(|h| h.tool_input.clone()).unwrap_or_default();
    let session_id = hook.as_ref().and_then(|h| h.session_id.clone());

    let filtered = filter_tool_args(&tool_name, &tool_input);
    let args_json = serde_json::to_string(&filtered.args).ok();

    let run_id = ctx.runs.get_active_run()?.map(|r| r.id);
    let event = NewEvent::new(&args.agent, EventType::ToolStart)
        .with_run(run_id)
        .with_session(session_id)
        .with_tool(tool_name, args_json)
        .with_level(Level::Info)
        .with_data(filtered.summary);
    let event_id = ctx.events.insert(event)?;

    // First tool call moves a booting worker into working.
    if let Ok(Some(session)) = ctx.registry.get_by_name(&args.agent) {
        if session.state == SessionState::Booting {
            ctx.registry.update_state(&args.agent, SessionState::Working)?;
        }
    }
    ctx.registry.update_last_activity(&args.agent)?;

    LogReport {
        recorded: true,
        event_id: Some(event_id),
        note: None,
    }
    .print(args.json);
    Ok(())
}

fn tool_end(ctx: &AppContext, args: ToolEndArgs) -> Result<()> {
    let hook = if args.stdin {
        Some(HookInput::read_from_stdin().context("failed to read hook input")?)
    } else {
        None
    };
    let tool_name = resolve_tool_name(args.tool_name, hook.as_ref());
    let tool_input = hook.as_ref().map(|h| h.tool_input.clone()).unwrap_or_default();
    let session_id = hook.as_ref().and_then(|h| h.session_id.clone());

    let filtered = filter_tool_args(&tool_name, &tool_input);
    let args_json = serde_json::to_string(&filtered.args).ok();

    let correlation = ctx.events.correlate_tool_end(&args.agent, &tool_name)?;

    let run_id = ctx.runs.get_active_run()?.map(|r| r.id);
    let event = NewEvent::new(&args.agent, EventType::ToolEnd)
        .with_run(run_id)
        .with_session(session_id)
        .with_tool(tool_name, args_json)
        .with_level(Level::Info)
        .with_data(filtered.summary);
    let event_id = ctx.events.insert(event)?;
    ctx.registry.update_last_activity(&args.agent)?;

    let note = match correlation {
        Some(c) => format!("tool_end recorded (duration {}ms, correlated to start {})", c.duration_ms, c.start_id),
        None => "tool_end recorded (no matching tool_start to correlate)".to_string(),
    };

    LogReport {
        recorded: true,
        event_id: Some(event_id),
        note: Some(note),
    }
    .print(args.json);
    Ok(())
}

fn session_end(ctx: &AppContext, args: SessionEndArgs) -> Result<()> {
    let run_id = ctx.runs.get_active_run()?.map(|r| r.id);
    let event = NewEvent::new(&args.agent, EventType::SessionEnd)
        .with_run(run_id)
        .with_level(Level::Info);
    let event_id = ctx.events.insert(event)?;

    let note = match ctx.registry.get_by_name(&args.agent)? {
        Some(session) if overstory_core::watchdog::is_persistent(session.capability) => {
            "persistent agent: session-end does not transition a monitor to completed".to_string()
        }
        Some(_) => {
            ctx.registry.update_state(&args.agent, SessionState::Completed)?;
            "session marked completed".to_string()
        }
        None => "no registered session for this agent; event recorded only".to_string(),
    };

    LogReport {
        recorded: true,
        event_id: Some(event_id),
        note: Some(note),
    }
    .print(args.json);
    Ok(())
}
