//! `overstory replay [--run <id>] [--agent <n>...] [--since <ts>] [--until <ts>] [--limit <n>] [--json]`
//!
//! Reconstructs a chronological timeline of stored events for post-hoc
//! inspection: the whole run, one or more agents, or everything in range.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use overstory_core::{EventQuery, StoredEvent};
use serde::Serialize;

use crate::context::AppContext;
use crate::output::Reportable;

#[derive(Debug, Args)]
pub struct ReplayArgs {
    #[arg(long)]
    pub run: Option<String>,
    #[arg(long = "agent")]
    pub agents: Vec<String>,
    #[arg(long)]
    pub since: Option<String>,
    #[arg(long)]
    pub until: Option<String>,
    #[arg(long)]
    pub limit: Option<u32>,
    #[arg(long)]
    pub json: bool,
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .with_context(|| format!("invalid timestamp (expected RFC3339): {raw}"))
}

#[derive(Serialize)]
struct TimelineReport {
    events: Vec<StoredEvent>,
}

impl Reportable for TimelineReport {
    fn to_human(&self) -> String {
        if self.events.is_empty() {
            return "(no events)".to_string();
        }
        self.events
            .iter()
            .map(|e| {
                format!(
                    "{} [{}] {} {}{}",
                    e.created_at.to_rfc3339(),
                    e.level.as_str(),
                    e.agent_name,
                    e.event_type.as_str(),
                    e.tool_name
                        .as_ref()
                        .map(|t| format!(" ({t})"))
                        .unwrap_or_default(),
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn run(ctx: &AppContext, args: ReplayArgs) -> Result<()> {
    let query = EventQuery {
        limit: args.limit,
        since: args.since.as_deref().map(parse_ts).transpose()?,
        until: args.until.as_deref().map(parse_ts).transpose()?,
        level: None,
    };

    let mut events = if let Some(run_id) = &args.run {
        ctx.events.get_by_run(run_id, &query)?
    } else if !args.agents.is_empty() {
        let mut collected = Vec::new();
        for agent in &args.agents {
            collected.extend(ctx.events.get_by_agent(agent, &query)?);
        }
        collected.sort_by_key(|e| e.id);
        collected
    } else {
        ctx.events.get_timeline(&query)?
    };

    if !args.agents.is_empty() && args.run.is_some() {
        events.retain(|e| args.agents.iter().any(|a| a == &e.agent_name));
    }

    if let Some(limit) = args.limit {
        events.truncate(limit as usize);
    }

    TimelineReport { events }.print(args.json);
    Ok(())
}
