//! `overstory feed [--follow] [--agent <n>...] [--run <id>] [--interval <ms>] [--json]`
//!
//! A live tail over the event store: one pass by default, or polls every
//! `--interval` milliseconds printing only newly-appended rows with `--follow`.

use std::thread::sleep;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use overstory_core::{EventQuery, StoredEvent};
use serde::Serialize;

use crate::context::AppContext;
use crate::output::Reportable;

#[derive(Debug, Args)]
pub struct FeedArgs {
    #[arg(long)]
    pub follow: bool,
    #[arg(long = "agent")]
    pub agents: Vec<String>,
    #[arg(long)]
    pub run: Option<String>,
    #[arg(long, default_value_t = 2000)]
    pub interval: u64,
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct FeedLine {
    event: StoredEvent,
}

impl Reportable for FeedLine {
    fn to_human(&self) -> String {
        format!(
            "{} [{}] {} {}{}",
            self.event.created_at.to_rfc3339(),
            self.event.level.as_str(),
            self.event.agent_name,
            self.event.event_type.as_str(),
            self.event
                .data
                .as_ref()
                .map(|d| format!(" — {d}"))
                .unwrap_or_default(),
        )
    }
}

fn fetch(ctx: &AppContext, args: &FeedArgs, since_id: i64) -> Result<Vec<StoredEvent>> {
    let query = EventQuery::default();
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
    events.retain(|e| e.id > since_id);
    Ok(events)
}

pub fn run(ctx: &AppContext, args: FeedArgs) -> Result<()> {
    let mut last_id = 0i64;

    loop {
        let events = fetch(ctx, &args, last_id)?;
        for event in &events {
            last_id = last_id.max(event.id);
            FeedLine { event: event.clone() }.print(args.json);
        }

        if !args.follow {
            break;
        }
        sleep(Duration::from_millis(args.interval));
    }
    Ok(())
}
