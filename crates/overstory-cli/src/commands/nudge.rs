//! `overstory nudge <agent>` — a pure file-based reminder, distinct from a
//! mail send: it writes a nudge marker directly so the recipient's next
//! hook-driven `prime`/`mail check --inject` surfaces it, without going
//! through the mail store at all.

use anyhow::Result;
use clap::Args;
use chrono::Utc;
use overstory_core::{generate_message_id, NudgeMarker};
use serde::Serialize;

use crate::context::AppContext;
use crate::output::Reportable;

#[derive(Debug, Args)]
pub struct NudgeArgs {
    pub agent: String,
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct NudgeReport {
    delivered: bool,
    reason: String,
}

impl Reportable for NudgeReport {
    fn to_human(&self) -> String {
        format!("delivered={} reason={}", self.delivered, self.reason)
    }
}

pub fn run(ctx: &AppContext, args: NudgeArgs) -> Result<()> {
    let report = match ctx.registry.get_by_name(&args.agent)? {
        None => NudgeReport {
            delivered: false,
            reason: format!("no registered session for {}", args.agent),
        },
        Some(session) if !session.state.is_active() => NudgeReport {
            delivered: false,
            reason: format!("{} is not active (state={})", args.agent, session.state.as_str()),
        },
        Some(_) => {
            let marker = NudgeMarker {
                from: "operator".to_string(),
                reason: "manual nudge".to_string(),
                subject: "reminder".to_string(),
                message_id: generate_message_id(),
                created_at: Utc::now(),
            };
            ctx.nudges.write(&args.agent, &marker)?;
            NudgeReport {
                delivered: true,
                reason: "nudge marker written".to_string(),
            }
        }
    };

    report.print(args.json);
    Ok(())
}
