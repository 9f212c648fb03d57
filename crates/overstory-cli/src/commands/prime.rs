//! `overstory prime [--agent <n>] [--compact]` — emits the context text the
//! `UserPromptSubmit` hook pastes at the top of a worker's next turn:
//! identity, the last checkpoint (unless `--compact`), and the mail digest
//! (nudge banner + unread messages) produced by the same path `mail check
//! --inject` uses.

use anyhow::Result;
use clap::Args;

use crate::context::AppContext;

#[derive(Debug, Args)]
pub struct PrimeArgs {
    #[arg(long)]
    pub agent: Option<String>,
    #[arg(long)]
    pub compact: bool,
}

pub fn run(ctx: &AppContext, args: PrimeArgs) -> Result<()> {
    let Some(agent) = args.agent else {
        return Ok(());
    };

    let mut out = String::new();

    if !args.compact {
        if let Ok(identity) = std::fs::read_to_string(ctx.paths.agent_identity_path(&agent)) {
            out.push_str("## Identity\n");
            out.push_str(&identity);
            out.push('\n');
        }
        if let Ok(checkpoint) = std::fs::read_to_string(ctx.paths.agent_checkpoint_path(&agent)) {
            out.push_str("## Last checkpoint\n");
            out.push_str(&checkpoint);
            out.push('\n');
        }
    }

    let digest = ctx.mail.check_inject(&agent)?;
    if !digest.is_empty() {
        out.push_str("## Mail\n");
        out.push_str(&digest);
    }

    print!("{out}");
    Ok(())
}
