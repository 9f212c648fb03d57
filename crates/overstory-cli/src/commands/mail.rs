//! `overstory mail send|check|list|read|reply|purge`

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use overstory_core::{MailPurgeOptions, MessageQuery, MessageType, NewMessage, Priority};
use serde::Serialize;

use crate::context::AppContext;
use crate::output::Reportable;

#[derive(Debug, Subcommand)]
pub enum MailCommands {
    /// Send a message. `--to` accepts `@all`, `@<capability>`, or a bare agent name.
    Send(SendArgs),
    /// Return unread mail for an agent and mark it read (`--inject` formats
    /// it for pasting into the worker's next prompt).
    Check(CheckArgs),
    /// List messages with optional filters.
    List(ListArgs),
    /// Alias of `list --unread` scoped to a single recipient.
    Read(ReadArgs),
    /// Reply to an existing message, staying on its thread.
    Reply(ReplyArgs),
    /// Delete old or all mail.
    Purge(PurgeArgs),
}

#[derive(Debug, Args)]
pub struct SendArgs {
    #[arg(long)]
    pub to: String,
    #[arg(long)]
    pub from: String,
    #[arg(long)]
    pub subject: String,
    #[arg(long)]
    pub body: String,
    #[arg(long, default_value = "status")]
    pub r#type: String,
    #[arg(long, default_value = "normal")]
    pub priority: String,
    #[arg(long)]
    pub payload: Option<String>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    pub agent: String,
    #[arg(long)]
    pub inject: bool,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long)]
    pub from: Option<String>,
    #[arg(long)]
    pub to: Option<String>,
    #[arg(long)]
    pub unread: bool,
    #[arg(long)]
    pub limit: Option<u32>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ReadArgs {
    pub agent: String,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ReplyArgs {
    #[arg(long)]
    pub message_id: String,
    #[arg(long)]
    pub from: String,
    #[arg(long)]
    pub body: String,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct PurgeArgs {
    #[arg(long)]
    pub all: bool,
    #[arg(long)]
    pub older_than_ms: Option<i64>,
    #[arg(long)]
    pub agent: Option<String>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct MessagesReport {
    messages: Vec<overstory_core::Message>,
}

impl Reportable for MessagesReport {
    fn to_human(&self) -> String {
        if self.messages.is_empty() {
            return "(no messages)".to_string();
        }
        self.messages
            .iter()
            .map(|m| {
                format!(
                    "[{}] {} -> {} ({}): {}",
                    m.id, m.from, m.to, m.message_type.as_str(), m.subject
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Serialize)]
struct InjectReport {
    banner: String,
}

impl Reportable for InjectReport {
    fn to_human(&self) -> String {
        self.banner.clone()
    }
}

#[derive(Serialize)]
struct PurgeReport {
    deleted: u64,
}

impl Reportable for PurgeReport {
    fn to_human(&self) -> String {
        format!("purged {} message(s)", self.deleted)
    }
}

pub fn run(ctx: &AppContext, cmd: MailCommands) -> Result<()> {
    match cmd {
        MailCommands::Send(args) => send(ctx, args),
        MailCommands::Check(args) => check(ctx, args),
        MailCommands::List(args) => list(ctx, args),
        MailCommands::Read(args) => read(ctx, args),
        MailCommands::Reply(args) => reply(ctx, args),
        MailCommands::Purge(args) => purge(ctx, args),
    }
}

fn send(ctx: &AppContext, args: SendArgs) -> Result<()> {
    let message_type: MessageType = args
        .r#type
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))
        .context("invalid --type")?;
    let priority: Priority = args
        .priority
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))
        .context("invalid --priority")?;

    let mut new_msg = NewMessage::new(args.from, args.to, args.subject, args.body, message_type)
        .with_priority(priority);
    if let Some(payload) = args.payload {
        new_msg = new_msg.with_payload(payload);
    }

    let sent = ctx.mail.send(new_msg)?;
    MessagesReport { messages: sent }.print(args.json);
    Ok(())
}

fn check(ctx: &AppContext, args: CheckArgs) -> Result<()> {
    if args.inject {
        let banner = ctx.mail.check_inject(&args.agent)?;
        InjectReport { banner }.print(args.json);
    } else {
        let messages = ctx.mail.check(&args.agent)?;
        MessagesReport { messages }.print(args.json);
    }
    Ok(())
}

fn list(ctx: &AppContext, args: ListArgs) -> Result<()> {
    let query = MessageQuery {
        from: args.from,
        to: args.to,
        unread: if args.unread { Some(true) } else { None },
        limit: args.limit,
    };
    let messages = ctx.mail.list(&query)?;
    MessagesReport { messages }.print(args.json);
    Ok(())
}

fn read(ctx: &AppContext, args: ReadArgs) -> Result<()> {
    let query = MessageQuery {
        from: None,
        to: Some(args.agent),
        unread: Some(true),
        limit: None,
    };
    let messages = ctx.mail.list(&query)?;
    MessagesReport { messages }.print(args.json);
    Ok(())
}

fn reply(ctx: &AppContext, args: ReplyArgs) -> Result<()> {
    let seed = ctx
        .mail_store
        .get_by_id(&args.message_id)?
        .with_context(|| format!("no message with id {}", args.message_id))?;
    let sent = ctx.mail.reply(&seed, &args.from, &args.body)?;
    MessagesReport { messages: sent }.print(args.json);
    Ok(())
}

fn purge(ctx: &AppContext, args: PurgeArgs) -> Result<()> {
    let opts = MailPurgeOptions {
        all: args.all,
        older_than_ms: args.older_than_ms,
        agent: args.agent,
    };
    let deleted = ctx.mail.purge(&opts)?;
    PurgeReport { deleted }.print(args.json);
    Ok(())
}
