//! Overstory core — the shared state engine behind the multi-agent swarm.
//!
//! This crate owns every durable store and cross-cutting protocol the
//! orchestrator and its workers rely on:
//!
//! - [`registry`]: the live session/run table (who is running, as what
//!   capability, under which run).
//! - [`mail`]: the inter-agent mailbox, including broadcast addressing and
//!   the auto-nudge marker mechanism.
//! - [`merge`]: the serialized merge queue and its four-tier conflict
//!   resolver.
//! - [`events`]: the append-only event log used for replay, metrics, and
//!   tool-call correlation.
//! - [`manifest`]: agent-manifest loading, validation, and model
//!   resolution.
//! - [`guard`]: generates the per-worktree hook guard bundle that fences in
//!   what a spawned agent's tools may touch.
//! - [`watchdog`]: the tiered liveness monitor that reconciles stalled and
//!   zombie sessions.
//! - [`db`]: shared SQLite connection setup (WAL mode, busy timeout).
//! - [`error`]: the error kinds every component above rolls up into.

#![allow(dead_code)]

pub mod db;
pub mod error;
pub mod events;
pub mod guard;
pub mod mail;
pub mod manifest;
pub mod merge;
pub mod registry;
pub mod watchdog;

pub use error::{AgentError, MailError, MergeError, OverstoryError, ValidationError};

pub use events::{EventQuery, EventStore, EventType, Level, NewEvent, PurgeOptions, StoredEvent, ToolStats};

pub use mail::{
    generate_message_id, MailClient, MailClientError, MailPurgeOptions, MailStore, Message,
    MessageQuery, MessageType, NewMessage, NudgeBoard, NudgeMarker, Priority,
};

pub use merge::{
    GitRunner, MergeEntry, MergeOutcome, MergeQueue, MergeResolver, MergeStatus, ResolvedTier,
    ResolverHelper,
};

pub use manifest::{AgentDefinition, AgentManifest, ManifestLoader, ProviderConfig, ProviderType, ResolvedModel};

pub use registry::{AgentSession, Capability, Run, RunStatus, RunStore, SessionRegistry, SessionState};

pub use guard::{GuardBundle, GuardGenerator};

pub use watchdog::{Watchdog, WatchdogConfig, WatchdogEvent, WatchdogTier};
