//! Top-level error kinds
//!
//! Every component exposes its own `thiserror` enum close to where the
//! failure occurs (`MailStoreError`, `MergeResolverError`, ...); this module
//! holds the four kinds the CLI actually matches on at its outer edge.

use std::path::PathBuf;

/// Agent lifecycle, manifest, or identity problem.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("agent not found: {0}")]
    NotFound(String),

    #[error("role prompt file missing for agent {agent}: {path}")]
    FileMissing { agent: String, path: PathBuf },

    #[error("manifest is invalid: {0}")]
    InvalidManifest(String),

    #[error("spawn failed for agent {agent}: {reason}")]
    SpawnFailed { agent: String, reason: String },

    #[error("depth limit exceeded: {depth} > max {max_depth}")]
    DepthExceeded { depth: u32, max_depth: u32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Mail store insert failure, unknown broadcast group, empty broadcast.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("duplicate message id: {0}")]
    DuplicateId(String),

    #[error("unknown broadcast group: {0}")]
    UnknownGroup(String),

    #[error("broadcast resolved to zero recipients: {0}")]
    EmptyBroadcast(String),

    #[error("message not found: {0}")]
    NotFound(String),

    #[error("invalid message type: {0}")]
    InvalidType(String),

    #[error("invalid priority: {0}")]
    InvalidPriority(String),

    #[error("store error: {0}")]
    Store(String),
}

/// Git checkout / merge / abort failure; carries the offending branch.
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("checkout of canonical branch failed for {branch}: {detail}")]
    Checkout { branch: String, detail: String },

    #[error("merge of {branch} failed: {detail}")]
    Merge { branch: String, detail: String },

    #[error("merge abort failed for {branch}: {detail}")]
    Abort { branch: String, detail: String },

    #[error("branch already queued: {0}")]
    AlreadyQueued(String),

    #[error("resolver helper failed: {0}")]
    Resolver(String),

    #[error("git command failed: {0}")]
    Git(String),
}

/// CLI flag or input shape problem; carries the offending field.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(String),

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}

/// Umbrella error the CLI binary matches on at its outermost edge.
#[derive(Debug, thiserror::Error)]
pub enum OverstoryError {
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error(transparent)]
    Merge(#[from] MergeError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Db(String),
}

impl From<rusqlite::Error> for OverstoryError {
    fn from(e: rusqlite::Error) -> Self {
        OverstoryError::Db(e.to_string())
    }
}

impl OverstoryError {
    /// Exit code the CLI binary should use for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            OverstoryError::Validation(_) => 1,
            _ => 2,
        }
    }
}
