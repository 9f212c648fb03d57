//! Data model for the merge queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStatus {
    Pending,
    Merging,
    Merged,
    Conflict,
    Failed,
}

impl MergeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MergeStatus::Pending => "pending",
            MergeStatus::Merging => "merging",
            MergeStatus::Merged => "merged",
            MergeStatus::Conflict => "conflict",
            MergeStatus::Failed => "failed",
        }
    }

    /// Conflict and failed are terminal for the entry.
    pub fn is_terminal(self) -> bool {
        matches!(self, MergeStatus::Conflict | MergeStatus::Failed)
    }
}

impl std::str::FromStr for MergeStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => MergeStatus::Pending,
            "merging" => MergeStatus::Merging,
            "merged" => MergeStatus::Merged,
            "conflict" => MergeStatus::Conflict,
            "failed" => MergeStatus::Failed,
            other => return Err(format!("unknown merge status: {other}")),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolvedTier {
    CleanMerge,
    AutoResolve,
    AiResolve,
    Reimagine,
}

impl ResolvedTier {
    pub fn as_str(self) -> &'static str {
        match self {
            ResolvedTier::CleanMerge => "clean-merge",
            ResolvedTier::AutoResolve => "auto-resolve",
            ResolvedTier::AiResolve => "ai-resolve",
            ResolvedTier::Reimagine => "reimagine",
        }
    }
}

impl std::str::FromStr for ResolvedTier {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "clean-merge" => ResolvedTier::CleanMerge,
            "auto-resolve" => ResolvedTier::AutoResolve,
            "ai-resolve" => ResolvedTier::AiResolve,
            "reimagine" => ResolvedTier::Reimagine,
            other => return Err(format!("unknown resolved tier: {other}")),
        })
    }
}

/// One row in the merge queue. At most one non-terminal entry exists per
/// `branch_name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeEntry {
    pub branch_name: String,
    pub bead_id: String,
    pub agent_name: String,
    pub files_modified: Vec<String>,
    pub enqueued_at: DateTime<Utc>,
    pub status: MergeStatus,
    pub resolved_tier: Option<ResolvedTier>,
}

impl MergeEntry {
    pub fn new(
        branch_name: impl Into<String>,
        bead_id: impl Into<String>,
        agent_name: impl Into<String>,
        files_modified: Vec<String>,
    ) -> Self {
        Self {
            branch_name: branch_name.into(),
            bead_id: bead_id.into(),
            agent_name: agent_name.into(),
            files_modified,
            enqueued_at: Utc::now(),
            status: MergeStatus::Pending,
            resolved_tier: None,
        }
    }
}

/// Outcome of a resolver pass over one `MergeEntry`.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub tier: ResolvedTier,
    pub success: bool,
    pub error_message: Option<String>,
}
