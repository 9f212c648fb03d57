//! Project configuration — `.overstory/config.yaml`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use overstory_core::ProviderConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(rename = "manifestPath", default = "default_manifest_path")]
    pub manifest_path: PathBuf,
    #[serde(rename = "baseDir", default = "default_agents_base_dir")]
    pub base_dir: PathBuf,
    #[serde(rename = "maxConcurrent", default = "default_max_concurrent")]
    pub max_concurrent: u32,
    #[serde(rename = "staggerDelayMs", default = "default_stagger_delay_ms")]
    pub stagger_delay_ms: u64,
    #[serde(rename = "maxDepth", default = "default_max_depth")]
    pub max_depth: u32,
}

fn default_manifest_path() -> PathBuf {
    PathBuf::from("agent-manifest.json")
}
fn default_agents_base_dir() -> PathBuf {
    PathBuf::from("agents")
}
fn default_max_concurrent() -> u32 {
    4
}
fn default_stagger_delay_ms() -> u64 {
    1500
}
fn default_max_depth() -> u32 {
    3
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            manifest_path: default_manifest_path(),
            base_dir: default_agents_base_dir(),
            max_concurrent: default_max_concurrent(),
            stagger_delay_ms: default_stagger_delay_ms(),
            max_depth: default_max_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorktreesConfig {
    #[serde(rename = "baseDir", default = "default_worktrees_base_dir")]
    pub base_dir: PathBuf,
}

fn default_worktrees_base_dir() -> PathBuf {
    PathBuf::from("worktrees")
}

impl Default for WorktreesConfig {
    fn default() -> Self {
        Self {
            base_dir: default_worktrees_base_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BeadsConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MulchConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(rename = "primeFormat", default)]
    pub prime_format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(rename = "aiResolveEnabled", default)]
    pub ai_resolve_enabled: bool,
    #[serde(rename = "reimagineEnabled", default)]
    pub reimagine_enabled: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            ai_resolve_enabled: false,
            reimagine_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogConfigFile {
    #[serde(rename = "tier0IntervalMs", default = "default_tier0_interval_ms")]
    pub tier0_interval_ms: u64,
    #[serde(rename = "staleThresholdMs", default = "default_stale_threshold_ms")]
    pub stale_threshold_ms: i64,
    #[serde(rename = "zombieThresholdMs", default = "default_zombie_threshold_ms")]
    pub zombie_threshold_ms: i64,
    #[serde(rename = "tier1Enabled", default)]
    pub tier1_enabled: bool,
}

fn default_tier0_interval_ms() -> u64 {
    30_000
}
fn default_stale_threshold_ms() -> i64 {
    5 * 60_000
}
fn default_zombie_threshold_ms() -> i64 {
    20 * 60_000
}

impl Default for WatchdogConfigFile {
    fn default() -> Self {
        Self {
            tier0_interval_ms: default_tier0_interval_ms(),
            stale_threshold_ms: default_stale_threshold_ms(),
            zombie_threshold_ms: default_zombie_threshold_ms(),
            tier1_enabled: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    #[serde(default)]
    pub verbose: bool,
    #[serde(rename = "redactSecrets", default = "default_true")]
    pub redact_secrets: bool,
}

fn default_true() -> bool {
    true
}

/// The full `.overstory/config.yaml` schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project: String,
    #[serde(rename = "canonicalBranch", default = "default_canonical_branch")]
    pub canonical_branch: String,
    #[serde(default)]
    pub agents: AgentsConfig,
    #[serde(default)]
    pub worktrees: WorktreesConfig,
    #[serde(default)]
    pub beads: BeadsConfig,
    #[serde(default)]
    pub mulch: MulchConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub watchdog: WatchdogConfigFile,
    #[serde(default)]
    pub models: HashMap<String, String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_canonical_branch() -> String {
    "main".to_string()
}

impl ProjectConfig {
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            canonical_branch: default_canonical_branch(),
            agents: AgentsConfig::default(),
            worktrees: WorktreesConfig::default(),
            beads: BeadsConfig::default(),
            mulch: MulchConfig::default(),
            merge: MergeConfig::default(),
            providers: HashMap::new(),
            watchdog: WatchdogConfigFile::default(),
            models: HashMap::new(),
            logging: LoggingConfig::default(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: ProjectConfig = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self).context("failed to serialize config")?;
        std::fs::write(path, yaml)
            .with_context(|| format!("failed to write config at {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let config = ProjectConfig::new("demo");
        config.save(&path).unwrap();

        let loaded = ProjectConfig::load(&path).unwrap();
        assert_eq!(loaded.project, "demo");
        assert_eq!(loaded.canonical_branch, "main");
        assert_eq!(loaded.agents.max_concurrent, 4);
    }

    #[test]
    fn minimal_yaml_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "project: demo\n").unwrap();

        let loaded = ProjectConfig::load(&path).unwrap();
        assert_eq!(loaded.canonical_branch, "main");
        assert!(!loaded.merge.ai_resolve_enabled);
        assert!(loaded.logging.redact_secrets);
    }
}
