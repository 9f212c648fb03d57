//! Data model for the agent manifest: one role definition per agent name,
//! plus the capability index derived from it at load time.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::registry::Capability;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Path to the role prompt, relative to `agent-defs/`.
    pub file: PathBuf,
    /// One of the aliases `{sonnet, opus, haiku}` or a provider-prefixed
    /// string such as `openrouter/some-model`.
    pub model: String,
    pub tools: Vec<String>,
    pub capabilities: Vec<Capability>,
    #[serde(rename = "canSpawn", default)]
    pub can_spawn: bool,
    #[serde(default)]
    pub constraints: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestFile {
    pub version: String,
    pub agents: HashMap<String, AgentDefinition>,
}

/// A loaded, validated manifest with its derived capability index.
#[derive(Debug, Clone)]
pub struct AgentManifest {
    pub version: String,
    pub agents: HashMap<String, AgentDefinition>,
    pub capability_index: HashMap<Capability, Vec<String>>,
}

impl AgentManifest {
    pub fn agents_with_capability(&self, capability: Capability) -> &[String] {
        self.capability_index
            .get(&capability)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}
