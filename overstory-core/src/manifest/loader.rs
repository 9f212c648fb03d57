//! Manifest Loader — reads `agent-manifest.json`, validates every
//! referenced role-prompt file exists, and builds the capability index.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::AgentError;
use crate::registry::Capability;

use super::types::{AgentManifest, ManifestFile};

pub type LoaderResult<T> = Result<T, AgentError>;

pub struct ManifestLoader {
    manifest_path: PathBuf,
    agent_defs_dir: PathBuf,
}

impl ManifestLoader {
    pub fn new(manifest_path: impl Into<PathBuf>, agent_defs_dir: impl Into<PathBuf>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            agent_defs_dir: agent_defs_dir.into(),
        }
    }

    /// Reads the manifest from disk, validates structure, verifies every
    /// referenced role-prompt file exists, and builds the capability index.
    pub fn load(&self) -> LoaderResult<AgentManifest> {
        let raw = std::fs::read_to_string(&self.manifest_path)?;
        let parsed: ManifestFile = serde_json::from_str(&raw)
            .map_err(|e| AgentError::InvalidManifest(e.to_string()))?;

        for (name, def) in &parsed.agents {
            let prompt_path = self.resolve_prompt_path(&def.file);
            if !prompt_path.exists() {
                return Err(AgentError::FileMissing {
                    agent: name.clone(),
                    path: prompt_path,
                });
            }
        }

        let capability_index = build_index(&parsed.agents);

        Ok(AgentManifest {
            version: parsed.version,
            agents: parsed.agents,
            capability_index,
        })
    }

    fn resolve_prompt_path(&self, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            self.agent_defs_dir.join(file)
        }
    }

    /// Re-runs structural checks plus index/agent bidirectional consistency.
    /// Returns the list of problems found instead of failing fast, so a
    /// caller can report everything wrong with a manifest in one pass.
    pub fn validate(&self, manifest: &AgentManifest) -> Vec<String> {
        let mut errors = Vec::new();

        for (name, def) in &manifest.agents {
            let prompt_path = self.resolve_prompt_path(&def.file);
            if !prompt_path.exists() {
                errors.push(format!("agent {name}: role prompt missing at {}", prompt_path.display()));
            }
            for capability in &def.capabilities {
                let listed = manifest
                    .capability_index
                    .get(capability)
                    .map(|names| names.iter().any(|n| n == name))
                    .unwrap_or(false);
                if !listed {
                    errors.push(format!(
                        "agent {name}: declares capability {} but is missing from its index entry",
                        capability.as_str()
                    ));
                }
            }
        }

        for (capability, names) in &manifest.capability_index {
            for name in names {
                match manifest.agents.get(name) {
                    None => errors.push(format!(
                        "capability index lists {name} under {} but no such agent is declared",
                        capability.as_str()
                    )),
                    Some(def) => {
                        if !def.capabilities.contains(capability) {
                            errors.push(format!(
                                "capability index lists {name} under {} but the agent doesn't declare it",
                                capability.as_str()
                            ));
                        }
                    }
                }
            }
        }

        errors
    }
}

fn build_index(
    agents: &HashMap<String, crate::manifest::types::AgentDefinition>,
) -> HashMap<Capability, Vec<String>> {
    let mut index: HashMap<Capability, Vec<String>> = HashMap::new();
    for (name, def) in agents {
        for capability in &def.capabilities {
            index.entry(*capability).or_default().push(name.clone());
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_manifest(dir: &Path, json: &str) -> PathBuf {
        let path = dir.join("agent-manifest.json");
        fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn load_fails_when_role_prompt_missing() {
        let dir = tempdir().unwrap();
        let defs_dir = dir.path().join("agent-defs");
        fs::create_dir_all(&defs_dir).unwrap();

        let manifest_path = write_manifest(
            dir.path(),
            r#"{"version":"1","agents":{"builder-1":{"file":"builder-1.md","model":"sonnet","tools":[],"capabilities":["builder"],"canSpawn":false}}}"#,
        );

        let loader = ManifestLoader::new(manifest_path, defs_dir);
        let err = loader.load().unwrap_err();
        assert!(matches!(err, AgentError::FileMissing { .. }));
    }

    #[test]
    fn load_builds_capability_index() {
        let dir = tempdir().unwrap();
        let defs_dir = dir.path().join("agent-defs");
        fs::create_dir_all(&defs_dir).unwrap();
        fs::write(defs_dir.join("builder-1.md"), "# Builder").unwrap();

        let manifest_path = write_manifest(
            dir.path(),
            r#"{"version":"1","agents":{"builder-1":{"file":"builder-1.md","model":"sonnet","tools":[],"capabilities":["builder"],"canSpawn":false}}}"#,
        );

        let loader = ManifestLoader::new(manifest_path, defs_dir);
        let manifest = loader.load().unwrap();
        assert_eq!(manifest.agents_with_capability(Capability::Builder), &["builder-1".to_string()]);

        let errors = loader.validate(&manifest);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    }
}
