//! Model resolution: config override > manifest default > fallback, with
//! provider-prefixed strings routed through the configured provider table.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::types::AgentManifest;

const ALIASES: &[&str] = &["sonnet", "opus", "haiku"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Native,
    Gateway,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    #[serde(rename = "baseUrl", default)]
    pub base_url: Option<String>,
    #[serde(rename = "authTokenEnv", default)]
    pub auth_token_env: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ResolvedModel {
    pub model: String,
    pub env: Option<HashMap<String, String>>,
}

/// `config.models` overrides, keyed by role/agent name.
pub type ModelOverrides = HashMap<String, String>;

pub fn resolve_model(
    overrides: &ModelOverrides,
    manifest: &AgentManifest,
    role: &str,
    fallback: &str,
    providers: &HashMap<String, ProviderConfig>,
    process_env: &HashMap<String, String>,
) -> ResolvedModel {
    let raw = overrides
        .get(role)
        .cloned()
        .or_else(|| manifest.agents.get(role).map(|def| def.model.clone()))
        .unwrap_or_else(|| fallback.to_string());

    if ALIASES.contains(&raw.as_str()) {
        return ResolvedModel {
            model: raw,
            env: None,
        };
    }

    let Some((head, tail)) = raw.split_once('/') else {
        return ResolvedModel {
            model: raw,
            env: None,
        };
    };

    match providers.get(head) {
        Some(provider) => match provider.provider_type {
            ProviderType::Gateway => match &provider.base_url {
                Some(base_url) => {
                    let mut env = HashMap::new();
                    env.insert("BASE_URL".to_string(), base_url.clone());
                    env.insert("API_KEY".to_string(), String::new());
                    env.insert("DEFAULT_SONNET_MODEL".to_string(), tail.to_string());
                    if let Some(auth_env_name) = &provider.auth_token_env {
                        if let Some(token) = process_env.get(auth_env_name) {
                            env.insert("AUTH_TOKEN".to_string(), token.clone());
                        }
                    }
                    ResolvedModel {
                        model: "sonnet".to_string(),
                        env: Some(env),
                    }
                }
                None => {
                    tracing::warn!(provider = head, "gateway provider has no baseUrl configured, emitting model string as-is");
                    ResolvedModel {
                        model: raw.clone(),
                        env: None,
                    }
                }
            },
            ProviderType::Native => ResolvedModel {
                model: raw.clone(),
                env: None,
            },
        },
        None => ResolvedModel {
            model: raw.clone(),
            env: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::types::AgentManifest;
    use std::collections::HashMap;

    fn empty_manifest() -> AgentManifest {
        AgentManifest {
            version: "1".to_string(),
            agents: HashMap::new(),
            capability_index: HashMap::new(),
        }
    }

    #[test]
    fn alias_passes_through_with_no_env() {
        let resolved = resolve_model(
            &HashMap::new(),
            &empty_manifest(),
            "builder-1",
            "sonnet",
            &HashMap::new(),
            &HashMap::new(),
        );
        assert_eq!(resolved.model, "sonnet");
        assert!(resolved.env.is_none());
    }

    #[test]
    fn config_override_wins_over_fallback() {
        let mut overrides = HashMap::new();
        overrides.insert("builder-1".to_string(), "opus".to_string());
        let resolved = resolve_model(
            &overrides,
            &empty_manifest(),
            "builder-1",
            "haiku",
            &HashMap::new(),
            &HashMap::new(),
        );
        assert_eq!(resolved.model, "opus");
    }

    #[test]
    fn gateway_provider_builds_env() {
        let mut providers = HashMap::new();
        providers.insert(
            "openrouter".to_string(),
            ProviderConfig {
                provider_type: ProviderType::Gateway,
                base_url: Some("https://openrouter.ai/api".to_string()),
                auth_token_env: Some("OPENROUTER_KEY".to_string()),
            },
        );
        let mut process_env = HashMap::new();
        process_env.insert("OPENROUTER_KEY".to_string(), "secret-token".to_string());

        let mut overrides = HashMap::new();
        overrides.insert("builder-1".to_string(), "openrouter/some-model".to_string());

        let resolved = resolve_model(
            &overrides,
            &empty_manifest(),
            "builder-1",
            "sonnet",
            &providers,
            &process_env,
        );

        assert_eq!(resolved.model, "sonnet");
        let env = resolved.env.unwrap();
        assert_eq!(env.get("DEFAULT_SONNET_MODEL").unwrap(), "some-model");
        assert_eq!(env.get("BASE_URL").unwrap(), "https://openrouter.ai/api");
        assert_eq!(env.get("AUTH_TOKEN").unwrap(), "secret-token");
    }

    #[test]
    fn gateway_provider_without_base_url_emits_raw_string() {
        let mut providers = HashMap::new();
        providers.insert(
            "openrouter".to_string(),
            ProviderConfig {
                provider_type: ProviderType::Gateway,
                base_url: None,
                auth_token_env: None,
            },
        );
        let mut overrides = HashMap::new();
        overrides.insert("builder-1".to_string(), "openrouter/some-model".to_string());

        let resolved = resolve_model(
            &overrides,
            &empty_manifest(),
            "builder-1",
            "sonnet",
            &providers,
            &HashMap::new(),
        );

        assert_eq!(resolved.model, "openrouter/some-model");
        assert!(resolved.env.is_none());
    }

    #[test]
    fn unknown_provider_passes_raw_string_through() {
        let mut overrides = HashMap::new();
        overrides.insert("builder-1".to_string(), "unknownprovider/model-x".to_string());
        let resolved = resolve_model(
            &overrides,
            &empty_manifest(),
            "builder-1",
            "sonnet",
            &HashMap::new(),
            &HashMap::new(),
        );
        assert_eq!(resolved.model, "unknownprovider/model-x");
        assert!(resolved.env.is_none());
    }
}
