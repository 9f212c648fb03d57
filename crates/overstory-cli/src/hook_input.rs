//! Parses the JSON object the host's hook layer delivers on standard input.
//! Tool hooks have shape `{tool_name, tool_input, session_id,
//! transcript_path?}`.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use std::io::Read;

#[derive(Debug, Clone, Deserialize)]
pub struct HookInput {
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Value,
    pub session_id: Option<String>,
    pub transcript_path: Option<String>,
}

impl HookInput {
    pub fn read_from_stdin() -> Result<Self> {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read hook input from stdin")?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("failed to parse hook input JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tool_hook_shape() {
        let raw = r#"{"tool_name":"Bash","tool_input":{"command":"ls"},"session_id":"s-1"}"#;
        let parsed = HookInput::parse(raw).unwrap();
        assert_eq!(parsed.tool_name.as_deref(), Some("Bash"));
        assert_eq!(parsed.tool_input["command"], "ls");
        assert_eq!(parsed.session_id.as_deref(), Some("s-1"));
    }

    #[test]
    fn missing_optional_fields_default() {
        let raw = r#"{"session_id":"s-2"}"#;
        let parsed = HookInput::parse(raw).unwrap();
        assert!(parsed.tool_name.is_none());
        assert!(parsed.tool_input.is_null());
    }
}
