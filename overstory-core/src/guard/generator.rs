//! Assembles the capability-specific guard bundle.

use serde::Serialize;

use super::templates;
use crate::registry::Capability;

#[derive(Debug, Clone, Serialize)]
pub struct HookCommand {
    #[serde(rename = "type")]
    pub kind: String,
    pub command: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HookEntry {
    pub matcher: String,
    pub hooks: Vec<HookCommand>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HooksSection {
    #[serde(rename = "PreToolUse")]
    pub pre_tool_use: Vec<HookEntry>,
}

/// The deployable guard bundle; serializes to the `hooks.json` shape
/// written into `<worktree>/.claude/settings.local.json`.
#[derive(Debug, Clone, Serialize)]
pub struct GuardBundle {
    pub hooks: HooksSection,
}

impl GuardBundle {
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn entry(matcher: &str, command: String) -> HookEntry {
    HookEntry {
        matcher: matcher.to_string(),
        hooks: vec![HookCommand {
            kind: "command".to_string(),
            command,
        }],
    }
}

pub struct GuardGenerator;

impl GuardGenerator {
    /// Builds the full bundle for one worker. `canonical_branch` is the
    /// project's trunk (e.g. `main`), needed by the danger guard's push
    /// check.
    pub fn generate(capability: Capability, worktree_root: &str, canonical_branch: &str) -> GuardBundle {
        let mut entries = vec![
            entry("Task", templates::team_tool_block()),
            entry(
                "Write|Edit|NotebookEdit",
                templates::path_boundary_guard(worktree_root),
            ),
            entry("Bash", templates::danger_guard(canonical_branch)),
        ];

        if capability.is_implementation() {
            entries.push(entry("Bash", templates::shell_path_boundary_guard(worktree_root)));
        } else {
            entries.push(entry(
                "Write|Edit|NotebookEdit",
                templates::outright_write_deny(),
            ));
            let extra: &[&str] = if capability.is_coordination() {
                &["git add", "git commit"]
            } else {
                &[]
            };
            entries.push(entry("Bash", templates::whitelist_shell_filter(extra)));
        }

        GuardBundle {
            hooks: HooksSection { pre_tool_use: entries },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_tool_block_is_env_gated() {
        let script = templates::team_tool_block();
        assert!(script.starts_with("input=$(cat); agent="));
        assert!(script.contains("sub-agent creation is routed through the overstory dispatch command"));
    }

    #[test]
    fn path_boundary_guard_allows_descendant_and_blocks_sibling() {
        let script = templates::path_boundary_guard("/w");
        assert_eq!(
            script,
            "input=$(cat); agent=\"${OVERSTORY_AGENT_NAME:-}\"; if [ -z \"$agent\" ]; then exit 0; fi; \
file_path=$(printf '%s' \"$input\" | grep -o '\"file_path\"[[:space:]]*:[[:space:]]*\"[^\"]*\"' | head -n1 | cut -d'\"' -f4); \
case \"$file_path\" in /*) : ;; *) file_path=\"$PWD/$file_path\" ;; esac; \
case \"$file_path\" in /w|/w/*) exit 0 ;; *) echo '{\"decision\":\"block\",\"reason\":\"path outside worktree\"}' ;; esac"
        );
    }

    #[test]
    fn danger_guard_rejects_bad_checkout_branch_name() {
        let script = templates::danger_guard("main");
        assert!(script.contains("*\"push\"*\"main\"*)"));
        assert!(script.contains("overstory/*/*) : ;;"));
        assert!(script.contains("does not match overstory/<agentName>/<beadId>"));
    }

    #[test]
    fn non_implementation_bundle_blocks_write_and_filters_shell() {
        let bundle = GuardGenerator::generate(Capability::Scout, "/w/scout-1", "main");
        let matchers: Vec<&str> = bundle.hooks.pre_tool_use.iter().map(|e| e.matcher.as_str()).collect();
        assert!(matchers.contains(&"Write|Edit|NotebookEdit"));
        assert_eq!(matchers.iter().filter(|m| **m == "Write|Edit|NotebookEdit").count(), 2);

        let shell_filter = bundle
            .hooks
            .pre_tool_use
            .iter()
            .find(|e| e.matcher == "Bash" && e.hooks[0].command.contains("command not permitted"))
            .expect("whitelist filter present");
        assert!(shell_filter.hooks[0].command.contains("\"git status\"*) exit 0 ;;"));
        assert!(!shell_filter.hooks[0].command.contains("\"git add\"*) exit 0 ;;"));
    }

    #[test]
    fn coordination_capability_whitelists_add_and_commit() {
        let bundle = GuardGenerator::generate(Capability::Lead, "/w/lead-1", "main");
        let shell_filter = bundle
            .hooks
            .pre_tool_use
            .iter()
            .find(|e| e.matcher == "Bash" && e.hooks[0].command.contains("command not permitted"))
            .unwrap();
        assert!(shell_filter.hooks[0].command.contains("\"git add\"*) exit 0 ;;"));
        assert!(shell_filter.hooks[0].command.contains("\"git commit\"*) exit 0 ;;"));
    }

    #[test]
    fn implementation_capability_gets_shell_path_boundary_instead_of_whitelist() {
        let bundle = GuardGenerator::generate(Capability::Builder, "/w/builder-1", "main");
        let matchers: Vec<&str> = bundle.hooks.pre_tool_use.iter().map(|e| e.matcher.as_str()).collect();
        assert_eq!(matchers.iter().filter(|m| **m == "Write|Edit|NotebookEdit").count(), 1);
        assert!(bundle
            .hooks
            .pre_tool_use
            .iter()
            .any(|e| e.hooks[0].command.contains("references a path outside the worktree")));
    }

    #[test]
    fn bundle_serializes_to_pre_tool_use_shape() {
        let bundle = GuardGenerator::generate(Capability::Builder, "/w/builder-1", "main");
        let json = bundle.to_json_string().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["hooks"]["PreToolUse"].is_array());
        assert_eq!(value["hooks"]["PreToolUse"][0]["hooks"][0]["type"], "command");
    }
}
