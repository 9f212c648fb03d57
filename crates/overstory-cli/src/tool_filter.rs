//! Dynamic field filtering on tool arguments (design notes §9). This lives
//! outside the event store: the store preserves whatever filtered JSON it's
//! handed, verbatim. A static map from tool name to a pure filtering
//! function is all the dispatch this needs.

use serde_json::Value;

const SUMMARY_MAX_LEN: usize = 80;

/// Result of filtering one tool call's arguments before they're recorded.
pub struct FilteredArgs {
    pub args: Value,
    pub summary: String,
}

fn truncate(s: &str) -> String {
    if s.chars().count() <= SUMMARY_MAX_LEN {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(SUMMARY_MAX_LEN - 1).collect();
        out.push('…');
        out
    }
}

fn string_field<'a>(input: &'a Value, field: &str) -> Option<&'a str> {
    input.get(field).and_then(Value::as_str)
}

fn filter_write_like(input: &Value) -> FilteredArgs {
    let path = string_field(input, "file_path").unwrap_or("?");
    FilteredArgs {
        args: serde_json::json!({ "file_path": path }),
        summary: truncate(path),
    }
}

fn filter_bash(input: &Value) -> FilteredArgs {
    let command = string_field(input, "command").unwrap_or("?");
    FilteredArgs {
        args: serde_json::json!({ "command": command }),
        summary: truncate(command),
    }
}

fn filter_read(input: &Value) -> FilteredArgs {
    let path = string_field(input, "file_path").unwrap_or("?");
    FilteredArgs {
        args: serde_json::json!({ "file_path": path }),
        summary: truncate(path),
    }
}

fn filter_grep(input: &Value) -> FilteredArgs {
    let pattern = string_field(input, "pattern").unwrap_or("?");
    let path = string_field(input, "path");
    let summary = match path {
        Some(path) => format!("{pattern} in {path}"),
        None => pattern.to_string(),
    };
    FilteredArgs {
        args: serde_json::json!({ "pattern": pattern, "path": path }),
        summary: truncate(&summary),
    }
}

fn filter_task(input: &Value) -> FilteredArgs {
    let description = string_field(input, "description").unwrap_or("?");
    FilteredArgs {
        args: serde_json::json!({ "description": description }),
        summary: truncate(description),
    }
}

fn filter_unknown(_input: &Value) -> FilteredArgs {
    FilteredArgs {
        args: serde_json::json!({}),
        summary: "(unrecognized tool)".to_string(),
    }
}

/// Looks up the filter for `tool_name` and applies it to `tool_input`.
/// Unknown tools get empty args and a generic summary, never the raw
/// payload.
pub fn filter_tool_args(tool_name: &str, tool_input: &Value) -> FilteredArgs {
    let filter: fn(&Value) -> FilteredArgs = match tool_name {
        "Write" | "Edit" | "NotebookEdit" => filter_write_like,
        "Bash" => filter_bash,
        "Read" => filter_read,
        "Grep" | "Glob" => filter_grep,
        "Task" => filter_task,
        _ => filter_unknown,
    };
    filter(tool_input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bash_command_is_kept_and_summarized() {
        let input = serde_json::json!({ "command": "git status" });
        let filtered = filter_tool_args("Bash", &input);
        assert_eq!(filtered.summary, "git status");
        assert_eq!(filtered.args["command"], "git status");
    }

    #[test]
    fn unknown_tool_gets_empty_args() {
        let input = serde_json::json!({ "secret": "should not leak" });
        let filtered = filter_tool_args("SomeHostTool", &input);
        assert_eq!(filtered.args, serde_json::json!({}));
        assert_eq!(filtered.summary, "(unrecognized tool)");
    }

    #[test]
    fn summary_truncates_at_80_chars() {
        let long_command = "x".repeat(200);
        let input = serde_json::json!({ "command": long_command });
        let filtered = filter_tool_args("Bash", &input);
        assert_eq!(filtered.summary.chars().count(), 80);
        assert!(filtered.summary.ends_with('…'));
    }
}
