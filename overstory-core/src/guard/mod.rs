//! Hook Guard Generator — builds the `PreToolUse` guard bundle deployed
//! into a spawned worker's `.claude/settings.local.json`.
//!
//! Every guard is a POSIX shell one-liner (newlines only where a `case`
//! statement needs them) that reads the hook's `{tool_name, tool_input,
//! session_id}` JSON on stdin and, to block, writes `{"decision":"block",
//! "reason": "..."}` to stdout. Anything else on stdout is taken as
//! allow. Field extraction is `grep`/`cut`/`sed` against the raw JSON
//! line — no `jq`, matching the bundle's own line-oriented extraction
//! requirement (the generator itself, on the Rust side, is free to use
//! `serde_json` to emit the bundle; it's the generated *scripts* that
//! may not depend on a JSON tool being present in the worker's shell).

mod generator;
mod templates;

pub use generator::{GuardBundle, GuardGenerator, HookCommand, HookEntry, HooksSection};
