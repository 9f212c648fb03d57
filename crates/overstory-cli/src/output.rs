//! Output formatting shared by every verb: each command result knows how
//! to render itself as a human-readable line or two, or as JSON when
//! `--json` is passed.

use serde::Serialize;

pub trait Reportable: Serialize {
    /// Human-readable rendering for an interactive terminal.
    fn to_human(&self) -> String;

    fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn print(&self, json: bool) {
        if json {
            match self.to_json() {
                Ok(s) => println!("{s}"),
                Err(e) => eprintln!("failed to serialize output: {e}"),
            }
        } else {
            println!("{}", self.to_human());
        }
    }
}
