//! Conflict-marker parsing shared by the auto-resolve and reimagine tiers.

use regex::Regex;
use std::sync::OnceLock;

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<<<<<<<[^\n]*\n(?P<ours>.*?)\n=======\n(?P<theirs>.*?)\n>>>>>>>[^\n]*")
            .expect("conflict marker regex is valid")
    })
}

/// Replace every conflict-marker block in `content` with the incoming
/// (branch-side, i.e. "theirs") text. Returns `None` if no marker blocks
/// were found.
pub fn keep_incoming(content: &str) -> Option<String> {
    let re = marker_regex();
    if !re.is_match(content) {
        return None;
    }
    Some(re.replace_all(content, "$theirs").into_owned())
}

/// Conversational-prose rejection heuristics applied to AI-resolver output:
/// reject empty output, markdown fences, and text that opens with a
/// conversational preamble instead of raw file content.
pub fn looks_like_conversational_prose(output: &str) -> bool {
    let trimmed = output.trim_start();
    if trimmed.is_empty() {
        return true;
    }
    if trimmed.starts_with("```") {
        return true;
    }

    const PREAMBLES: &[&str] = &[
        "I ", "Here ", "Here's", "The", "This", "Let me", "Sure", "Unfortunately", "Apologies",
        "Sorry",
    ];
    PREAMBLES.iter().any(|p| trimmed.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_incoming_replaces_block_with_theirs() {
        let content = "line1\n<<<<<<< HEAD\nours text\n=======\ntheirs text\n>>>>>>> feature\nline2";
        let resolved = keep_incoming(content).unwrap();
        assert_eq!(resolved, "line1\ntheirs text\nline2");
    }

    #[test]
    fn keep_incoming_handles_multiple_blocks() {
        let content = "<<<<<<< HEAD\na\n=======\nb\n>>>>>>> f\nmid\n<<<<<<< HEAD\nc\n=======\nd\n>>>>>>> f";
        let resolved = keep_incoming(content).unwrap();
        assert_eq!(resolved, "b\nmid\nd");
    }

    #[test]
    fn keep_incoming_none_without_markers() {
        assert!(keep_incoming("no conflicts here").is_none());
    }

    #[test]
    fn rejects_conversational_openers() {
        assert!(looks_like_conversational_prose("Here's the resolved file:\nfoo"));
        assert!(looks_like_conversational_prose("I'll resolve this for you"));
        assert!(looks_like_conversational_prose(""));
        assert!(looks_like_conversational_prose("```rust\nfn main() {}\n```"));
    }

    #[test]
    fn accepts_raw_content() {
        assert!(!looks_like_conversational_prose("fn main() {\n    println!(\"hi\");\n}"));
    }
}
