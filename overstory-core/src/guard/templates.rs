//! String templates for guard script bodies. Each function returns a
//! complete POSIX `sh` script; nothing here executes a shell or touches
//! the filesystem, it only builds the text that goes into a hook's
//! `command` field.

/// Every guard begins with this: read stdin once, then no-op immediately
/// if the invoking process isn't one of ours. A user's own assistant
/// session (no `OVERSTORY_AGENT_NAME` in its environment) is unaffected.
fn preamble() -> &'static str {
    "input=$(cat); agent=\"${OVERSTORY_AGENT_NAME:-}\"; if [ -z \"$agent\" ]; then exit 0; fi"
}

fn block(reason: &str) -> String {
    format!("echo '{{\"decision\":\"block\",\"reason\":\"{reason}\"}}'")
}

/// Extracts the first string value of `field` from the JSON blob bound to
/// `$input`, via a `grep`+`cut` pair (no `jq`).
fn extract_field(var: &str, field: &str) -> String {
    format!(
        "{var}=$(printf '%s' \"$input\" | grep -o '\"{field}\"[[:space:]]*:[[:space:]]*\"[^\"]*\"' | head -n1 | cut -d'\"' -f4)"
    )
}

/// Blocks the host's native sub-agent / team-creation tool so delegation
/// only happens through the Overstory dispatch command.
pub fn team_tool_block() -> String {
    format!(
        "{}; {}",
        preamble(),
        block("sub-agent creation is routed through the overstory dispatch command")
    )
}

/// Path-boundary guard for Write/Edit/notebook-edit tools: the target
/// path must be absolute-or-cwd-relative and descend from
/// `worktree_root`.
pub fn path_boundary_guard(worktree_root: &str) -> String {
    let extract = extract_field("file_path", "file_path");
    format!(
        "{preamble}; {extract}; case \"$file_path\" in /*) : ;; *) file_path=\"$PWD/$file_path\" ;; esac; case \"$file_path\" in {root}|{root}/*) exit 0 ;; *) {block} ;; esac",
        preamble = preamble(),
        extract = extract,
        root = worktree_root,
        block = block("path outside worktree"),
    )
}

/// Non-implementation capabilities get write tools blocked outright, on
/// top of the shared path-boundary guard (defense in depth: the
/// path-boundary guard alone would still let them write anywhere in the
/// allowed scope these capabilities shouldn't have any write scope in).
pub fn outright_write_deny() -> String {
    format!(
        "{}; {}",
        preamble(),
        block("write tools are unavailable for this capability")
    )
}

/// Danger guards on shell commands: canonical-branch pushes,
/// `git reset --hard`, and `checkout -b` with a branch name that doesn't
/// match `overstory/<agentName>/<beadId>`.
pub fn danger_guard(canonical_branch: &str) -> String {
    let extract = extract_field("command", "command");
    format!(
        "{preamble}; {extract}; case \"$command\" in \
*\"push\"*\"{branch}\"*) {push_block} ;; \
*\"reset --hard\"*) {reset_block} ;; \
*\"checkout -b \"*) branch_name=$(printf '%s' \"$command\" | sed -n 's/.*checkout -b  *\\([^ ]*\\).*/\\1/p'); case \"$branch_name\" in overstory/*/*) : ;; *) {checkout_block} ;; esac ;; \
esac",
        preamble = preamble(),
        extract = extract,
        branch = canonical_branch,
        push_block = block("push to canonical branch is blocked"),
        reset_block = block("git reset --hard is blocked"),
        checkout_block = block("checkout -b branch name does not match overstory/<agentName>/<beadId>"),
    )
}

const DANGEROUS_TOKENS: &[&str] = &[
    "sed -i",
    "echo >",
    "mv ",
    "rm ",
    "chmod ",
    "git add",
    "git commit",
    "git push",
    "git merge",
    "git reset",
    "git checkout",
    "git rebase",
    "git stash",
    "npm install",
    "pip install",
    "cargo install",
    "-e ",
];

const ALLOWED_PREFIXES: &[&str] = &[
    "git status",
    "git log",
    "git diff",
    "git show",
    "git branch --list",
    "overstory ",
    "cargo test",
    "cargo check",
    "cargo clippy",
    "npm test",
    "pytest",
];

/// Whitelist-first shell filter for non-implementation capabilities: if
/// the command's prefix matches an allowed read-only pattern, allow;
/// else if any dangerous token appears, block. `extra_whitelist` carries
/// the coordination-capability addition of `git add`/`git commit`.
pub fn whitelist_shell_filter(extra_whitelist: &[&str]) -> String {
    let extract = extract_field("command", "command");
    let mut allowed_cases = String::new();
    for prefix in ALLOWED_PREFIXES.iter().chain(extra_whitelist) {
        allowed_cases.push_str(&format!("\"{prefix}\"*) exit 0 ;; "));
    }
    let mut danger_cases = String::new();
    for token in DANGEROUS_TOKENS {
        if extra_whitelist.contains(token) {
            continue;
        }
        danger_cases.push_str(&format!("*\"{token}\"*) {} ;; ", block("command not permitted for this capability")));
    }
    format!(
        "{preamble}; {extract}; case \"$command\" in {allowed}esac; case \"$command\" in {danger}esac",
        preamble = preamble(),
        extract = extract,
        allowed = allowed_cases,
        danger = danger_cases,
    )
}

/// Shell path-boundary guard for implementation capabilities: every
/// absolute-looking whitespace-separated token in the command must fall
/// under `worktree_root`, excepting `/dev` and `/tmp`.
pub fn shell_path_boundary_guard(worktree_root: &str) -> String {
    let extract = extract_field("command", "command");
    format!(
        "{preamble}; {extract}; for tok in $command; do case \"$tok\" in \
/dev*|/tmp*) : ;; \
{root}|{root}/*) : ;; \
/*) {block}; break ;; \
esac; done",
        preamble = preamble(),
        extract = extract,
        root = worktree_root,
        block = block("shell command references a path outside the worktree"),
    )
}
