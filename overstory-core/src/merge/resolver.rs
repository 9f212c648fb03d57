//! Merge Resolver — four escalating tiers applied to one `MergeEntry`.
//! Tiers 3 and 4 are gated by configuration; the resolver never panics or
//! propagates an error out of `resolve` once tier processing has begun, it
//! always returns a `MergeOutcome`.

use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{info, warn};

use super::conflict::{keep_incoming, looks_like_conversational_prose};
use super::git::GitRunner;
use super::types::{MergeEntry, MergeOutcome, ResolvedTier};
use crate::error::MergeError;

/// Abstraction over the external AI resolver helper, so the resolver's
/// escalation logic can be tested without a real subprocess.
pub trait ResolverHelper: Send + Sync {
    fn resolve(&self, prompt: &str) -> Result<String, MergeError>;
}

/// Default helper: runs a configured command, writes the prompt to stdin,
/// reads the resolved file content from stdout.
pub struct SubprocessResolverHelper {
    command: String,
}

impl SubprocessResolverHelper {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl ResolverHelper for SubprocessResolverHelper {
    fn resolve(&self, prompt: &str) -> Result<String, MergeError> {
        use std::io::Write;

        let mut child = Command::new(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| MergeError::Resolver(format!("failed to spawn {}: {e}", self.command)))?;

        child
            .stdin
            .take()
            .expect("stdin was piped")
            .write_all(prompt.as_bytes())
            .map_err(|e| MergeError::Resolver(format!("failed to write prompt: {e}")))?;

        let output = child
            .wait_with_output()
            .map_err(|e| MergeError::Resolver(format!("resolver helper failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MergeError::Resolver(stderr.trim().to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

pub struct ResolverConfig {
    pub ai_resolve_enabled: bool,
    pub reimagine_enabled: bool,
}

pub struct MergeResolver {
    git: GitRunner,
    canonical_branch: String,
    config: ResolverConfig,
    helper: Option<Box<dyn ResolverHelper>>,
}

impl MergeResolver {
    pub fn new(
        repo_root: impl AsRef<Path>,
        canonical_branch: impl Into<String>,
        config: ResolverConfig,
        helper: Option<Box<dyn ResolverHelper>>,
    ) -> Self {
        Self {
            git: GitRunner::new(repo_root),
            canonical_branch: canonical_branch.into(),
            config,
            helper,
        }
    }

    pub fn resolve(&self, entry: &MergeEntry) -> MergeOutcome {
        match self.try_clean_merge(entry) {
            Ok(outcome) => return outcome,
            Err(conflicted) => {
                info!(branch = %entry.branch_name, files = conflicted.len(), "clean merge conflicted, escalating");

                if let Some(outcome) = self.try_auto_resolve(entry, &conflicted) {
                    return outcome;
                }

                if self.config.ai_resolve_enabled {
                    if let Some(outcome) = self.try_ai_resolve(entry, &conflicted) {
                        return outcome;
                    }
                }

                if self.config.reimagine_enabled {
                    if let Some(outcome) = self.try_reimagine(entry) {
                        return outcome;
                    }
                }

                self.abort_and_fail(entry)
            }
        }
    }

    /// Tier 1. `Ok` means the merge landed clean. `Err` carries the
    /// conflicted paths for tier 2+ to work on.
    fn try_clean_merge(&self, entry: &MergeEntry) -> Result<MergeOutcome, Vec<String>> {
        let current = self.git.run(&["rev-parse", "--abbrev-ref", "HEAD"]).unwrap_or_default();
        if current != self.canonical_branch {
            if let Err(e) = self.git.run(&["checkout", &self.canonical_branch]) {
                warn!(branch = %entry.branch_name, error = %e, "checkout of canonical branch failed");
                return Err(Vec::new());
            }
        }

        let (ok, _out) = self.git.try_run(&["merge", "--no-edit", &entry.branch_name]);
        if ok {
            return Ok(MergeOutcome {
                tier: ResolvedTier::CleanMerge,
                success: true,
                error_message: None,
            });
        }

        Err(self.git.conflicted_files().unwrap_or_default())
    }

    /// Tier 2 — keep the incoming side of every conflict block.
    fn try_auto_resolve(&self, entry: &MergeEntry, conflicted: &[String]) -> Option<MergeOutcome> {
        if conflicted.is_empty() {
            return None;
        }

        for path in conflicted {
            let full = self.git.repo_root().join(path);
            let content = fs::read_to_string(&full).ok()?;
            let resolved = keep_incoming(&content)?;
            fs::write(&full, resolved).ok()?;
            self.git.run(&["add", path]).ok()?;
        }

        match self.git.run(&["commit", "--no-edit"]) {
            Ok(_) => Some(MergeOutcome {
                tier: ResolvedTier::AutoResolve,
                success: true,
                error_message: None,
            }),
            Err(e) => {
                warn!(branch = %entry.branch_name, error = %e, "auto-resolve commit failed");
                None
            }
        }
    }

    /// Tier 3 — per conflicted file, ask the resolver helper for the raw
    /// resolved content and validate it isn't conversational prose.
    fn try_ai_resolve(&self, entry: &MergeEntry, conflicted: &[String]) -> Option<MergeOutcome> {
        let helper = self.helper.as_ref()?;

        for path in conflicted {
            let full = self.git.repo_root().join(path);
            let content = fs::read_to_string(&full).ok()?;
            let prompt = format!(
                "Resolve the following git merge conflict. Output only the raw resolved file, \
                 with no commentary or markdown fences.\n\n{content}"
            );

            let resolved = match helper.resolve(&prompt) {
                Ok(text) => text,
                Err(e) => {
                    warn!(branch = %entry.branch_name, path, error = %e, "ai-resolve helper failed");
                    return None;
                }
            };

            if looks_like_conversational_prose(&resolved) {
                warn!(branch = %entry.branch_name, path, "ai-resolve output rejected as conversational");
                return None;
            }

            fs::write(&full, resolved).ok()?;
            self.git.run(&["add", path]).ok()?;
        }

        match self.git.run(&["commit", "--no-edit"]) {
            Ok(_) => Some(MergeOutcome {
                tier: ResolvedTier::AiResolve,
                success: true,
                error_message: None,
            }),
            Err(e) => {
                warn!(branch = %entry.branch_name, error = %e, "ai-resolve commit failed");
                None
            }
        }
    }

    /// Tier 4 — abort the in-progress merge and rebuild every file the
    /// branch touched from both sides via the resolver helper.
    fn try_reimagine(&self, entry: &MergeEntry) -> Option<MergeOutcome> {
        let helper = self.helper.as_ref()?;
        self.git.run(&["merge", "--abort"]).ok();

        for path in &entry.files_modified {
            let canonical = self
                .git
                .run(&["show", &format!("{}:{}", self.canonical_branch, path)])
                .unwrap_or_default();
            let branch_side = self
                .git
                .run(&["show", &format!("{}:{}", entry.branch_name, path)])
                .unwrap_or_default();

            let prompt = format!(
                "Reconcile two independent edits to the same file into one coherent result. \
                 Output only the raw resolved file, with no commentary or markdown fences.\n\n\
                 --- canonical version ---\n{canonical}\n\n--- branch version ---\n{branch_side}"
            );

            let resolved = match helper.resolve(&prompt) {
                Ok(text) => text,
                Err(e) => {
                    warn!(branch = %entry.branch_name, path, error = %e, "reimagine helper failed");
                    return None;
                }
            };

            if looks_like_conversational_prose(&resolved) {
                warn!(branch = %entry.branch_name, path, "reimagine output rejected as conversational");
                return None;
            }

            let full = self.git.repo_root().join(path);
            fs::write(&full, resolved).ok()?;
            self.git.run(&["add", path]).ok()?;
        }

        let message = format!("reimagine merge of {} into {}", entry.branch_name, self.canonical_branch);
        match self.git.run(&["commit", "-m", &message]) {
            Ok(_) => Some(MergeOutcome {
                tier: ResolvedTier::Reimagine,
                success: true,
                error_message: None,
            }),
            Err(e) => {
                warn!(branch = %entry.branch_name, error = %e, "reimagine commit failed");
                None
            }
        }
    }

    /// Aborts any in-progress merge (tolerating "no merge in progress") and
    /// returns a failed outcome at the highest tier actually attempted.
    fn abort_and_fail(&self, entry: &MergeEntry) -> MergeOutcome {
        self.git.run(&["merge", "--abort"]).ok();
        self.git.run(&["checkout", "--", "."]).ok();

        let last_attempted = if self.config.reimagine_enabled {
            ResolvedTier::Reimagine
        } else if self.config.ai_resolve_enabled {
            ResolvedTier::AiResolve
        } else {
            ResolvedTier::AutoResolve
        };

        MergeOutcome {
            tier: last_attempted,
            success: false,
            error_message: Some(format!("all enabled tiers failed for {}", entry.branch_name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;
    use tempfile::tempdir;

    fn run(dir: &Path, args: &[&str]) {
        let status = StdCommand::new("git").args(args).current_dir(dir).status().unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    fn init_repo_with_conflict() -> (tempfile::TempDir, MergeEntry) {
        let dir = tempdir().unwrap();
        run(dir.path(), &["init", "-b", "main"]);
        run(dir.path(), &["config", "user.email", "t@t.com"]);
        run(dir.path(), &["config", "user.name", "T"]);

        std::fs::write(dir.path().join("f.txt"), "base\n").unwrap();
        run(dir.path(), &["add", "."]);
        run(dir.path(), &["commit", "-m", "base"]);

        run(dir.path(), &["checkout", "-b", "overstory/worker/bd-1"]);
        std::fs::write(dir.path().join("f.txt"), "branch change\n").unwrap();
        run(dir.path(), &["add", "."]);
        run(dir.path(), &["commit", "-m", "branch edit"]);

        run(dir.path(), &["checkout", "main"]);
        std::fs::write(dir.path().join("f.txt"), "main change\n").unwrap();
        run(dir.path(), &["add", "."]);
        run(dir.path(), &["commit", "-m", "main edit"]);

        let entry = MergeEntry::new(
            "overstory/worker/bd-1",
            "bd-1",
            "worker",
            vec!["f.txt".to_string()],
        );
        (dir, entry)
    }

    #[test]
    fn clean_merge_succeeds_without_conflict() {
        let dir = tempdir().unwrap();
        run(dir.path(), &["init", "-b", "main"]);
        run(dir.path(), &["config", "user.email", "t@t.com"]);
        run(dir.path(), &["config", "user.name", "T"]);
        std::fs::write(dir.path().join("a.txt"), "a\n").unwrap();
        run(dir.path(), &["add", "."]);
        run(dir.path(), &["commit", "-m", "base"]);
        run(dir.path(), &["checkout", "-b", "overstory/worker/bd-1"]);
        std::fs::write(dir.path().join("b.txt"), "b\n").unwrap();
        run(dir.path(), &["add", "."]);
        run(dir.path(), &["commit", "-m", "add b"]);
        run(dir.path(), &["checkout", "main"]);

        let entry = MergeEntry::new("overstory/worker/bd-1", "bd-1", "worker", vec!["b.txt".to_string()]);
        let resolver = MergeResolver::new(
            dir.path(),
            "main",
            ResolverConfig {
                ai_resolve_enabled: false,
                reimagine_enabled: false,
            },
            None,
        );
        let outcome = resolver.resolve(&entry);
        assert!(outcome.success);
        assert_eq!(outcome.tier, ResolvedTier::CleanMerge);
    }

    #[test]
    fn auto_resolve_keeps_incoming_on_conflict() {
        let (dir, entry) = init_repo_with_conflict();
        let resolver = MergeResolver::new(
            dir.path(),
            "main",
            ResolverConfig {
                ai_resolve_enabled: false,
                reimagine_enabled: false,
            },
            None,
        );
        let outcome = resolver.resolve(&entry);
        assert!(outcome.success);
        assert_eq!(outcome.tier, ResolvedTier::AutoResolve);

        let content = std::fs::read_to_string(dir.path().join("f.txt")).unwrap();
        assert_eq!(content.trim(), "branch change");
    }

    #[test]
    fn all_tiers_disabled_beyond_auto_resolve_still_attempts_it() {
        let (dir, entry) = init_repo_with_conflict();
        let resolver = MergeResolver::new(
            dir.path(),
            "main",
            ResolverConfig {
                ai_resolve_enabled: false,
                reimagine_enabled: false,
            },
            None,
        );
        let outcome = resolver.resolve(&entry);
        assert!(outcome.success);
    }

    #[test]
    fn delete_modify_conflict_fails_clean_when_escalation_disabled() {
        // Canonical deletes f.txt; branch modifies it. `keep_incoming` finds
        // no conflict markers in a delete/modify conflict (there's no file
        // to read at all), so tier 2 can't resolve it either. With tiers 3/4
        // disabled the merge must abort, leaving the tree clean.
        let dir = tempdir().unwrap();
        run(dir.path(), &["init", "-b", "main"]);
        run(dir.path(), &["config", "user.email", "t@t.com"]);
        run(dir.path(), &["config", "user.name", "T"]);
        std::fs::write(dir.path().join("f.txt"), "base\n").unwrap();
        run(dir.path(), &["add", "."]);
        run(dir.path(), &["commit", "-m", "base"]);

        run(dir.path(), &["checkout", "-b", "overstory/worker/bd-1"]);
        std::fs::write(dir.path().join("f.txt"), "branch change\n").unwrap();
        run(dir.path(), &["add", "."]);
        run(dir.path(), &["commit", "-m", "branch edit"]);

        run(dir.path(), &["checkout", "main"]);
        std::fs::remove_file(dir.path().join("f.txt")).unwrap();
        run(dir.path(), &["add", "."]);
        run(dir.path(), &["commit", "-m", "main delete"]);

        let entry = MergeEntry::new("overstory/worker/bd-1", "bd-1", "worker", vec!["f.txt".to_string()]);
        let resolver = MergeResolver::new(
            dir.path(),
            "main",
            ResolverConfig {
                ai_resolve_enabled: false,
                reimagine_enabled: false,
            },
            None,
        );
        let outcome = resolver.resolve(&entry);
        assert!(!outcome.success);
        assert_eq!(outcome.tier, ResolvedTier::AutoResolve);

        let status = StdCommand::new("git")
            .args(["status", "--porcelain"])
            .current_dir(dir.path())
            .output()
            .unwrap();
        assert!(status.stdout.is_empty(), "working tree must be clean after abort");
    }

    struct EchoHelper;
    impl ResolverHelper for EchoHelper {
        fn resolve(&self, prompt: &str) -> Result<String, MergeError> {
            Ok(format!("resolved: {prompt}"))
        }
    }

    #[test]
    fn clean_merge_on_unrelated_files_ignores_disabled_tiers() {
        // With no conflicts at all, tier 3/4 config and helper presence are
        // irrelevant — tier 1 alone decides the outcome.
        let dir = tempdir().unwrap();
        run(dir.path(), &["init", "-b", "main"]);
        run(dir.path(), &["config", "user.email", "t@t.com"]);
        run(dir.path(), &["config", "user.name", "T"]);
        std::fs::write(dir.path().join("a.txt"), "a\n").unwrap();
        run(dir.path(), &["add", "."]);
        run(dir.path(), &["commit", "-m", "base"]);
        run(dir.path(), &["checkout", "-b", "overstory/worker/bd-1"]);
        std::fs::write(dir.path().join("b.txt"), "b\n").unwrap();
        run(dir.path(), &["add", "."]);
        run(dir.path(), &["commit", "-m", "add b"]);
        run(dir.path(), &["checkout", "main"]);

        let entry = MergeEntry::new("overstory/worker/bd-1", "bd-1", "worker", vec!["b.txt".to_string()]);
        let resolver = MergeResolver::new(
            dir.path(),
            "main",
            ResolverConfig {
                ai_resolve_enabled: true,
                reimagine_enabled: true,
            },
            Some(Box::new(EchoHelper)),
        );
        let outcome = resolver.resolve(&entry);
        assert!(outcome.success);
        assert_eq!(outcome.tier, ResolvedTier::CleanMerge);
    }
}
