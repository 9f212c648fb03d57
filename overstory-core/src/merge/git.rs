//! Thin `git` subprocess runner shared by the merge resolver.

use std::path::{Path, PathBuf};
use std::process::Command;

const DEFAULT_MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 100;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("failed to execute git {args}: {detail}")]
    Exec { args: String, detail: String },
    #[error("git {args} failed: {detail}")]
    Command { args: String, detail: String },
}

pub struct GitRunner {
    repo_root: PathBuf,
    max_retries: u32,
}

impl GitRunner {
    pub fn new(repo_root: impl AsRef<Path>) -> Self {
        Self {
            repo_root: repo_root.as_ref().to_path_buf(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn run(&self, args: &[&str]) -> Result<String, GitError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()
            .map_err(|e| GitError::Exec {
                args: args.join(" "),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitError::Command {
                args: args.join(" "),
                detail: stderr.trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Retries transient failures (lock contention, network flakiness on
    /// fetch-like commands) with exponential backoff: 100ms, 200ms, 400ms.
    pub fn run_with_retry(&self, args: &[&str]) -> Result<String, GitError> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            match self.run(args) {
                Ok(out) => return Ok(out),
                Err(e) if attempt < self.max_retries && is_retryable(&e) => {
                    let delay = RETRY_BASE_DELAY_MS * (1 << attempt);
                    std::thread::sleep(std::time::Duration::from_millis(delay));
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| GitError::Command {
            args: args.join(" "),
            detail: "max retries exceeded".to_string(),
        }))
    }

    /// Returns `true` if the run command exits non-zero but leaves conflict
    /// markers in place (`git merge` on conflict exits 1, not an error here).
    pub fn try_run(&self, args: &[&str]) -> (bool, String) {
        match Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()
        {
            Ok(output) => (
                output.status.success(),
                String::from_utf8_lossy(&output.stdout).trim().to_string(),
            ),
            Err(e) => (false, e.to_string()),
        }
    }

    pub fn conflicted_files(&self) -> Result<Vec<String>, GitError> {
        let out = self.run(&["diff", "--name-only", "--diff-filter=U"])?;
        Ok(out.lines().map(|l| l.to_string()).filter(|l| !l.is_empty()).collect())
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }
}

fn is_retryable(e: &GitError) -> bool {
    let detail = match e {
        GitError::Exec { detail, .. } => detail,
        GitError::Command { detail, .. } => detail,
    };
    detail.contains("index.lock") || detail.contains("Unable to create")
}
