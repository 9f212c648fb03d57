//! Process/terminal-multiplexer liveness probes. Behind a trait so tests
//! can substitute a fake without spawning real processes.

use std::process::Command;

pub trait LivenessProbe: Send + Sync {
    fn tmux_session_alive(&self, tmux_session: &str) -> bool;
    fn pid_alive(&self, pid: i64) -> bool;

    /// Kill the worker's terminal session on a tier-0 `terminate` verdict.
    /// Best-effort: the registry transition to `zombie` is authoritative,
    /// not this call's success.
    fn kill_session(&self, tmux_session: &str) {
        let _ = Command::new("tmux").args(["kill-session", "-t", tmux_session]).status();
    }
}

/// Shells out to `tmux has-session` and `kill -0`.
pub struct ProcessLivenessProbe;

impl LivenessProbe for ProcessLivenessProbe {
    fn tmux_session_alive(&self, tmux_session: &str) -> bool {
        Command::new("tmux")
            .args(["has-session", "-t", tmux_session])
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn pid_alive(&self, pid: i64) -> bool {
        Command::new("kill")
            .args(["-0", &pid.to_string()])
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

#[cfg(test)]
pub struct FakeLivenessProbe {
    pub tmux_alive: bool,
    pub pid_alive: bool,
    pub killed: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl FakeLivenessProbe {
    pub fn new(tmux_alive: bool, pid_alive: bool) -> Self {
        Self {
            tmux_alive,
            pid_alive,
            killed: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(test)]
impl LivenessProbe for FakeLivenessProbe {
    fn tmux_session_alive(&self, _tmux_session: &str) -> bool {
        self.tmux_alive
    }

    fn pid_alive(&self, _pid: i64) -> bool {
        self.pid_alive
    }

    fn kill_session(&self, tmux_session: &str) {
        self.killed.lock().unwrap().push(tmux_session.to_string());
    }
}
