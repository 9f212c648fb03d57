//! Session Registry — authoritative state for every live worker.

mod runs;
mod sessions;
mod types;

pub use runs::{RunError, RunResult, RunStore};
pub use sessions::{RegistryError, RegistryResult, SessionRegistry};
pub use types::{AgentSession, Capability, Run, RunStatus, SessionState};
