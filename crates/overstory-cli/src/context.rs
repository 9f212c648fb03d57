//! Wires up every durable store against the `.overstory/` layout for one
//! CLI invocation. Short-lived: a new `AppContext` is built per process,
//! since the CLI itself is invoked many times per worker tool call.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use overstory_core::{
    EventStore, MailClient, MailStore, MergeQueue, NudgeBoard, RunStore, SessionRegistry,
};

use crate::config::ProjectConfig;
use crate::paths::OverstoryPaths;

pub struct AppContext {
    pub paths: OverstoryPaths,
    pub config: ProjectConfig,
    pub events: Arc<EventStore>,
    pub mail_store: Arc<MailStore>,
    pub mail: Arc<MailClient>,
    pub registry: Arc<SessionRegistry>,
    pub runs: Arc<RunStore>,
    pub merge_queue: Arc<MergeQueue>,
    pub nudges: NudgeBoard,
}

impl AppContext {
    pub fn load() -> Result<Self> {
        let paths = OverstoryPaths::discover().context("failed to resolve .overstory/ directory")?;
        if !paths.root.is_dir() {
            anyhow::bail!(
                "no .overstory/ directory found at {}; run `overstory init` first",
                paths.root.display()
            );
        }

        let config = ProjectConfig::load(paths.config_path())?;

        let events = Arc::new(
            EventStore::open(paths.events_db()).context("failed to open events.db")?,
        );
        let mail_store = Arc::new(
            MailStore::open(paths.mail_db()).context("failed to open mail.db")?,
        );
        let registry = Arc::new(
            SessionRegistry::open(paths.sessions_db()).context("failed to open sessions.db")?,
        );
        let runs = Arc::new(
            RunStore::open(paths.sessions_db()).context("failed to open sessions.db for runs")?,
        );
        let merge_queue = Arc::new(
            MergeQueue::open(paths.merge_queue_db()).context("failed to open merge-queue.db")?,
        );
        let nudges = NudgeBoard::new(paths.pending_nudges_dir());

        let run_id = current_run_id(&paths);
        let mail = Arc::new(MailClient::new(
            mail_store.clone(),
            registry.clone(),
            events.clone(),
            NudgeBoard::new(paths.pending_nudges_dir()),
            run_id,
        ));

        Ok(Self {
            paths,
            config,
            events,
            mail_store,
            mail,
            registry,
            runs,
            merge_queue,
            nudges,
        })
    }

    pub fn process_env(&self) -> HashMap<String, String> {
        std::env::vars().collect()
    }
}

/// Reads the plain-text current run id, if any orchestrator session has
/// recorded one.
fn current_run_id(paths: &OverstoryPaths) -> Option<String> {
    std::fs::read_to_string(paths.current_run_path())
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
