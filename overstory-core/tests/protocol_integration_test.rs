//! Integration test for the end-to-end coordination protocol: a lead and a
//! builder registered under one run, exchanging `worker_done` -> `merge_ready`
//! -> `merged` mail while the branch clears the merge queue, ending with both
//! sessions completed, the run completed, and the branch's file landed on
//! canonical.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use overstory_core::merge::ResolverConfig;
use overstory_core::{
    AgentSession, Capability, EventStore, MailClient, MailStore, MergeEntry, MergeQueue,
    MergeResolver, MergeStatus, MessageType, NewMessage, NudgeBoard, ResolvedTier, Run, RunStatus,
    RunStore, SessionRegistry, SessionState,
};

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git").args(args).current_dir(dir).status().unwrap();
    assert!(status.success(), "git {args:?} failed");
}

fn init_canonical_repo_with_branch(branch: &str, bead_id: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    git(dir.path(), &["init", "-b", "main"]);
    git(dir.path(), &["config", "user.email", "t@t.com"]);
    git(dir.path(), &["config", "user.name", "T"]);
    std::fs::write(dir.path().join("README.md"), "base\n").unwrap();
    git(dir.path(), &["add", "."]);
    git(dir.path(), &["commit", "-m", "base"]);

    git(dir.path(), &["checkout", "-b", branch]);
    std::fs::write(dir.path().join(format!("{bead_id}.txt")), "work done\n").unwrap();
    git(dir.path(), &["add", "."]);
    git(dir.path(), &["commit", "-m", "worker edit"]);
    git(dir.path(), &["checkout", "main"]);

    dir
}

#[test]
fn worker_done_through_merged_completes_run_and_lands_branch() {
    let branch = "overstory/builder-1/bd-1";
    let bead_id = "bd-1";
    let repo = init_canonical_repo_with_branch(branch, bead_id);

    let mail_store = Arc::new(MailStore::open_in_memory().unwrap());
    let registry = Arc::new(SessionRegistry::open_in_memory().unwrap());
    let events = Arc::new(EventStore::open_in_memory().unwrap());
    let runs = RunStore::open_in_memory().unwrap();
    let merge_queue = MergeQueue::open_in_memory().unwrap();
    let nudges_dir = tempfile::tempdir().unwrap();

    let run = Run::new();
    runs.create_run(&run).unwrap();

    let lead = AgentSession::new_booting(
        "lead-1",
        Capability::Lead,
        "/w/lead-1",
        "overstory/lead-1/bd-1",
        bead_id,
        "tmux-lead-1",
        None,
        1,
        Some(run.id.clone()),
    );
    let builder = AgentSession::new_booting(
        "builder-1",
        Capability::Builder,
        "/w/builder-1",
        branch,
        bead_id,
        "tmux-builder-1",
        Some("lead-1".to_string()),
        2,
        Some(run.id.clone()),
    );
    registry.upsert(&lead).unwrap();
    registry.upsert(&builder).unwrap();
    registry.update_state("lead-1", SessionState::Working).unwrap();
    registry.update_state("builder-1", SessionState::Working).unwrap();
    runs.increment_agent_count(&run.id).unwrap();
    runs.increment_agent_count(&run.id).unwrap();

    let mail = MailClient::new(
        mail_store,
        registry.clone(),
        events,
        NudgeBoard::new(nudges_dir.path()),
        Some(run.id.clone()),
    );

    // builder-1 -> lead-1: worker_done
    let worker_done = mail
        .send(NewMessage::new(
            "builder-1",
            "lead-1",
            "work complete",
            branch,
            MessageType::WorkerDone,
        ))
        .unwrap();
    assert_eq!(worker_done.len(), 1);

    // lead-1 -> orchestrator: merge_ready
    let merge_ready = mail
        .send(NewMessage::new(
            "lead-1",
            "orchestrator",
            "ready to merge",
            branch,
            MessageType::MergeReady,
        ))
        .unwrap();
    assert_eq!(merge_ready.len(), 1);

    // Orchestrator enqueues the branch and resolves it.
    let entry = MergeEntry::new(branch, bead_id, "builder-1", vec![format!("{bead_id}.txt")]);
    merge_queue.enqueue(&entry).unwrap();
    let peeked = merge_queue.peek().unwrap().unwrap();
    assert_eq!(peeked.branch_name, branch);

    let resolver = MergeResolver::new(
        repo.path(),
        "main",
        ResolverConfig {
            ai_resolve_enabled: false,
            reimagine_enabled: false,
        },
        None,
    );
    let outcome = resolver.resolve(&peeked);
    assert!(outcome.success);
    assert_eq!(outcome.tier, ResolvedTier::CleanMerge);
    merge_queue
        .update_status(branch, MergeStatus::Merged, Some(ResolvedTier::CleanMerge))
        .unwrap();
    assert!(merge_queue.peek().unwrap().is_none());

    // Orchestrator -> lead-1: merged
    mail.send(NewMessage::new(
        "orchestrator",
        "lead-1",
        "merged",
        branch,
        MessageType::Merged,
    ))
    .unwrap();

    // Both sessions wrap up, the run closes.
    registry.update_state("builder-1", SessionState::Completed).unwrap();
    registry.update_state("lead-1", SessionState::Completed).unwrap();
    runs.complete_run(&run.id, RunStatus::Completed).unwrap();

    let active = registry.get_active().unwrap();
    assert!(active.is_empty(), "both sessions should have left the active set");

    let final_run = runs.get_run(&run.id).unwrap().unwrap();
    assert_eq!(final_run.status, RunStatus::Completed);
    assert_eq!(final_run.agent_count, 2);
    assert!(final_run.completed_at.is_some());

    assert!(repo.path().join(format!("{bead_id}.txt")).exists());
}
