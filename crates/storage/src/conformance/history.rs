use std::future::Future;

use super::{sample_finding, sample_transition, TestResult};
use crate::WorkflowStorage;

pub(super) async fn run_history_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "history",
            "transition_commits_with_entity_update",
            transition_commits_with_entity_update(factory).await,
        ),
        TestResult::from_result(
            "history",
            "aborted_snapshot_leaves_no_history",
            aborted_snapshot_leaves_no_history(factory).await,
        ),
    ]
}

async fn transition_commits_with_entity_update<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;

    let mut snap = storage.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    storage
        .insert_finding(&mut snap, sample_finding("f-1", "acme", "detected"))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit insert: {e}"))?;

    // State change and its history row in the same snapshot.
    let mut snap = storage.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    let mut record = storage
        .get_finding_for_update(&mut snap, "acme", "f-1")
        .await
        .map_err(|e| format!("read: {e}"))?;
    record.state = "immediate_action_planned".to_string();
    storage
        .update_finding(&mut snap, "detected", record)
        .await
        .map_err(|e| format!("update: {e}"))?;
    storage
        .insert_transition(
            &mut snap,
            sample_transition("t-1", "acme", "f-1", "detected", "immediate_action_planned"),
        )
        .await
        .map_err(|e| format!("insert transition: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let history = storage
        .list_transitions("acme", "f-1")
        .await
        .map_err(|e| format!("list: {e}"))?;
    if history.len() != 1 {
        return Err(format!("expected 1 history row, got {}", history.len()));
    }
    if history[0].from_state != "detected" || history[0].to_state != "immediate_action_planned" {
        return Err("history row records wrong states".to_string());
    }
    Ok(())
}

async fn aborted_snapshot_leaves_no_history<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;

    let mut snap = storage.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    storage
        .insert_finding(&mut snap, sample_finding("f-1", "acme", "detected"))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit insert: {e}"))?;

    let mut snap = storage.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    let mut record = storage
        .get_finding_for_update(&mut snap, "acme", "f-1")
        .await
        .map_err(|e| format!("read: {e}"))?;
    record.state = "immediate_action_planned".to_string();
    storage
        .update_finding(&mut snap, "detected", record)
        .await
        .map_err(|e| format!("update: {e}"))?;
    storage
        .insert_transition(
            &mut snap,
            sample_transition("t-1", "acme", "f-1", "detected", "immediate_action_planned"),
        )
        .await
        .map_err(|e| format!("insert transition: {e}"))?;
    storage
        .abort_snapshot(snap)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    let finding = storage
        .get_finding("acme", "f-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if finding.state != "detected" {
        return Err("aborted update applied".to_string());
    }
    let history = storage
        .list_transitions("acme", "f-1")
        .await
        .map_err(|e| format!("list: {e}"))?;
    if !history.is_empty() {
        return Err("aborted history row applied".to_string());
    }
    Ok(())
}
