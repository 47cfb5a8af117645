use std::future::Future;

use super::{sample_finding, TestResult};
use crate::{StorageError, WorkflowStorage};

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "snapshot",
            "uncommitted_write_invisible",
            uncommitted_write_invisible(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "abort_discards_staged_writes",
            abort_discards_staged_writes(factory).await,
        ),
        TestResult::from_result(
            "snapshot",
            "committed_update_visible",
            committed_update_visible(factory).await,
        ),
    ]
}

async fn uncommitted_write_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
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

    // Not committed yet -- unlocked reads must not see it.
    match storage.get_finding("acme", "f-1").await {
        Err(StorageError::NotFound { .. }) => {}
        Err(other) => return Err(format!("expected NotFound, got {other}")),
        Ok(_) => return Err("uncommitted insert visible to unlocked read".to_string()),
    }

    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;
    storage
        .get_finding("acme", "f-1")
        .await
        .map_err(|e| format!("get after commit: {e}"))?;
    Ok(())
}

async fn abort_discards_staged_writes<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .abort_snapshot(snap)
        .await
        .map_err(|e| format!("abort: {e}"))?;

    match storage.get_finding("acme", "f-1").await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        Err(other) => Err(format!("expected NotFound, got {other}")),
        Ok(_) => Err("aborted insert became visible".to_string()),
    }
}

async fn committed_update_visible<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .map_err(|e| format!("read for update: {e}"))?;
    record.state = "immediate_action_planned".to_string();
    storage
        .update_finding(&mut snap, "detected", record)
        .await
        .map_err(|e| format!("update: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit update: {e}"))?;

    let after = storage
        .get_finding("acme", "f-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if after.state != "immediate_action_planned" {
        return Err(format!("state not updated: {}", after.state));
    }
    Ok(())
}
