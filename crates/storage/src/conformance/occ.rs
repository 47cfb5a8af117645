use std::future::Future;
use std::sync::Arc;

use super::{sample_finding, TestResult};
use crate::{StorageError, WorkflowStorage};

/// Number of concurrent tasks racing in the concurrency test.
const N: usize = 8;

pub(super) async fn run_occ_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "occ",
            "stale_expected_state_conflicts",
            stale_expected_state_conflicts(factory).await,
        ),
        TestResult::from_result(
            "occ",
            "update_bumps_version",
            update_bumps_version(factory).await,
        ),
        TestResult::from_result(
            "occ",
            "concurrent_updates_exactly_one_wins",
            concurrent_updates_exactly_one_wins(factory).await,
        ),
    ]
}

async fn seed<S: WorkflowStorage>(storage: &S) -> Result<(), String> {
    let mut snap = storage.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    storage
        .insert_finding(&mut snap, sample_finding("f-1", "acme", "detected"))
        .await
        .map_err(|e| format!("insert: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit seed: {e}"))
}

/// Two snapshots read the same record; after the first commits a state
/// change, the second's conditional write must fail with StateConflict
/// (at the update call or at commit, whichever the backend validates at).
async fn stale_expected_state_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed(&storage).await?;

    let mut first = storage.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    let mut second = storage.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;

    let mut record = storage
        .get_finding_for_update(&mut first, "acme", "f-1")
        .await
        .map_err(|e| format!("first read: {e}"))?;
    record.state = "immediate_action_planned".to_string();
    storage
        .update_finding(&mut first, "detected", record.clone())
        .await
        .map_err(|e| format!("first update: {e}"))?;
    storage
        .commit_snapshot(first)
        .await
        .map_err(|e| format!("first commit: {e}"))?;

    let stale = storage
        .get_finding_for_update(&mut second, "acme", "f-1")
        .await
        .map_err(|e| format!("second read: {e}"))?;
    let mut losing = stale.clone();
    losing.state = "immediate_action_planned".to_string();
    let update_result = storage.update_finding(&mut second, "detected", losing).await;
    let outcome = match update_result {
        Err(e) => Err(e),
        Ok(_) => storage.commit_snapshot(second).await,
    };
    match outcome {
        Err(StorageError::StateConflict { .. }) => Ok(()),
        Err(other) => Err(format!("expected StateConflict, got {other}")),
        Ok(()) => Err("stale write committed".to_string()),
    }
}

async fn update_bumps_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    seed(&storage).await?;

    let mut snap = storage.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    let mut record = storage
        .get_finding_for_update(&mut snap, "acme", "f-1")
        .await
        .map_err(|e| format!("read: {e}"))?;
    record.state = "immediate_action_planned".to_string();
    let new_version = storage
        .update_finding(&mut snap, "detected", record)
        .await
        .map_err(|e| format!("update: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    if new_version != 1 {
        return Err(format!("expected version 1, got {new_version}"));
    }
    let after = storage
        .get_finding("acme", "f-1")
        .await
        .map_err(|e| format!("get: {e}"))?;
    if after.version != 1 {
        return Err(format!("persisted version {} != 1", after.version));
    }
    Ok(())
}

/// N tasks race to transition the same finding out of `detected`.
/// Exactly one commit wins; the rest must get StateConflict.
async fn concurrent_updates_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    seed(storage.as_ref()).await?;

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = Arc::clone(&storage);
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            let mut record = s.get_finding_for_update(&mut snap, "acme", "f-1").await?;
            record.state = "immediate_action_planned".to_string();
            if let Err(e) = s.update_finding(&mut snap, "detected", record).await {
                let _ = s.abort_snapshot(snap).await;
                return Err(e);
            }
            s.commit_snapshot(snap).await
        }));
    }

    let mut wins = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.map_err(|e| format!("join: {e}"))? {
            Ok(()) => wins += 1,
            Err(StorageError::StateConflict { .. }) => conflicts += 1,
            Err(other) => return Err(format!("unexpected error: {other}")),
        }
    }

    if wins != 1 {
        return Err(format!("{wins} winners, expected exactly 1 ({conflicts} conflicts)"));
    }
    Ok(())
}
