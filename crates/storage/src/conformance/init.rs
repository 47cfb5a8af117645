use std::future::Future;

use super::{sample_action, sample_finding, TestResult};
use crate::{StorageError, WorkflowStorage};

pub(super) async fn run_init_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "init",
            "insert_and_read_back",
            insert_and_read_back(factory).await,
        ),
        TestResult::from_result(
            "init",
            "duplicate_insert_rejected",
            duplicate_insert_rejected(factory).await,
        ),
        TestResult::from_result(
            "init",
            "missing_record_is_not_found",
            missing_record_is_not_found(factory).await,
        ),
    ]
}

async fn insert_and_read_back<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .map_err(|e| format!("insert finding: {e}"))?;
    storage
        .insert_action(&mut snap, sample_action("a-1", "f-1", "acme", "planning"))
        .await
        .map_err(|e| format!("insert action: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let finding = storage
        .get_finding("acme", "f-1")
        .await
        .map_err(|e| format!("get finding: {e}"))?;
    if finding.state != "detected" || finding.version != 0 {
        return Err(format!(
            "expected detected/v0, got {}/v{}",
            finding.state, finding.version
        ));
    }

    let action = storage
        .get_action("acme", "a-1")
        .await
        .map_err(|e| format!("get action: {e}"))?;
    if action.finding_id != "f-1" {
        return Err(format!("action back-reference wrong: {}", action.finding_id));
    }
    Ok(())
}

async fn duplicate_insert_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .map_err(|e| format!("first insert: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let mut snap = storage.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    let result = storage
        .insert_finding(&mut snap, sample_finding("f-1", "acme", "detected"))
        .await;
    let _ = storage.abort_snapshot(snap).await;
    match result {
        Err(StorageError::AlreadyExists { .. }) => Ok(()),
        Err(other) => Err(format!("expected AlreadyExists, got {other}")),
        Ok(()) => Err("duplicate insert accepted".to_string()),
    }
}

async fn missing_record_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = factory().await;
    match storage.get_finding("acme", "nope").await {
        Err(StorageError::NotFound { .. }) => Ok(()),
        Err(other) => Err(format!("expected NotFound, got {other}")),
        Ok(_) => Err("read of missing finding succeeded".to_string()),
    }
}
