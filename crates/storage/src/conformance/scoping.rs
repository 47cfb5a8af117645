use std::future::Future;

use super::{sample_finding, TestResult};
use crate::{StorageError, WorkflowStorage};

pub(super) async fn run_scoping_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "scoping",
            "cross_tenant_read_is_not_found",
            cross_tenant_read_is_not_found(factory).await,
        ),
        TestResult::from_result(
            "scoping",
            "list_findings_scoped_and_filtered",
            list_findings_scoped_and_filtered(factory).await,
        ),
    ]
}

async fn cross_tenant_read_is_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .map_err(|e| format!("commit: {e}"))?;

    // Another tenant must get NotFound, indistinguishable from a missing row.
    match storage.get_finding("globex", "f-1").await {
        Err(StorageError::NotFound { .. }) => {}
        Err(other) => return Err(format!("expected NotFound, got {other}")),
        Ok(_) => return Err("cross-tenant unlocked read succeeded".to_string()),
    }

    let mut snap = storage.begin_snapshot().await.map_err(|e| format!("begin: {e}"))?;
    let result = storage.get_finding_for_update(&mut snap, "globex", "f-1").await;
    let _ = storage.abort_snapshot(snap).await;
    match result {
        Err(StorageError::NotFound { .. }) => Ok(()),
        Err(other) => Err(format!("expected NotFound, got {other}")),
        Ok(_) => Err("cross-tenant locked read succeeded".to_string()),
    }
}

async fn list_findings_scoped_and_filtered<S, F, Fut>(factory: &F) -> Result<(), String>
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
        .map_err(|e| format!("insert f-1: {e}"))?;
    storage
        .insert_finding(&mut snap, sample_finding("f-2", "acme", "closed"))
        .await
        .map_err(|e| format!("insert f-2: {e}"))?;
    storage
        .insert_finding(&mut snap, sample_finding("f-3", "globex", "detected"))
        .await
        .map_err(|e| format!("insert f-3: {e}"))?;
    storage
        .commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;

    let all = storage
        .list_findings("acme", None)
        .await
        .map_err(|e| format!("list: {e}"))?;
    if all.len() != 2 {
        return Err(format!("expected 2 acme findings, got {}", all.len()));
    }

    let detected = storage
        .list_findings("acme", Some("detected"))
        .await
        .map_err(|e| format!("list filtered: {e}"))?;
    if detected.len() != 1 || detected[0].id != "f-1" {
        return Err("state filter wrong".to_string());
    }
    Ok(())
}
