//! In-memory reference backend.
//!
//! Snapshots stage their writes and apply them on commit under a single
//! lock, re-validating every conditional write against the committed store.
//! Commit is all-or-nothing: mutations are applied to a scratch copy that
//! only replaces the store when every staged operation validates.
//!
//! This backend exists for the engine's tests and as the executable
//! reference for the conformance suite; production deployments implement
//! `WorkflowStorage` against a real database.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::record::{ActionRecord, FindingRecord, TransitionRecord};
use crate::traits::WorkflowStorage;
use async_trait::async_trait;

#[derive(Debug, Clone, Default)]
struct Store {
    findings: HashMap<String, FindingRecord>,
    actions: HashMap<String, ActionRecord>,
    transitions: Vec<TransitionRecord>,
}

#[derive(Debug)]
enum StagedOp {
    InsertFinding(FindingRecord),
    InsertAction(ActionRecord),
    UpdateFinding {
        expected_state: String,
        record: FindingRecord,
    },
    UpdateAction {
        expected_state: String,
        record: ActionRecord,
    },
    InsertTransition(TransitionRecord),
}

/// Staged writes of one in-progress transaction. Dropping the snapshot
/// without committing discards everything.
#[derive(Debug, Default)]
pub struct MemorySnapshot {
    ops: Vec<StagedOp>,
}

impl MemorySnapshot {
    /// Overlay view of a finding: committed value plus staged writes.
    fn overlay_finding(&self, committed: Option<&FindingRecord>, id: &str) -> Option<FindingRecord> {
        let mut current = committed.cloned();
        for op in &self.ops {
            match op {
                StagedOp::InsertFinding(r) if r.id == id => current = Some(r.clone()),
                StagedOp::UpdateFinding { record, .. } if record.id == id => {
                    current = Some(record.clone())
                }
                _ => {}
            }
        }
        current
    }

    fn overlay_action(&self, committed: Option<&ActionRecord>, id: &str) -> Option<ActionRecord> {
        let mut current = committed.cloned();
        for op in &self.ops {
            match op {
                StagedOp::InsertAction(r) if r.id == id => current = Some(r.clone()),
                StagedOp::UpdateAction { record, .. } if record.id == id => {
                    current = Some(record.clone())
                }
                _ => {}
            }
        }
        current
    }
}

/// In-memory `WorkflowStorage` backend.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    inner: Mutex<Store>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Apply one staged op to the scratch store, validating as it goes.
fn apply_op(store: &mut Store, op: StagedOp) -> Result<(), StorageError> {
    match op {
        StagedOp::InsertFinding(record) => {
            if store.findings.contains_key(&record.id) {
                return Err(StorageError::AlreadyExists {
                    entity_kind: "finding",
                    id: record.id,
                });
            }
            store.findings.insert(record.id.clone(), record);
            Ok(())
        }
        StagedOp::InsertAction(record) => {
            if store.actions.contains_key(&record.id) {
                return Err(StorageError::AlreadyExists {
                    entity_kind: "action",
                    id: record.id,
                });
            }
            store.actions.insert(record.id.clone(), record);
            Ok(())
        }
        StagedOp::UpdateFinding {
            expected_state,
            mut record,
        } => {
            let current = store
                .findings
                .get(&record.id)
                .ok_or_else(|| StorageError::NotFound {
                    entity_kind: "finding",
                    id: record.id.clone(),
                })?;
            if current.state != expected_state {
                return Err(StorageError::StateConflict {
                    entity_kind: "finding",
                    id: record.id,
                    expected_state,
                });
            }
            record.version = current.version + 1;
            store.findings.insert(record.id.clone(), record);
            Ok(())
        }
        StagedOp::UpdateAction {
            expected_state,
            mut record,
        } => {
            let current = store
                .actions
                .get(&record.id)
                .ok_or_else(|| StorageError::NotFound {
                    entity_kind: "action",
                    id: record.id.clone(),
                })?;
            if current.state != expected_state {
                return Err(StorageError::StateConflict {
                    entity_kind: "action",
                    id: record.id,
                    expected_state,
                });
            }
            record.version = current.version + 1;
            store.actions.insert(record.id.clone(), record);
            Ok(())
        }
        StagedOp::InsertTransition(record) => {
            store.transitions.push(record);
            Ok(())
        }
    }
}

#[async_trait]
impl WorkflowStorage for MemoryStorage {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError> {
        Ok(MemorySnapshot::default())
    }

    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError> {
        let mut store = self.inner.lock().await;
        let mut scratch = store.clone();
        for op in snapshot.ops {
            apply_op(&mut scratch, op)?;
        }
        *store = scratch;
        Ok(())
    }

    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError> {
        drop(snapshot);
        Ok(())
    }

    async fn insert_finding(
        &self,
        snapshot: &mut Self::Snapshot,
        record: FindingRecord,
    ) -> Result<(), StorageError> {
        let store = self.inner.lock().await;
        if snapshot
            .overlay_finding(store.findings.get(&record.id), &record.id)
            .is_some()
        {
            return Err(StorageError::AlreadyExists {
                entity_kind: "finding",
                id: record.id,
            });
        }
        snapshot.ops.push(StagedOp::InsertFinding(record));
        Ok(())
    }

    async fn insert_action(
        &self,
        snapshot: &mut Self::Snapshot,
        record: ActionRecord,
    ) -> Result<(), StorageError> {
        let store = self.inner.lock().await;
        if snapshot
            .overlay_action(store.actions.get(&record.id), &record.id)
            .is_some()
        {
            return Err(StorageError::AlreadyExists {
                entity_kind: "action",
                id: record.id,
            });
        }
        snapshot.ops.push(StagedOp::InsertAction(record));
        Ok(())
    }

    async fn get_finding_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        tenant_id: &str,
        finding_id: &str,
    ) -> Result<FindingRecord, StorageError> {
        let store = self.inner.lock().await;
        snapshot
            .overlay_finding(store.findings.get(finding_id), finding_id)
            .filter(|r| r.tenant_id == tenant_id)
            .ok_or_else(|| StorageError::NotFound {
                entity_kind: "finding",
                id: finding_id.to_string(),
            })
    }

    async fn get_action_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        tenant_id: &str,
        action_id: &str,
    ) -> Result<ActionRecord, StorageError> {
        let store = self.inner.lock().await;
        snapshot
            .overlay_action(store.actions.get(action_id), action_id)
            .filter(|r| r.tenant_id == tenant_id)
            .ok_or_else(|| StorageError::NotFound {
                entity_kind: "action",
                id: action_id.to_string(),
            })
    }

    async fn update_finding(
        &self,
        snapshot: &mut Self::Snapshot,
        expected_state: &str,
        record: FindingRecord,
    ) -> Result<i64, StorageError> {
        let store = self.inner.lock().await;
        let current = snapshot
            .overlay_finding(store.findings.get(&record.id), &record.id)
            .filter(|r| r.tenant_id == record.tenant_id)
            .ok_or_else(|| StorageError::NotFound {
                entity_kind: "finding",
                id: record.id.clone(),
            })?;
        if current.state != expected_state {
            return Err(StorageError::StateConflict {
                entity_kind: "finding",
                id: record.id,
                expected_state: expected_state.to_string(),
            });
        }
        let new_version = current.version + 1;
        let mut staged = record;
        staged.version = new_version;
        snapshot.ops.push(StagedOp::UpdateFinding {
            expected_state: expected_state.to_string(),
            record: staged,
        });
        Ok(new_version)
    }

    async fn update_action(
        &self,
        snapshot: &mut Self::Snapshot,
        expected_state: &str,
        record: ActionRecord,
    ) -> Result<i64, StorageError> {
        let store = self.inner.lock().await;
        let current = snapshot
            .overlay_action(store.actions.get(&record.id), &record.id)
            .filter(|r| r.tenant_id == record.tenant_id)
            .ok_or_else(|| StorageError::NotFound {
                entity_kind: "action",
                id: record.id.clone(),
            })?;
        if current.state != expected_state {
            return Err(StorageError::StateConflict {
                entity_kind: "action",
                id: record.id,
                expected_state: expected_state.to_string(),
            });
        }
        let new_version = current.version + 1;
        let mut staged = record;
        staged.version = new_version;
        snapshot.ops.push(StagedOp::UpdateAction {
            expected_state: expected_state.to_string(),
            record: staged,
        });
        Ok(new_version)
    }

    async fn insert_transition(
        &self,
        snapshot: &mut Self::Snapshot,
        record: TransitionRecord,
    ) -> Result<(), StorageError> {
        snapshot.ops.push(StagedOp::InsertTransition(record));
        Ok(())
    }

    async fn get_finding(
        &self,
        tenant_id: &str,
        finding_id: &str,
    ) -> Result<FindingRecord, StorageError> {
        let store = self.inner.lock().await;
        store
            .findings
            .get(finding_id)
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                entity_kind: "finding",
                id: finding_id.to_string(),
            })
    }

    async fn get_action(
        &self,
        tenant_id: &str,
        action_id: &str,
    ) -> Result<ActionRecord, StorageError> {
        let store = self.inner.lock().await;
        store
            .actions
            .get(action_id)
            .filter(|r| r.tenant_id == tenant_id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                entity_kind: "action",
                id: action_id.to_string(),
            })
    }

    async fn list_findings(
        &self,
        tenant_id: &str,
        state_filter: Option<&str>,
    ) -> Result<Vec<FindingRecord>, StorageError> {
        let store = self.inner.lock().await;
        let mut records: Vec<FindingRecord> = store
            .findings
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .filter(|r| state_filter.map_or(true, |s| r.state == s))
            .cloned()
            .collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }

    async fn list_transitions(
        &self,
        tenant_id: &str,
        entity_id: &str,
    ) -> Result<Vec<TransitionRecord>, StorageError> {
        let store = self.inner.lock().await;
        Ok(store
            .transitions
            .iter()
            .filter(|t| t.tenant_id == tenant_id && t.entity_id == entity_id)
            .cloned()
            .collect())
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
