//! Finding lifecycle controller.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Map;

use capa_core::{
    next_state, resolve_finding, ActionState, Category, DecisionKey, FindingState, Origin,
    Priority, WorkflowState,
};
use capa_storage::{FindingRecord, TransitionRecord, WorkflowStorage};

use crate::bridge;
use crate::context::RequestContext;
use crate::error::{rollback_error, WorkflowError};
use crate::ids::{new_id, now_rfc3339};
use crate::payload::{merge_fields, validate_payload, Payload};

/// Input for opening a new finding.
#[derive(Debug, Clone, Deserialize)]
pub struct NewFinding {
    pub origin: Origin,
    pub category: Category,
    pub priority: Priority,
    pub requirement_ref: Option<String>,
    pub title: String,
    pub description: String,
}

/// Orchestrates the progression of findings: validates submitted transitions
/// against the catalog and transition table, merges stage payloads, and
/// commits the new state atomically with its history row.
pub struct FindingController<S: WorkflowStorage> {
    storage: Arc<S>,
}

impl<S: WorkflowStorage> FindingController<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Open a new finding in the initial detection state.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        new: NewFinding,
    ) -> Result<FindingRecord, WorkflowError> {
        let now = now_rfc3339();
        let record = FindingRecord {
            id: new_id("fnd"),
            tenant_id: ctx.tenant_id.clone(),
            origin: new.origin,
            category: new.category,
            priority: new.priority,
            requirement_ref: new.requirement_ref,
            title: new.title,
            description: new.description,
            state: FindingState::initial().code().to_string(),
            fields: Map::new(),
            action_id: None,
            version: 0,
            created_at: now.clone(),
            updated_at: now,
        };

        let mut snap = self.storage.begin_snapshot().await?;
        if let Err(e) = self.storage.insert_finding(&mut snap, record.clone()).await {
            let abort = self.storage.abort_snapshot(snap).await;
            return Err(rollback_error(e.into(), abort));
        }
        self.storage.commit_snapshot(snap).await?;
        Ok(record)
    }

    /// Advance a finding by one transition.
    ///
    /// The whole read-validate-merge-write cycle runs inside one storage
    /// snapshot; any failure aborts it and no state change is observable.
    /// Entering the requires-action branch spawns the linked corrective
    /// action in the same snapshot.
    pub async fn advance(
        &self,
        ctx: &RequestContext,
        finding_id: &str,
        decision: Option<DecisionKey>,
        payload: &Payload,
    ) -> Result<FindingRecord, WorkflowError> {
        let mut snap = self.storage.begin_snapshot().await?;
        let result = async {
            let record = self
                .storage
                .get_finding_for_update(&mut snap, &ctx.tenant_id, finding_id)
                .await?;
            drive_finding(self.storage.as_ref(), &mut snap, ctx, record, decision, payload).await
        }
        .await;

        match result {
            Ok(record) => {
                self.storage.commit_snapshot(snap).await?;
                Ok(record)
            }
            Err(e) => {
                let abort = self.storage.abort_snapshot(snap).await;
                Err(rollback_error(e, abort))
            }
        }
    }

    /// Read a finding within the caller's tenant scope.
    pub async fn get(
        &self,
        ctx: &RequestContext,
        finding_id: &str,
    ) -> Result<FindingRecord, WorkflowError> {
        Ok(self.storage.get_finding(&ctx.tenant_id, finding_id).await?)
    }
}

/// Apply one validated transition to a loaded finding record inside an open
/// snapshot. Shared by the controller and the bridge's resume path.
pub(crate) async fn drive_finding<S: WorkflowStorage>(
    storage: &S,
    snap: &mut S::Snapshot,
    ctx: &RequestContext,
    mut record: FindingRecord,
    decision: Option<DecisionKey>,
    payload: &Payload,
) -> Result<FindingRecord, WorkflowError> {
    let current =
        FindingState::from_code(&record.state).ok_or_else(|| WorkflowError::UnknownState {
            entity_kind: "finding",
            code: record.state.clone(),
        })?;

    // A parked finding resumes only through its linked action's close. The
    // bridge stages that close in the same snapshot, so its own resume path
    // reads the action as terminal here; any other caller is rejected.
    if current == FindingState::PendingCorrectiveAction {
        if let Some(linked_id) = &record.action_id {
            let linked = storage
                .get_action_for_update(snap, &ctx.tenant_id, linked_id)
                .await?;
            let linked_state =
                ActionState::from_code(&linked.state).ok_or_else(|| WorkflowError::UnknownState {
                    entity_kind: "action",
                    code: linked.state.clone(),
                })?;
            if !linked_state.is_terminal() {
                return Err(WorkflowError::FindingParked {
                    finding_id: record.id.clone(),
                    action_id: linked.id,
                });
            }
        }
    }

    let handler = resolve_finding(current).ok_or_else(|| WorkflowError::TerminalStateViolation {
        state: current.code().to_string(),
    })?;
    validate_payload(&handler, payload)?;
    let next = next_state(current, decision)?;

    // The conditional write compares against the raw persisted code, which
    // may still be a deprecated alias; the canonical code is written back.
    let persisted_state = record.state.clone();
    merge_fields(&mut record.fields, payload);
    record.state = next.code().to_string();
    record.updated_at = now_rfc3339();

    if next == FindingState::PendingCorrectiveAction {
        let action = bridge::spawn_action(storage, snap, ctx, &record).await?;
        record.action_id = Some(action.id);
    }

    record.version = storage
        .update_finding(snap, &persisted_state, record.clone())
        .await?;
    storage
        .insert_transition(
            snap,
            TransitionRecord {
                id: new_id("trn"),
                tenant_id: ctx.tenant_id.clone(),
                entity_kind: "finding".to_string(),
                entity_id: record.id.clone(),
                from_state: current.code().to_string(),
                to_state: record.state.clone(),
                decision: decision.map(|d| d.code().to_string()),
                actor: ctx.user_id.clone(),
                recorded_at: record.updated_at.clone(),
            },
        )
        .await?;
    Ok(record)
}
