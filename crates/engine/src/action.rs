//! Corrective-action lifecycle controller.

use std::sync::Arc;

use capa_core::{next_state, resolve_action, ActionState, DecisionKey, WorkflowState};
use capa_storage::{ActionRecord, TransitionRecord, WorkflowStorage};

use crate::bridge;
use crate::context::RequestContext;
use crate::error::{rollback_error, WorkflowError};
use crate::ids::{new_id, now_rfc3339};
use crate::payload::{merge_fields, validate_payload, Payload};

/// Orchestrates the progression of corrective actions.
///
/// Same shape as the finding controller, with two couplings to the parent
/// finding: the `ineffective` verification outcome moves the action backward
/// to planning (the finding stays parked), and an `effective` close resumes
/// the parked finding through the bridge -- both inside one snapshot.
pub struct ActionController<S: WorkflowStorage> {
    storage: Arc<S>,
}

impl<S: WorkflowStorage> ActionController<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    /// Advance an action by one transition.
    pub async fn advance(
        &self,
        ctx: &RequestContext,
        action_id: &str,
        decision: Option<DecisionKey>,
        payload: &Payload,
    ) -> Result<ActionRecord, WorkflowError> {
        let mut snap = self.storage.begin_snapshot().await?;
        let result = self
            .advance_in(&mut snap, ctx, action_id, decision, payload)
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

    async fn advance_in(
        &self,
        snap: &mut S::Snapshot,
        ctx: &RequestContext,
        action_id: &str,
        decision: Option<DecisionKey>,
        payload: &Payload,
    ) -> Result<ActionRecord, WorkflowError> {
        let mut record = self
            .storage
            .get_action_for_update(snap, &ctx.tenant_id, action_id)
            .await?;

        let current =
            ActionState::from_code(&record.state).ok_or_else(|| WorkflowError::UnknownState {
                entity_kind: "action",
                code: record.state.clone(),
            })?;
        let handler =
            resolve_action(current).ok_or_else(|| WorkflowError::TerminalStateViolation {
                state: current.code().to_string(),
            })?;
        validate_payload(&handler, payload)?;
        let next = next_state(current, decision)?;

        let persisted_state = record.state.clone();
        merge_fields(&mut record.fields, payload);
        record.state = next.code().to_string();
        record.updated_at = now_rfc3339();

        record.version = self
            .storage
            .update_action(snap, &persisted_state, record.clone())
            .await?;
        self.storage
            .insert_transition(
                snap,
                TransitionRecord {
                    id: new_id("trn"),
                    tenant_id: ctx.tenant_id.clone(),
                    entity_kind: "action".to_string(),
                    entity_id: record.id.clone(),
                    from_state: current.code().to_string(),
                    to_state: record.state.clone(),
                    decision: decision.map(|d| d.code().to_string()),
                    actor: ctx.user_id.clone(),
                    recorded_at: record.updated_at.clone(),
                },
            )
            .await?;

        // An effective close unblocks the parent finding, atomically with
        // the action close.
        if next == ActionState::Closed {
            bridge::on_action_closed(self.storage.as_ref(), snap, ctx, &record).await?;
        }
        Ok(record)
    }

    /// Read an action within the caller's tenant scope.
    pub async fn get(
        &self,
        ctx: &RequestContext,
        action_id: &str,
    ) -> Result<ActionRecord, WorkflowError> {
        Ok(self.storage.get_action(&ctx.tenant_id, action_id).await?)
    }
}
