//! Finding-action bridge.
//!
//! The bridge owns the linkage rules between a finding and the corrective
//! action it spawns: at most one open action per finding, and an effectively
//! closed action resumes the parked finding through its verification branch.
//! Both directions run inside the caller's open snapshot, so the link, the
//! action, and the finding commit or abort together.

use serde_json::Map;

use capa_core::{ActionState, DecisionKey, FindingState, WorkflowState};
use capa_storage::{ActionRecord, FindingRecord, WorkflowStorage};

use crate::context::RequestContext;
use crate::error::WorkflowError;
use crate::finding::drive_finding;
use crate::ids::{new_id, now_rfc3339};
use crate::payload::Payload;

/// Create the corrective action for a finding entering the requires-action
/// branch. Rejects while a previously linked action is still open; a closed
/// prior action (an earlier ineffective loop) permits a fresh spawn.
pub(crate) async fn spawn_action<S: WorkflowStorage>(
    storage: &S,
    snap: &mut S::Snapshot,
    ctx: &RequestContext,
    finding: &FindingRecord,
) -> Result<ActionRecord, WorkflowError> {
    if let Some(linked_id) = &finding.action_id {
        let linked = storage
            .get_action_for_update(snap, &ctx.tenant_id, linked_id)
            .await?;
        let state =
            ActionState::from_code(&linked.state).ok_or_else(|| WorkflowError::UnknownState {
                entity_kind: "action",
                code: linked.state.clone(),
            })?;
        if !state.is_terminal() {
            return Err(WorkflowError::ActionAlreadyOpen {
                finding_id: finding.id.clone(),
                action_id: linked.id,
            });
        }
    }

    let now = now_rfc3339();
    let action = ActionRecord {
        id: new_id("act"),
        finding_id: finding.id.clone(),
        tenant_id: ctx.tenant_id.clone(),
        state: ActionState::initial().code().to_string(),
        fields: Map::new(),
        version: 0,
        created_at: now.clone(),
        updated_at: now,
    };
    storage.insert_action(snap, action.clone()).await?;
    Ok(action)
}

/// Resume the parent finding after its linked action closed effectively:
/// drive it out of the parked state and through the verification branch
/// with an `effective` outcome, closing it.
///
/// A finding no longer parked on this action (a superseding spawn, or
/// manual correction) has nothing to resume; that is not an error.
pub(crate) async fn on_action_closed<S: WorkflowStorage>(
    storage: &S,
    snap: &mut S::Snapshot,
    ctx: &RequestContext,
    action: &ActionRecord,
) -> Result<(), WorkflowError> {
    let finding = storage
        .get_finding_for_update(snap, &ctx.tenant_id, &action.finding_id)
        .await?;

    if finding.action_id.as_deref() != Some(action.id.as_str()) {
        return Ok(());
    }
    let current =
        FindingState::from_code(&finding.state).ok_or_else(|| WorkflowError::UnknownState {
            entity_kind: "finding",
            code: finding.state.clone(),
        })?;
    if current != FindingState::PendingCorrectiveAction {
        return Ok(());
    }

    let resumed = drive_finding(storage, snap, ctx, finding, None, &Payload::new()).await?;
    drive_finding(
        storage,
        snap,
        ctx,
        resumed,
        Some(DecisionKey::Effective),
        &Payload::new(),
    )
    .await?;
    Ok(())
}
