use capa_core::TransitionError;
use capa_storage::StorageError;

/// The closed error taxonomy surfaced to the engine's callers.
///
/// Every failure is propagated to the immediate caller; nothing is swallowed
/// or coerced. Only `ConcurrentModification` is retryable, and the engine
/// never retries on its own.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// The persisted state code is not in the catalog (data corruption or a
    /// vocabulary mismatch). Fatal for that entity until corrected manually.
    #[error("unknown {entity_kind} state code '{code}'")]
    UnknownState {
        entity_kind: &'static str,
        code: String,
    },

    /// Transition attempted from a terminal state.
    #[error("no transitions out of terminal state '{state}'")]
    TerminalStateViolation { state: String },

    /// The current branch point does not recognize the submitted decision
    /// key (`None` when no key was submitted at all).
    #[error("decision {decision:?} not valid in state '{state}'")]
    UnknownDecision {
        state: String,
        decision: Option<String>,
    },

    /// Required stage fields missing from the payload. Rejected before any
    /// persistence write; no partial merge occurs.
    #[error("missing required fields: {}", missing.join(", "))]
    Validation { missing: Vec<String> },

    /// Entity id does not exist or is outside the caller's tenant scope.
    /// The engine does not distinguish the two.
    #[error("{entity_kind} not found: {id}")]
    NotFound {
        entity_kind: &'static str,
        id: String,
    },

    /// The entity's state changed between read and write. Retryable: the
    /// caller may re-fetch and resubmit.
    #[error("concurrent modification of {entity_kind} {id}")]
    ConcurrentModification {
        entity_kind: &'static str,
        id: String,
    },

    /// A second corrective action was requested while one linked to the
    /// same finding is still open.
    #[error("finding {finding_id} already has open action {action_id}")]
    ActionAlreadyOpen {
        finding_id: String,
        action_id: String,
    },

    /// A caller tried to advance a finding parked on a still-open
    /// corrective action. Only the action's effective close resumes it.
    #[error("finding {finding_id} is parked on open action {action_id}")]
    FindingParked {
        finding_id: String,
        action_id: String,
    },

    /// A backend fault outside the workflow taxonomy.
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StorageError> for WorkflowError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::StateConflict {
                entity_kind, id, ..
            } => WorkflowError::ConcurrentModification { entity_kind, id },
            StorageError::NotFound { entity_kind, id } => {
                WorkflowError::NotFound { entity_kind, id }
            }
            other => WorkflowError::Storage(other.to_string()),
        }
    }
}

/// Fold an abort outcome into the error being returned. The original
/// rejection wins when rollback succeeds; a failed rollback is a backend
/// fault and supersedes it, carrying both messages.
pub(crate) fn rollback_error(
    err: WorkflowError,
    abort_result: Result<(), StorageError>,
) -> WorkflowError {
    match abort_result {
        Ok(()) => err,
        Err(abort_err) => WorkflowError::Storage(format!("{err}; rollback failed: {abort_err}")),
    }
}

impl From<TransitionError> for WorkflowError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::TerminalState { state } => WorkflowError::TerminalStateViolation {
                state: state.to_string(),
            },
            TransitionError::UnknownDecision { state, decision } => {
                WorkflowError::UnknownDecision {
                    state: state.to_string(),
                    decision,
                }
            }
        }
    }
}
