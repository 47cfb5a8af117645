//! Transition table for both entity catalogs.
//!
//! Every non-terminal state maps to either a single fixed successor (linear
//! stages) or a closed set of decision-keyed successors (branch points).
//! There is no free state assignment: a requested target outside this table
//! is rejected, never defaulted.
//!
//! The `ineffective` branch of the action verification is a first-class
//! backward edge (VerificationExecution -> Planning), not a special case in
//! controller code.

use std::fmt;

use crate::state::{ActionState, FindingState, WorkflowState};

/// Decision key submitted at a branch point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionKey {
    /// Treatment analysis: a formal corrective action is required.
    RequiresAction,
    /// Treatment analysis: the immediate action was sufficient.
    NoActionNeeded,
    /// Verification outcome: the treatment worked.
    Effective,
    /// Verification outcome: the problem recurred.
    Ineffective,
}

impl DecisionKey {
    pub fn code(self) -> &'static str {
        match self {
            DecisionKey::RequiresAction => "requires_action",
            DecisionKey::NoActionNeeded => "no_action_needed",
            DecisionKey::Effective => "effective",
            DecisionKey::Ineffective => "ineffective",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "requires_action" => Some(DecisionKey::RequiresAction),
            "no_action_needed" => Some(DecisionKey::NoActionNeeded),
            "effective" => Some(DecisionKey::Effective),
            "ineffective" => Some(DecisionKey::Ineffective),
            _ => None,
        }
    }
}

impl fmt::Display for DecisionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Successor rule for one non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRule<S: WorkflowState> {
    /// Linear stage: exactly one successor.
    Fixed(S),
    /// Branch point: the successor is keyed by the submitted decision.
    Decision(&'static [(DecisionKey, S)]),
}

/// Errors from transition computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// Transition attempted from a terminal state.
    TerminalState { state: &'static str },
    /// The branch point does not recognize the submitted decision key
    /// (`None` when no key was submitted at all).
    UnknownDecision {
        state: &'static str,
        decision: Option<String>,
    },
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionError::TerminalState { state } => {
                write!(f, "no transitions out of terminal state '{}'", state)
            }
            TransitionError::UnknownDecision {
                state,
                decision: Some(d),
            } => {
                write!(f, "decision '{}' not valid in state '{}'", d, state)
            }
            TransitionError::UnknownDecision {
                state,
                decision: None,
            } => {
                write!(f, "state '{}' is a branch point, a decision is required", state)
            }
        }
    }
}

impl std::error::Error for TransitionError {}

/// Finding transition table.
pub fn finding_rule(state: FindingState) -> Option<TransitionRule<FindingState>> {
    match state {
        FindingState::Detected => Some(TransitionRule::Fixed(FindingState::ImmediateActionPlanned)),
        FindingState::ImmediateActionPlanned => {
            Some(TransitionRule::Fixed(FindingState::ImmediateActionExecuted))
        }
        FindingState::ImmediateActionExecuted => Some(TransitionRule::Decision(&[
            (
                DecisionKey::RequiresAction,
                FindingState::PendingCorrectiveAction,
            ),
            (DecisionKey::NoActionNeeded, FindingState::Closed),
        ])),
        // Bridge-driven resume once the linked action closes effectively.
        FindingState::PendingCorrectiveAction => {
            Some(TransitionRule::Fixed(FindingState::VerificationExecuted))
        }
        FindingState::VerificationExecuted => Some(TransitionRule::Decision(&[
            (DecisionKey::Effective, FindingState::Closed),
            (DecisionKey::Ineffective, FindingState::Detected),
        ])),
        FindingState::Closed => None,
    }
}

/// Action transition table.
pub fn action_rule(state: ActionState) -> Option<TransitionRule<ActionState>> {
    match state {
        ActionState::Planning => Some(TransitionRule::Fixed(ActionState::Execution)),
        ActionState::Execution => Some(TransitionRule::Fixed(ActionState::VerificationPlanning)),
        ActionState::VerificationPlanning => {
            Some(TransitionRule::Fixed(ActionState::VerificationExecution))
        }
        ActionState::VerificationExecution => Some(TransitionRule::Decision(&[
            (DecisionKey::Effective, ActionState::Closed),
            // Backward edge: an ineffective action is re-planned, not closed.
            (DecisionKey::Ineffective, ActionState::Planning),
        ])),
        ActionState::Closed => None,
    }
}

/// Compute the successor of `current` for the (optional) submitted decision.
///
/// A decision submitted at a fixed transition is ignored; a missing or
/// unrecognized decision at a branch point is rejected, never defaulted.
pub fn next_state<S: WorkflowState>(
    current: S,
    decision: Option<DecisionKey>,
) -> Result<S, TransitionError> {
    let rule = current.rule().ok_or(TransitionError::TerminalState {
        state: current.code(),
    })?;

    match rule {
        TransitionRule::Fixed(next) => Ok(next),
        TransitionRule::Decision(branches) => {
            let key = decision.ok_or(TransitionError::UnknownDecision {
                state: current.code(),
                decision: None,
            })?;
            branches
                .iter()
                .find(|(k, _)| *k == key)
                .map(|&(_, next)| next)
                .ok_or_else(|| TransitionError::UnknownDecision {
                    state: current.code(),
                    decision: Some(key.code().to_string()),
                })
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
