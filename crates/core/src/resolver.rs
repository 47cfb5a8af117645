//! Workflow resolver: which stage form handles a state, and how it advances.
//!
//! `resolve_finding` / `resolve_action` return the validation metadata for
//! advancing out of a state: the payload fields that must be present, the
//! stage tag the presentation layer selects its form by, and the transition
//! rule (fixed or decision-keyed). Resolution returns `None` exactly for
//! terminal states. This is metadata only -- it never executes a transition.

use crate::state::{ActionState, FindingState, WorkflowState};
use crate::transition::TransitionRule;

/// One payload field the caller must supply to advance out of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Payload key.
    pub name: &'static str,
    /// Human label for the form rendering the field.
    pub label: &'static str,
}

/// Stage form/handler metadata for one non-terminal state.
#[derive(Debug, Clone, Copy)]
pub struct StageHandler<S: WorkflowState> {
    pub state: S,
    pub stage: &'static str,
    pub required_fields: &'static [FieldSpec],
    pub rule: TransitionRule<S>,
}

/// Resolve the stage handler for a finding state. `None` iff terminal.
pub fn resolve_finding(state: FindingState) -> Option<StageHandler<FindingState>> {
    // Inline struct literals: these promote to 'static, a const fn call in
    // a reference expression does not.
    let required_fields: &'static [FieldSpec] = match state {
        FindingState::Detected => &[
            FieldSpec { name: "description", label: "Immediate action description" },
            FieldSpec { name: "commitment_date", label: "Commitment date" },
            FieldSpec { name: "owner", label: "Immediate action owner" },
        ],
        FindingState::ImmediateActionPlanned => &[FieldSpec {
            name: "execution_date",
            label: "Immediate action execution date",
        }],
        FindingState::ImmediateActionExecuted => {
            &[FieldSpec { name: "analysis", label: "Root-cause analysis" }]
        }
        // Resume and verification are bridge-driven; verification_comments
        // is accepted but optional.
        FindingState::PendingCorrectiveAction | FindingState::VerificationExecuted => &[],
        FindingState::Closed => return None,
    };
    Some(StageHandler {
        state,
        stage: state.stage_name(),
        required_fields,
        rule: state.rule()?,
    })
}

/// Resolve the stage handler for an action state. `None` iff terminal.
pub fn resolve_action(state: ActionState) -> Option<StageHandler<ActionState>> {
    let required_fields: &'static [FieldSpec] = match state {
        ActionState::Planning => &[FieldSpec {
            name: "action_description",
            label: "Detailed action description",
        }],
        ActionState::Execution => &[FieldSpec { name: "results", label: "Execution results" }],
        ActionState::VerificationPlanning => &[FieldSpec { name: "verifier", label: "Verifier" }],
        ActionState::VerificationExecution => {
            &[FieldSpec { name: "observations", label: "Verification observations" }]
        }
        ActionState::Closed => return None,
    };
    Some(StageHandler {
        state,
        stage: state.stage_name(),
        required_fields,
        rule: state.rule()?,
    })
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_non_terminal_finding_state_resolves() {
        for &state in FindingState::all() {
            assert_eq!(resolve_finding(state).is_some(), !state.is_terminal());
        }
    }

    #[test]
    fn every_non_terminal_action_state_resolves() {
        for &state in ActionState::all() {
            assert_eq!(resolve_action(state).is_some(), !state.is_terminal());
        }
    }

    #[test]
    fn detected_requires_the_immediate_action_plan() {
        let handler = resolve_finding(FindingState::Detected).unwrap();
        let names: Vec<_> = handler.required_fields.iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["description", "commitment_date", "owner"]);
        assert_eq!(handler.stage, "detection");
    }

    #[test]
    fn handler_rule_matches_the_transition_table() {
        let handler = resolve_finding(FindingState::ImmediateActionExecuted).unwrap();
        match handler.rule {
            TransitionRule::Decision(branches) => assert_eq!(branches.len(), 2),
            TransitionRule::Fixed(_) => panic!("treatment analysis is a branch point"),
        }
    }

    #[test]
    fn verification_execution_requires_observations() {
        let handler = resolve_action(ActionState::VerificationExecution).unwrap();
        let names: Vec<_> = handler.required_fields.iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["observations"]);
    }
}
