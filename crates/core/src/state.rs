//! State catalogs for findings and corrective actions.
//!
//! Each catalog entry carries a stable machine code (the only vocabulary
//! written to persistence), a human label, a stage tag, and a terminal flag.
//! The catalog is the single source of truth for "is this a valid state":
//! any persisted or submitted code not decodable here is rejected upstream
//! as an unknown state, never coerced to a default.
//!
//! `from_code` additionally accepts the legacy state vocabulary found in old
//! data (`d1_iniciado`, `deteccion`, ...) as read-only aliases. Canonical
//! codes are always what gets written back.

use std::fmt;

use crate::transition::{self, TransitionRule};

/// Common contract for both entity state catalogs.
pub trait WorkflowState: Copy + Eq + fmt::Debug + Sized + 'static {
    /// Entity kind tag used in records and error messages.
    const ENTITY_KIND: &'static str;

    /// Stable machine code, used in persistence and transition lookups.
    fn code(self) -> &'static str;

    /// Human-readable label.
    fn label(self) -> &'static str;

    /// Name of the coarse stage this state belongs to.
    fn stage_name(self) -> &'static str;

    /// Terminal states have no outgoing transitions.
    fn is_terminal(self) -> bool;

    /// The state every freshly created entity starts in.
    fn initial() -> Self;

    /// Decode a persisted code (canonical or deprecated alias).
    fn from_code(code: &str) -> Option<Self>;

    /// Outgoing transition rule, `None` iff terminal.
    fn rule(self) -> Option<TransitionRule<Self>>;

    /// The full catalog, in lifecycle order.
    fn all() -> &'static [Self];
}

// ── Finding ─────────────────────────────────────────────────────────────────

/// Coarse phase grouping for finding states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingStage {
    Detection,
    Treatment,
    Verification,
}

impl FindingStage {
    pub fn name(self) -> &'static str {
        match self {
            FindingStage::Detection => "detection",
            FindingStage::Treatment => "treatment",
            FindingStage::Verification => "verification",
        }
    }
}

/// Lifecycle states of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FindingState {
    /// Initial state: the finding is recorded, nothing planned yet.
    Detected,
    /// Immediate (containment) action is planned with owner and date.
    ImmediateActionPlanned,
    /// Immediate action executed; root-cause analysis pending.
    ImmediateActionExecuted,
    /// Treatment decided a corrective action is required; parked until the
    /// linked action closes effectively.
    PendingCorrectiveAction,
    /// Verification of the treatment outcome has been carried out.
    VerificationExecuted,
    /// Terminal.
    Closed,
}

impl FindingState {
    pub fn stage(self) -> FindingStage {
        match self {
            FindingState::Detected => FindingStage::Detection,
            FindingState::ImmediateActionPlanned
            | FindingState::ImmediateActionExecuted
            | FindingState::PendingCorrectiveAction => FindingStage::Treatment,
            FindingState::VerificationExecuted | FindingState::Closed => {
                FindingStage::Verification
            }
        }
    }
}

impl WorkflowState for FindingState {
    const ENTITY_KIND: &'static str = "finding";

    fn code(self) -> &'static str {
        match self {
            FindingState::Detected => "detected",
            FindingState::ImmediateActionPlanned => "immediate_action_planned",
            FindingState::ImmediateActionExecuted => "immediate_action_executed",
            FindingState::PendingCorrectiveAction => "pending_corrective_action",
            FindingState::VerificationExecuted => "verification_executed",
            FindingState::Closed => "closed",
        }
    }

    fn label(self) -> &'static str {
        match self {
            FindingState::Detected => "Detected",
            FindingState::ImmediateActionPlanned => "Immediate action planned",
            FindingState::ImmediateActionExecuted => "Immediate action executed",
            FindingState::PendingCorrectiveAction => "Pending corrective action",
            FindingState::VerificationExecuted => "Verification executed",
            FindingState::Closed => "Closed",
        }
    }

    fn stage_name(self) -> &'static str {
        self.stage().name()
    }

    fn is_terminal(self) -> bool {
        matches!(self, FindingState::Closed)
    }

    fn initial() -> Self {
        FindingState::Detected
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "detected" | "deteccion" | "d1_iniciado" => Some(FindingState::Detected),
            "immediate_action_planned" | "planificacion_ai" | "d2_con_accion_inmediata" => {
                Some(FindingState::ImmediateActionPlanned)
            }
            "immediate_action_executed" | "ejecucion_ai" => {
                Some(FindingState::ImmediateActionExecuted)
            }
            "pending_corrective_action" | "con_accion_correctiva" => {
                Some(FindingState::PendingCorrectiveAction)
            }
            "verification_executed" | "verificacion" => Some(FindingState::VerificationExecuted),
            "closed" | "cerrado" => Some(FindingState::Closed),
            _ => None,
        }
    }

    fn rule(self) -> Option<TransitionRule<Self>> {
        transition::finding_rule(self)
    }

    fn all() -> &'static [Self] {
        &[
            FindingState::Detected,
            FindingState::ImmediateActionPlanned,
            FindingState::ImmediateActionExecuted,
            FindingState::PendingCorrectiveAction,
            FindingState::VerificationExecuted,
            FindingState::Closed,
        ]
    }
}

impl fmt::Display for FindingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ── Action ──────────────────────────────────────────────────────────────────

/// Coarse phase grouping for corrective-action states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionStage {
    Planning,
    Execution,
    VerificationPlanning,
    VerificationExecution,
}

impl ActionStage {
    pub fn name(self) -> &'static str {
        match self {
            ActionStage::Planning => "planning",
            ActionStage::Execution => "execution",
            ActionStage::VerificationPlanning => "verification_planning",
            ActionStage::VerificationExecution => "verification_execution",
        }
    }
}

/// Lifecycle states of a corrective action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionState {
    /// Initial state: root-cause detail and action plan being drafted.
    Planning,
    /// The planned action is being carried out.
    Execution,
    /// Verifier and verification date being scheduled.
    VerificationPlanning,
    /// Effectiveness verification carried out; outcome pending judgement.
    VerificationExecution,
    /// Terminal: closed with an effective outcome.
    Closed,
}

impl ActionState {
    pub fn stage(self) -> Option<ActionStage> {
        match self {
            ActionState::Planning => Some(ActionStage::Planning),
            ActionState::Execution => Some(ActionStage::Execution),
            ActionState::VerificationPlanning => Some(ActionStage::VerificationPlanning),
            ActionState::VerificationExecution => Some(ActionStage::VerificationExecution),
            ActionState::Closed => None,
        }
    }
}

impl WorkflowState for ActionState {
    const ENTITY_KIND: &'static str = "action";

    fn code(self) -> &'static str {
        match self {
            ActionState::Planning => "planning",
            ActionState::Execution => "execution",
            ActionState::VerificationPlanning => "verification_planning",
            ActionState::VerificationExecution => "verification_execution",
            ActionState::Closed => "closed",
        }
    }

    fn label(self) -> &'static str {
        match self {
            ActionState::Planning => "Planning",
            ActionState::Execution => "Execution",
            ActionState::VerificationPlanning => "Verification planning",
            ActionState::VerificationExecution => "Verification execution",
            ActionState::Closed => "Closed",
        }
    }

    fn stage_name(self) -> &'static str {
        match self.stage() {
            Some(stage) => stage.name(),
            None => "closed",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, ActionState::Closed)
    }

    fn initial() -> Self {
        ActionState::Planning
    }

    fn from_code(code: &str) -> Option<Self> {
        match code {
            "planning" | "planificacion" => Some(ActionState::Planning),
            "execution" | "ejecucion" => Some(ActionState::Execution),
            "verification_planning" | "planificacion_verificacion" => {
                Some(ActionState::VerificationPlanning)
            }
            "verification_execution" | "ejecucion_verificacion" => {
                Some(ActionState::VerificationExecution)
            }
            "closed" | "cerrado" => Some(ActionState::Closed),
            _ => None,
        }
    }

    fn rule(self) -> Option<TransitionRule<Self>> {
        transition::action_rule(self)
    }

    fn all() -> &'static [Self] {
        &[
            ActionState::Planning,
            ActionState::Execution,
            ActionState::VerificationPlanning,
            ActionState::VerificationExecution,
            ActionState::Closed,
        ]
    }
}

impl fmt::Display for ActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finding_codes_round_trip() {
        for &state in FindingState::all() {
            assert_eq!(FindingState::from_code(state.code()), Some(state));
        }
    }

    #[test]
    fn action_codes_round_trip() {
        for &state in ActionState::all() {
            assert_eq!(ActionState::from_code(state.code()), Some(state));
        }
    }

    #[test]
    fn deprecated_aliases_decode_to_canonical() {
        assert_eq!(
            FindingState::from_code("d1_iniciado"),
            Some(FindingState::Detected)
        );
        assert_eq!(
            FindingState::from_code("d2_con_accion_inmediata"),
            Some(FindingState::ImmediateActionPlanned)
        );
        assert_eq!(
            FindingState::from_code("deteccion"),
            Some(FindingState::Detected)
        );
        assert_eq!(
            FindingState::from_code("planificacion_ai"),
            Some(FindingState::ImmediateActionPlanned)
        );
        assert_eq!(
            ActionState::from_code("planificacion"),
            Some(ActionState::Planning)
        );
        assert_eq!(ActionState::from_code("cerrado"), Some(ActionState::Closed));
    }

    #[test]
    fn unknown_codes_are_rejected() {
        assert_eq!(FindingState::from_code("in_progress"), None);
        assert_eq!(FindingState::from_code(""), None);
        assert_eq!(ActionState::from_code("detected"), None);
    }

    #[test]
    fn exactly_one_terminal_state_per_catalog() {
        let finding_terminals: Vec<_> = FindingState::all()
            .iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(finding_terminals, vec![&FindingState::Closed]);

        let action_terminals: Vec<_> = ActionState::all()
            .iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(action_terminals, vec![&ActionState::Closed]);
    }

    #[test]
    fn stage_tags_cover_the_lifecycle() {
        assert_eq!(FindingState::Detected.stage(), FindingStage::Detection);
        assert_eq!(
            FindingState::PendingCorrectiveAction.stage(),
            FindingStage::Treatment
        );
        assert_eq!(FindingState::Closed.stage(), FindingStage::Verification);
        assert_eq!(ActionState::Execution.stage(), Some(ActionStage::Execution));
        assert_eq!(ActionState::Closed.stage(), None);
    }

    #[test]
    fn initial_states() {
        assert_eq!(FindingState::initial(), FindingState::Detected);
        assert_eq!(ActionState::initial(), ActionState::Planning);
    }
}
