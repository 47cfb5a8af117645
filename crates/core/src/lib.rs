//! Workflow core for the finding / corrective-action engine.
//!
//! A finding (a recorded nonconformity, audit observation, risk, or
//! improvement opportunity) walks a fixed lifecycle from detection through
//! immediate-action treatment to verification. When treatment decides a
//! formal corrective action is required, the finding spawns an Action entity
//! with its own lifecycle; the action closing effectively is what unblocks
//! the finding's closure.
//!
//! This crate is the pure domain core: the state catalogs, the transition
//! table (including the ineffective-verification backward edge), and the
//! stage resolver. No IO, no async -- persistence and orchestration live in
//! `capa-storage` and `capa-engine`.

pub mod classify;
pub mod resolver;
pub mod state;
pub mod transition;

pub use classify::{Category, Origin, Priority};
pub use resolver::{resolve_action, resolve_finding, FieldSpec, StageHandler};
pub use state::{ActionStage, ActionState, FindingStage, FindingState, WorkflowState};
pub use transition::{next_state, DecisionKey, TransitionError, TransitionRule};
