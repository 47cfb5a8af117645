//! Lifecycle controllers for the finding / corrective-action workflow.
//!
//! The engine orchestrates one entity's progression at a time: load the
//! current record, resolve its stage handler, validate the submitted payload
//! and decision against the transition table, merge the payload into the
//! accumulated fields, and persist the new state -- all inside one storage
//! snapshot, so a failed transition leaves no observable change.
//!
//! Transitions are request-driven and complete synchronously; the engine
//! never retries. Concurrent submissions against the same entity are
//! serialized by the storage collaborator's compare-state-before-commit
//! check and surface as [`WorkflowError::ConcurrentModification`], which the
//! caller may resolve by re-fetching and resubmitting.

mod action;
mod bridge;
mod context;
mod error;
mod finding;
mod ids;
mod payload;

pub use action::ActionController;
pub use context::RequestContext;
pub use error::WorkflowError;
pub use finding::{FindingController, NewFinding};
pub use payload::Payload;
