//! Storage boundary for the CAPA workflow engine.
//!
//! The engine consumes persistence exclusively through [`WorkflowStorage`]:
//! fetch-by-id scoped to a tenant, and a conditional write that replaces the
//! record only if its state has not changed since it was fetched. The wire
//! schema behind an implementation is out of scope here.

pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::MemoryStorage;
pub use record::{ActionRecord, FindingRecord, TransitionRecord};
pub use traits::WorkflowStorage;
