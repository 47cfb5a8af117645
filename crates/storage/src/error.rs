/// All errors that can be returned by a WorkflowStorage implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The entity's persisted state changed between fetch and write. The
    /// conditional write found a different state than `expected_state`.
    #[error("state conflict on {entity_kind} {id}: expected state '{expected_state}'")]
    StateConflict {
        entity_kind: &'static str,
        id: String,
        expected_state: String,
    },

    /// No record with the given id, or the record belongs to another tenant.
    /// Implementations must not distinguish the two cases.
    #[error("{entity_kind} not found: {id}")]
    NotFound { entity_kind: &'static str, id: String },

    /// A record with this id already exists.
    #[error("{entity_kind} already exists: {id}")]
    AlreadyExists { entity_kind: &'static str, id: String },

    /// A backend-specific storage error (connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
