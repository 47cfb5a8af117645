use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use capa_core::{Category, Origin, Priority};

/// A finding as stored in the backend.
///
/// `state` is the wire code of a catalog state (deprecated aliases may occur
/// in old rows; the engine decodes them). `fields` is the payload accumulated
/// across stage transitions; the engine merges into it and never drops keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindingRecord {
    pub id: String,
    pub tenant_id: String,
    pub origin: Origin,
    pub category: Category,
    pub priority: Priority,
    /// Reference to the violated requirement clause, if any.
    pub requirement_ref: Option<String>,
    pub title: String,
    pub description: String,
    pub state: String,
    pub fields: Map<String, Value>,
    /// Id of the spawned corrective action, set when treatment selects the
    /// requires-action branch. Re-linked on each spawn; prior closed actions
    /// keep their own back-reference.
    pub action_id: Option<String>,
    pub version: i64,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub created_at: String,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub updated_at: String,
}

/// A corrective action as stored in the backend.
///
/// `finding_id` is a lookup relation back to the originating finding, not
/// ownership: the action's lifecycle proceeds independently.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: String,
    pub finding_id: String,
    pub tenant_id: String,
    pub state: String,
    pub fields: Map<String, Value>,
    pub version: i64,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub created_at: String,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub updated_at: String,
}

/// History row recorded with every committed state change, in the same
/// snapshot as the entity update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub id: String,
    pub tenant_id: String,
    /// `"finding"` or `"action"`.
    pub entity_kind: String,
    pub entity_id: String,
    pub from_state: String,
    pub to_state: String,
    /// Decision key code submitted at a branch point, if any.
    pub decision: Option<String>,
    /// User who triggered the transition.
    pub actor: String,
    /// ISO 8601 / RFC 3339 timestamp string.
    pub recorded_at: String,
}
