use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{ActionRecord, FindingRecord, TransitionRecord};

/// The storage trait for CAPA workflow backends.
///
/// A `WorkflowStorage` implementation provides durable, transactional storage
/// for findings, corrective actions, and transition history.
///
/// ## Snapshot semantics
///
/// All mutating operations take `&mut Self::Snapshot`, a type representing an
/// in-progress transaction. The lifecycle is:
///
/// 1. `begin_snapshot()` — start a transaction, returns a `Snapshot`
/// 2. Call mutating methods with `&mut snapshot`
/// 3. `commit_snapshot(snapshot)` — commit and consume the transaction
///    OR `abort_snapshot(snapshot)` — roll back and consume the transaction
///
/// If a `Snapshot` is dropped without committing, the underlying transaction
/// MUST be rolled back.
///
/// ## State-compare conflict detection
///
/// `update_finding` / `update_action` are conditional writes:
/// `UPDATE WHERE state = expected_state`. If zero rows are affected, the
/// method (or the final commit) returns `Err(StorageError::StateConflict)`.
/// This check is what serializes concurrent transitions against one entity:
/// a stale-state write is rejected, never silently overwritten.
///
/// ## Tenant scoping
///
/// Every read takes the caller's tenant id. A record belonging to another
/// tenant is reported as `NotFound`, indistinguishable from a missing row.
///
/// ## Thread safety
///
/// Implementations must be `Send + Sync + 'static` to be shared across async
/// task boundaries.
#[async_trait]
pub trait WorkflowStorage: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this storage backend.
    type Snapshot: Send;

    // ── Snapshot lifecycle ───────────────────────────────────────────────────

    /// Begin a new snapshot (transaction).
    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    /// Commit a snapshot, making all mutations durable.
    ///
    /// Conditional writes staged in the snapshot are re-validated at commit;
    /// a lost race surfaces here as `StateConflict`.
    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    /// Abort (roll back) a snapshot, discarding all mutations.
    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Mutations (within snapshot) ──────────────────────────────────────────

    /// Insert a new finding. `AlreadyExists` if the id is taken.
    async fn insert_finding(
        &self,
        snapshot: &mut Self::Snapshot,
        record: FindingRecord,
    ) -> Result<(), StorageError>;

    /// Insert a new corrective action. `AlreadyExists` if the id is taken.
    async fn insert_action(
        &self,
        snapshot: &mut Self::Snapshot,
        record: ActionRecord,
    ) -> Result<(), StorageError>;

    /// Read a finding's current record, locking the row for update.
    async fn get_finding_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        tenant_id: &str,
        finding_id: &str,
    ) -> Result<FindingRecord, StorageError>;

    /// Read an action's current record, locking the row for update.
    async fn get_action_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        tenant_id: &str,
        action_id: &str,
    ) -> Result<ActionRecord, StorageError>;

    /// Replace a finding's state and fields, conditional on its persisted
    /// state still being `expected_state`. Returns the bumped version.
    async fn update_finding(
        &self,
        snapshot: &mut Self::Snapshot,
        expected_state: &str,
        record: FindingRecord,
    ) -> Result<i64, StorageError>;

    /// Replace an action's state and fields, conditional on its persisted
    /// state still being `expected_state`. Returns the bumped version.
    async fn update_action(
        &self,
        snapshot: &mut Self::Snapshot,
        expected_state: &str,
        record: ActionRecord,
    ) -> Result<i64, StorageError>;

    /// Insert a transition history row.
    ///
    /// Must be staged in the SAME snapshot as the entity update it records:
    /// no state change without a history row.
    async fn insert_transition(
        &self,
        snapshot: &mut Self::Snapshot,
        record: TransitionRecord,
    ) -> Result<(), StorageError>;

    // ── Reads (outside snapshot) ─────────────────────────────────────────────

    /// Read a finding without locking.
    async fn get_finding(
        &self,
        tenant_id: &str,
        finding_id: &str,
    ) -> Result<FindingRecord, StorageError>;

    /// Read an action without locking.
    async fn get_action(
        &self,
        tenant_id: &str,
        action_id: &str,
    ) -> Result<ActionRecord, StorageError>;

    /// List a tenant's findings, optionally filtered by state code.
    async fn list_findings(
        &self,
        tenant_id: &str,
        state_filter: Option<&str>,
    ) -> Result<Vec<FindingRecord>, StorageError>;

    /// List the transition history of one entity, oldest first.
    async fn list_transitions(
        &self,
        tenant_id: &str,
        entity_id: &str,
    ) -> Result<Vec<TransitionRecord>, StorageError>;
}
