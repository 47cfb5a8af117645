//! Conformance test suite for `WorkflowStorage` implementations.
//!
//! A backend-agnostic suite any `WorkflowStorage` implementation can run to
//! verify correctness. The suite covers:
//!
//! - **Initialization**: record creation, duplicate detection, not-found
//! - **Snapshot isolation**: uncommitted writes invisible, abort discards
//! - **State-compare OCC**: stale expected-state writes rejected, exactly
//!   one winner under concurrent commits
//! - **Tenant scoping**: cross-tenant reads are `NotFound`
//! - **History coupling**: transition rows commit atomically with the
//!   entity update they record
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use capa_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_storage().await
//!     }).await;
//!     assert_eq!(report.failed, 0, "{report}");
//! }
//! ```

mod history;
mod init;
mod occ;
mod scoping;
mod snapshot;

use std::fmt;
use std::future::Future;

use serde_json::Map;

use capa_core::{Category, Origin, Priority};

use crate::record::{ActionRecord, FindingRecord, TransitionRecord};
use crate::WorkflowStorage;

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "init", "occ").
    pub category: String,
    /// Test name.
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        let (passed, message) = match result {
            Ok(()) => (true, None),
            Err(msg) => (false, Some(msg)),
        };
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed,
            message,
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();
    results.extend(init::run_init_tests(&factory).await);
    results.extend(snapshot::run_snapshot_tests(&factory).await);
    results.extend(occ::run_occ_tests(&factory).await);
    results.extend(scoping::run_scoping_tests(&factory).await);
    results.extend(history::run_history_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.len() - passed;
    ConformanceReport {
        total: results.len(),
        passed,
        failed,
        results,
    }
}

// ── Fixture helpers ─────────────────────────────────────────────────────────

const FIXTURE_TS: &str = "2024-01-01T00:00:00Z";

pub(super) fn sample_finding(id: &str, tenant_id: &str, state: &str) -> FindingRecord {
    FindingRecord {
        id: id.to_string(),
        tenant_id: tenant_id.to_string(),
        origin: Origin::InternalAudit,
        category: Category::MinorNonconformity,
        priority: Priority::Medium,
        requirement_ref: None,
        title: "Calibration record missing".to_string(),
        description: "Gauge 12 has no calibration record for Q3".to_string(),
        state: state.to_string(),
        fields: Map::new(),
        action_id: None,
        version: 0,
        created_at: FIXTURE_TS.to_string(),
        updated_at: FIXTURE_TS.to_string(),
    }
}

pub(super) fn sample_action(
    id: &str,
    finding_id: &str,
    tenant_id: &str,
    state: &str,
) -> ActionRecord {
    ActionRecord {
        id: id.to_string(),
        finding_id: finding_id.to_string(),
        tenant_id: tenant_id.to_string(),
        state: state.to_string(),
        fields: Map::new(),
        version: 0,
        created_at: FIXTURE_TS.to_string(),
        updated_at: FIXTURE_TS.to_string(),
    }
}

pub(super) fn sample_transition(
    id: &str,
    tenant_id: &str,
    entity_id: &str,
    from_state: &str,
    to_state: &str,
) -> TransitionRecord {
    TransitionRecord {
        id: id.to_string(),
        tenant_id: tenant_id.to_string(),
        entity_kind: "finding".to_string(),
        entity_id: entity_id.to_string(),
        from_state: from_state.to_string(),
        to_state: to_state.to_string(),
        decision: None,
        actor: "conformance".to_string(),
        recorded_at: FIXTURE_TS.to_string(),
    }
}
