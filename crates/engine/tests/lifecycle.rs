//! End-to-end lifecycle tests against the in-memory backend.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use capa_core::{Category, DecisionKey, Origin, Priority};
use capa_engine::{
    ActionController, FindingController, NewFinding, Payload, RequestContext, WorkflowError,
};
use capa_storage::{ActionRecord, FindingRecord, MemoryStorage, WorkflowStorage};

struct Env {
    storage: Arc<MemoryStorage>,
    findings: FindingController<MemoryStorage>,
    actions: ActionController<MemoryStorage>,
    ctx: RequestContext,
}

fn env() -> Env {
    let storage = Arc::new(MemoryStorage::new());
    Env {
        findings: FindingController::new(Arc::clone(&storage)),
        actions: ActionController::new(Arc::clone(&storage)),
        ctx: RequestContext::new("acme", "ana"),
        storage,
    }
}

fn payload(entries: &[(&str, Value)]) -> Payload {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn new_finding() -> NewFinding {
    NewFinding {
        origin: Origin::InternalAudit,
        category: Category::MinorNonconformity,
        priority: Priority::Medium,
        requirement_ref: Some("8.5.1".to_string()),
        title: "Coolant leak at press 4".to_string(),
        description: "Hydraulic coolant pooling under press 4".to_string(),
    }
}

/// Create a finding and advance it to the treatment-analysis branch point.
async fn finding_at_analysis(env: &Env) -> String {
    let finding = env.findings.create(&env.ctx, new_finding()).await.unwrap();
    env.findings
        .advance(
            &env.ctx,
            &finding.id,
            None,
            &payload(&[
                ("description", json!("contain the leak")),
                ("commitment_date", json!("2024-01-01")),
                ("owner", json!("Ana")),
            ]),
        )
        .await
        .unwrap();
    env.findings
        .advance(
            &env.ctx,
            &finding.id,
            None,
            &payload(&[("execution_date", json!("2024-01-03"))]),
        )
        .await
        .unwrap();
    finding.id
}

/// Drive an action from planning up to the verification-execution branch.
async fn action_to_verification(env: &Env, action_id: &str) {
    env.actions
        .advance(
            &env.ctx,
            action_id,
            None,
            &payload(&[("action_description", json!("replace worn seals fleet-wide"))]),
        )
        .await
        .unwrap();
    env.actions
        .advance(
            &env.ctx,
            action_id,
            None,
            &payload(&[("results", json!("seals replaced on all presses"))]),
        )
        .await
        .unwrap();
    env.actions
        .advance(
            &env.ctx,
            action_id,
            None,
            &payload(&[("verifier", json!("Luis"))]),
        )
        .await
        .unwrap();
}

/// Seed a finding record directly in storage, bypassing the controller.
async fn seed_finding(env: &Env, id: &str, state: &str, action_id: Option<&str>) {
    let record = FindingRecord {
        id: id.to_string(),
        tenant_id: env.ctx.tenant_id.clone(),
        origin: Origin::Other,
        category: Category::Risk,
        priority: Priority::Low,
        requirement_ref: None,
        title: "seeded".to_string(),
        description: "seeded".to_string(),
        state: state.to_string(),
        fields: Map::new(),
        action_id: action_id.map(str::to_string),
        version: 0,
        created_at: "2024-01-01T00:00:00Z".to_string(),
        updated_at: "2024-01-01T00:00:00Z".to_string(),
    };
    let mut snap = env.storage.begin_snapshot().await.unwrap();
    env.storage.insert_finding(&mut snap, record).await.unwrap();
    env.storage.commit_snapshot(snap).await.unwrap();
}

async fn seed_action(env: &Env, id: &str, finding_id: &str, state: &str) {
    let record = ActionRecord {
        id: id.to_string(),
        finding_id: finding_id.to_string(),
        tenant_id: env.ctx.tenant_id.clone(),
        state: state.to_string(),
        fields: Map::new(),
        version: 0,
        created_at: "2024-01-01T00:00:00Z".to_string(),
        updated_at: "2024-01-01T00:00:00Z".to_string(),
    };
    let mut snap = env.storage.begin_snapshot().await.unwrap();
    env.storage.insert_action(&mut snap, record).await.unwrap();
    env.storage.commit_snapshot(snap).await.unwrap();
}

// ── Scenario A ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn detected_advances_to_immediate_action_planned() {
    let env = env();
    let finding = env.findings.create(&env.ctx, new_finding()).await.unwrap();
    assert_eq!(finding.state, "detected");

    let updated = env
        .findings
        .advance(
            &env.ctx,
            &finding.id,
            None,
            &payload(&[
                ("description", json!("leak")),
                ("commitment_date", json!("2024-01-01")),
                ("owner", json!("Ana")),
            ]),
        )
        .await
        .unwrap();
    assert_eq!(updated.state, "immediate_action_planned");
    assert_eq!(updated.fields["owner"], json!("Ana"));
    assert_eq!(updated.version, 1);
}

#[tokio::test]
async fn round_trip_merges_payload_and_preserves_prior_fields() {
    let env = env();
    let id = finding_at_analysis(&env).await;
    let fetched = env.findings.get(&env.ctx, &id).await.unwrap();
    assert_eq!(fetched.state, "immediate_action_executed");
    // Fields from both earlier stages survive.
    assert_eq!(fetched.fields["owner"], json!("Ana"));
    assert_eq!(fetched.fields["execution_date"], json!("2024-01-03"));
    assert_eq!(fetched.version, 2);
}

// ── Scenario B ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn no_action_needed_closes_without_spawning() {
    let env = env();
    let id = finding_at_analysis(&env).await;

    let closed = env
        .findings
        .advance(
            &env.ctx,
            &id,
            Some(DecisionKey::NoActionNeeded),
            &payload(&[("analysis", json!("root cause isolated"))]),
        )
        .await
        .unwrap();
    assert_eq!(closed.state, "closed");
    assert!(closed.action_id.is_none());

    // Terminal: any further transition is rejected.
    let err = env
        .findings
        .advance(&env.ctx, &id, None, &Payload::new())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::TerminalStateViolation { .. }));
}

// ── Scenario C ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn requires_action_spawns_linked_action_in_planning() {
    let env = env();
    let id = finding_at_analysis(&env).await;

    let parked = env
        .findings
        .advance(
            &env.ctx,
            &id,
            Some(DecisionKey::RequiresAction),
            &payload(&[("analysis", json!("systemic"))]),
        )
        .await
        .unwrap();
    assert_eq!(parked.state, "pending_corrective_action");

    let action_id = parked.action_id.expect("action linked");
    let action = env.actions.get(&env.ctx, &action_id).await.unwrap();
    assert_eq!(action.state, "planning");
    assert_eq!(action.finding_id, id);
}

// ── Scenario D ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn ineffective_verification_loops_action_back_to_planning() {
    let env = env();
    let id = finding_at_analysis(&env).await;
    let parked = env
        .findings
        .advance(
            &env.ctx,
            &id,
            Some(DecisionKey::RequiresAction),
            &payload(&[("analysis", json!("systemic"))]),
        )
        .await
        .unwrap();
    let action_id = parked.action_id.unwrap();
    action_to_verification(&env, &action_id).await;

    let looped = env
        .actions
        .advance(
            &env.ctx,
            &action_id,
            Some(DecisionKey::Ineffective),
            &payload(&[("observations", json!("recurred"))]),
        )
        .await
        .unwrap();
    assert_eq!(looped.state, "planning");

    // The parent finding stays parked.
    let finding = env.findings.get(&env.ctx, &id).await.unwrap();
    assert_eq!(finding.state, "pending_corrective_action");
}

// ── Scenario E ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn effective_close_resumes_and_closes_the_finding() {
    let env = env();
    let id = finding_at_analysis(&env).await;
    let parked = env
        .findings
        .advance(
            &env.ctx,
            &id,
            Some(DecisionKey::RequiresAction),
            &payload(&[("analysis", json!("systemic"))]),
        )
        .await
        .unwrap();
    let action_id = parked.action_id.unwrap();

    // First pass is judged ineffective, loops back, then runs again.
    action_to_verification(&env, &action_id).await;
    env.actions
        .advance(
            &env.ctx,
            &action_id,
            Some(DecisionKey::Ineffective),
            &payload(&[("observations", json!("recurred"))]),
        )
        .await
        .unwrap();
    action_to_verification(&env, &action_id).await;

    let closed = env
        .actions
        .advance(
            &env.ctx,
            &action_id,
            Some(DecisionKey::Effective),
            &payload(&[("observations", json!("no recurrence in 90 days"))]),
        )
        .await
        .unwrap();
    assert_eq!(closed.state, "closed");

    // Bridge drove the finding through verification to closed.
    let finding = env.findings.get(&env.ctx, &id).await.unwrap();
    assert_eq!(finding.state, "closed");

    // History shows the bridge-driven resume path.
    let history = env
        .storage
        .list_transitions(&env.ctx.tenant_id, &id)
        .await
        .unwrap();
    let path: Vec<&str> = history.iter().map(|t| t.to_state.as_str()).collect();
    assert_eq!(
        path,
        vec![
            "immediate_action_planned",
            "immediate_action_executed",
            "pending_corrective_action",
            "verification_executed",
            "closed",
        ]
    );
}

// ── Rejections leave no trace ───────────────────────────────────────────────

#[tokio::test]
async fn missing_required_fields_rejected_before_any_write() {
    let env = env();
    let finding = env.findings.create(&env.ctx, new_finding()).await.unwrap();

    let err = env
        .findings
        .advance(&env.ctx, &finding.id, None, &Payload::new())
        .await
        .unwrap_err();
    match err {
        WorkflowError::Validation { missing } => {
            assert_eq!(missing, vec!["description", "commitment_date", "owner"]);
        }
        other => panic!("expected Validation, got {other:?}"),
    }

    let unchanged = env.findings.get(&env.ctx, &finding.id).await.unwrap();
    assert_eq!(unchanged.state, "detected");
    assert!(unchanged.fields.is_empty());
    assert_eq!(unchanged.version, 0);
}

#[tokio::test]
async fn unknown_decision_rejected_without_mutation() {
    let env = env();
    let id = finding_at_analysis(&env).await;
    let before = env.findings.get(&env.ctx, &id).await.unwrap();

    // `effective` belongs to verification, not the treatment branch.
    let err = env
        .findings
        .advance(
            &env.ctx,
            &id,
            Some(DecisionKey::Effective),
            &payload(&[("analysis", json!("systemic"))]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::UnknownDecision { .. }));

    let after = env.findings.get(&env.ctx, &id).await.unwrap();
    assert_eq!(after.state, before.state);
    assert_eq!(after.fields, before.fields);
    assert_eq!(after.version, before.version);
}

#[tokio::test]
async fn branch_point_without_decision_is_rejected() {
    let env = env();
    let id = finding_at_analysis(&env).await;
    let err = env
        .findings
        .advance(&env.ctx, &id, None, &payload(&[("analysis", json!("x"))]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::UnknownDecision { decision: None, .. }
    ));
}

// ── Bridge invariant ────────────────────────────────────────────────────────

#[tokio::test]
async fn second_spawn_while_action_open_is_rejected() {
    let env = env();
    seed_finding(&env, "f-1", "immediate_action_executed", Some("a-open")).await;
    seed_action(&env, "a-open", "f-1", "planning").await;

    let err = env
        .findings
        .advance(
            &env.ctx,
            "f-1",
            Some(DecisionKey::RequiresAction),
            &payload(&[("analysis", json!("still systemic"))]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::ActionAlreadyOpen { .. }));

    let unchanged = env.findings.get(&env.ctx, "f-1").await.unwrap();
    assert_eq!(unchanged.state, "immediate_action_executed");
}

#[tokio::test]
async fn closed_prior_action_permits_a_fresh_spawn() {
    let env = env();
    seed_finding(&env, "f-1", "immediate_action_executed", Some("a-done")).await;
    seed_action(&env, "a-done", "f-1", "closed").await;

    let parked = env
        .findings
        .advance(
            &env.ctx,
            "f-1",
            Some(DecisionKey::RequiresAction),
            &payload(&[("analysis", json!("recurred later"))]),
        )
        .await
        .unwrap();
    let new_action_id = parked.action_id.unwrap();
    assert_ne!(new_action_id, "a-done");

    let action = env.actions.get(&env.ctx, &new_action_id).await.unwrap();
    assert_eq!(action.state, "planning");
}

#[tokio::test]
async fn parked_finding_cannot_bypass_its_open_action() {
    let env = env();
    seed_finding(&env, "f-parked", "pending_corrective_action", Some("a-open")).await;
    seed_action(&env, "a-open", "f-parked", "planning").await;

    // Direct advances out of the parked state are rejected while the
    // linked action is open.
    let err = env
        .findings
        .advance(&env.ctx, "f-parked", None, &Payload::new())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::FindingParked { .. }));

    let unchanged = env.findings.get(&env.ctx, "f-parked").await.unwrap();
    assert_eq!(unchanged.state, "pending_corrective_action");

    // The action's own effective close remains the way through.
    action_to_verification(&env, "a-open").await;
    env.actions
        .advance(
            &env.ctx,
            "a-open",
            Some(DecisionKey::Effective),
            &payload(&[("observations", json!("no recurrence"))]),
        )
        .await
        .unwrap();
    let resumed = env.findings.get(&env.ctx, "f-parked").await.unwrap();
    assert_eq!(resumed.state, "closed");
}

#[tokio::test]
async fn parked_finding_with_closed_linked_action_advances() {
    let env = env();
    seed_finding(&env, "f-recov", "pending_corrective_action", Some("a-done")).await;
    seed_action(&env, "a-done", "f-recov", "closed").await;

    let resumed = env
        .findings
        .advance(&env.ctx, "f-recov", None, &Payload::new())
        .await
        .unwrap();
    assert_eq!(resumed.state, "verification_executed");
}

// ── State vocabulary ────────────────────────────────────────────────────────

#[tokio::test]
async fn deprecated_alias_codes_decode_and_are_canonicalized() {
    let env = env();
    seed_finding(&env, "f-legacy", "d1_iniciado", None).await;

    let updated = env
        .findings
        .advance(
            &env.ctx,
            "f-legacy",
            None,
            &payload(&[
                ("description", json!("contain")),
                ("commitment_date", json!("2024-01-01")),
                ("owner", json!("Ana")),
            ]),
        )
        .await
        .unwrap();
    assert_eq!(updated.state, "immediate_action_planned");
}

#[tokio::test]
async fn unknown_state_code_is_fatal_for_the_entity() {
    let env = env();
    seed_finding(&env, "f-corrupt", "in_progress", None).await;

    let err = env
        .findings
        .advance(&env.ctx, "f-corrupt", None, &Payload::new())
        .await
        .unwrap_err();
    match err {
        WorkflowError::UnknownState { code, .. } => assert_eq!(code, "in_progress"),
        other => panic!("expected UnknownState, got {other:?}"),
    }
}

#[tokio::test]
async fn ineffective_finding_verification_reopens_detection() {
    let env = env();
    seed_finding(&env, "f-ver", "verification_executed", None).await;

    let reopened = env
        .findings
        .advance(
            &env.ctx,
            "f-ver",
            Some(DecisionKey::Ineffective),
            &Payload::new(),
        )
        .await
        .unwrap();
    assert_eq!(reopened.state, "detected");
}

// ── Tenant scope ────────────────────────────────────────────────────────────

#[tokio::test]
async fn foreign_tenant_sees_not_found() {
    let env = env();
    let finding = env.findings.create(&env.ctx, new_finding()).await.unwrap();

    let other = RequestContext::new("globex", "bob");
    let err = env
        .findings
        .advance(&other, &finding.id, None, &Payload::new())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotFound { .. }));
}
