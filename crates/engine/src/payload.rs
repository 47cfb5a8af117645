//! Stage payload validation and merge.

use serde_json::Value;

use capa_core::{StageHandler, WorkflowState};

use crate::error::WorkflowError;

/// The stage-specific payload submitted with a transition.
pub type Payload = serde_json::Map<String, Value>;

/// Check that every required field of the stage handler is present and
/// non-null. Reports ALL missing fields at once.
pub(crate) fn validate_payload<S: WorkflowState>(
    handler: &StageHandler<S>,
    payload: &Payload,
) -> Result<(), WorkflowError> {
    let missing: Vec<String> = handler
        .required_fields
        .iter()
        .filter(|f| payload.get(f.name).map_or(true, Value::is_null))
        .map(|f| f.name.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(WorkflowError::Validation { missing })
    }
}

/// Fold the payload into the record's accumulated fields. Payload keys win;
/// keys not in the payload are left untouched.
pub(crate) fn merge_fields(fields: &mut Payload, payload: &Payload) {
    for (key, value) in payload {
        fields.insert(key.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capa_core::{resolve_finding, FindingState};
    use serde_json::json;

    fn payload_of(entries: &[(&str, Value)]) -> Payload {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn all_missing_fields_reported_at_once() {
        let handler = resolve_finding(FindingState::Detected).unwrap();
        let err = validate_payload(&handler, &Payload::new()).unwrap_err();
        match err {
            WorkflowError::Validation { missing } => {
                assert_eq!(missing, vec!["description", "commitment_date", "owner"]);
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn null_counts_as_missing() {
        let handler = resolve_finding(FindingState::ImmediateActionPlanned).unwrap();
        let payload = payload_of(&[("execution_date", Value::Null)]);
        assert!(validate_payload(&handler, &payload).is_err());
    }

    #[test]
    fn extra_fields_are_allowed() {
        let handler = resolve_finding(FindingState::ImmediateActionPlanned).unwrap();
        let payload = payload_of(&[
            ("execution_date", json!("2024-02-01")),
            ("comments", json!("done at the line")),
        ]);
        assert!(validate_payload(&handler, &payload).is_ok());
    }

    #[test]
    fn merge_overwrites_and_preserves() {
        let mut fields = payload_of(&[("owner", json!("Ana")), ("analysis", json!("old"))]);
        let payload = payload_of(&[("analysis", json!("systemic"))]);
        merge_fields(&mut fields, &payload);
        assert_eq!(fields["owner"], json!("Ana"));
        assert_eq!(fields["analysis"], json!("systemic"));
    }
}
