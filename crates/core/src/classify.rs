//! Classification enums carried on a finding record.
//!
//! These are descriptive attributes, not workflow-bearing: the lifecycle is
//! the same for a major nonconformity and an improvement opportunity.

use serde::{Deserialize, Serialize};

/// Where the finding was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    InternalAudit,
    ExternalAudit,
    CustomerComplaint,
    ManagementReview,
    DataAnalysis,
    Other,
}

/// What kind of finding it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    MajorNonconformity,
    MinorNonconformity,
    Risk,
    ImprovementOpportunity,
}

/// Treatment priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}
