//! Audit status types exposed to polling collaborators.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Evaluation, PipelineRun, ValueSet};

/// Progress of a run's background audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    /// Conscience/Spirit have not finished yet.
    Pending,
    /// The ledger record is written.
    Complete,
    /// The audit failed or timed out and will never complete.
    Abandoned,
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditStatus::Pending => write!(f, "pending"),
            AuditStatus::Complete => write!(f, "complete"),
            AuditStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

/// Answer to an audit query for one run.
///
/// `ledger`, `evaluations` and `spirit_score` are only filled once the
/// status is `complete`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditReport {
    pub run_id: Uuid,
    pub status: AuditStatus,
    /// The full ledger record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ledger: Option<PipelineRun>,
    pub evaluations: Vec<Evaluation>,
    /// Name of the value set the run was graded against.
    pub profile: String,
    /// The value statements of that set.
    pub values: Vec<String>,
    /// Score on the pipeline's native 1-5 scale.
    pub spirit_score: Option<u8>,
}

impl AuditReport {
    /// Report for a run whose audit has not produced a record.
    pub fn unfinished(run_id: Uuid, status: AuditStatus, value_set: &ValueSet) -> Self {
        Self {
            run_id,
            status,
            ledger: None,
            evaluations: Vec::new(),
            profile: value_set.name.clone(),
            values: value_set.definition.clone(),
            spirit_score: None,
        }
    }

    /// Report for a run with a written ledger record.
    pub fn complete(run: PipelineRun) -> Self {
        Self {
            run_id: run.run_id,
            status: AuditStatus::Complete,
            evaluations: run.evaluations.clone(),
            profile: run.value_set.name.clone(),
            values: run.value_set.definition.clone(),
            spirit_score: run.spirit_score,
            ledger: Some(run),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_report_has_no_ledger() {
        let set = ValueSet::from_text("Test", "1. Commitment to truth");
        let report = AuditReport::unfinished(Uuid::new_v4(), AuditStatus::Pending, &set);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["status"], "pending");
        assert_eq!(json["profile"], "Test");
        assert_eq!(json["values"][0], "1. Commitment to truth");
        assert!(json.get("ledger").is_none());
        assert!(json["spirit_score"].is_null());
    }
}
