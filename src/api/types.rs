//! API request and response types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::{ValueSet, WillDecision};

// ==================== Runs ====================

/// Request to run a prompt through the pipeline.
///
/// `values` wins over `value_set`; with neither, the configured default
/// set is used.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRunRequest {
    /// The user prompt.
    pub prompt: String,
    /// Name of a configured value set.
    #[serde(default)]
    pub value_set: Option<String>,
    /// An ad-hoc value set for this run only.
    #[serde(default)]
    pub values: Option<ValueSet>,
}

/// Caller-visible result of a run.
///
/// The audit continues in the background; poll
/// `/v1/runs/{id}/audit` for the Conscience and Spirit results.
#[derive(Debug, Serialize, ToSchema)]
pub struct CreateRunResponse {
    pub run_id: Uuid,
    /// The released answer or the suppression notice.
    pub final_output: String,
    pub will_decision: WillDecision,
}

// ==================== Value Sets ====================

/// One configured value set.
#[derive(Debug, Serialize, ToSchema)]
pub struct ValueSetSummary {
    pub name: String,
    /// The value statements, in order.
    pub values: Vec<String>,
    /// Whether runs without an explicit set use this one.
    pub is_default: bool,
}

/// Response for listing value sets.
#[derive(Debug, Serialize, ToSchema)]
pub struct ListValueSetsResponse {
    pub value_sets: Vec<ValueSetSummary>,
    /// Name of the default set.
    pub default: String,
}

// ==================== Health ====================

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
    /// Where completed runs are recorded.
    pub ledger: String,
    /// Runs whose audit state is held in memory.
    pub tracked_runs: usize,
    /// Timestamp.
    pub timestamp: String,
}
