//! Pipeline run domain types.
//!
//! A `PipelineRun` is created at run start, filled in by each stage, and
//! serialized as one ledger line once Spirit completes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Evaluation, ValueSet};

/// Outcome of the Will gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum WillDecision {
    /// The Intellect answer is released unchanged.
    Approved,
    /// The answer is replaced by the suppression notice.
    Blocked,
}

impl std::fmt::Display for WillDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WillDecision::Approved => write!(f, "approved"),
            WillDecision::Blocked => write!(f, "blocked"),
        }
    }
}

/// One full pipeline run, in ledger record form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    /// Run identifier, used by the audit query.
    pub run_id: Uuid,
    /// When the run started.
    pub timestamp: DateTime<Utc>,
    /// The value set graded against.
    pub value_set: ValueSet,
    pub user_prompt: String,
    pub intellect_output: String,
    pub intellect_reflection: String,
    /// Either exactly `intellect_output` or the suppression notice.
    pub final_output: String,
    pub will_decision: WillDecision,
    /// Raw Conscience critique text.
    pub conscience_feedback: String,
    pub evaluations: Vec<Evaluation>,
    /// Aggregate score on the 1-5 scale; null when nothing could be scored.
    pub spirit_score: Option<u8>,
    pub spirit_reflection: String,
}

impl PipelineRun {
    /// Start a new run record.
    pub fn new(prompt: impl Into<String>, value_set: &ValueSet) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            value_set: value_set.clone(),
            user_prompt: prompt.into(),
            intellect_output: String::new(),
            intellect_reflection: String::new(),
            final_output: String::new(),
            will_decision: WillDecision::Approved,
            conscience_feedback: String::new(),
            evaluations: Vec::new(),
            spirit_score: None,
            spirit_reflection: String::new(),
        }
    }
}
