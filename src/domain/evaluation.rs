//! Evaluation-related domain types.
//!
//! Represents the Conscience stage's per-value critique of an answer.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// How strongly a response upholds a given value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum AffirmationLevel {
    #[serde(rename = "Strongly Affirms")]
    StronglyAffirms,
    #[serde(rename = "Moderately Affirms")]
    ModeratelyAffirms,
    #[serde(rename = "Weakly Affirms")]
    WeaklyAffirms,
    #[serde(rename = "Omits")]
    Omits,
    #[serde(rename = "Violates")]
    Violates,
}

impl AffirmationLevel {
    /// All levels, strongest first.
    pub const ALL: [AffirmationLevel; 5] = [
        AffirmationLevel::StronglyAffirms,
        AffirmationLevel::ModeratelyAffirms,
        AffirmationLevel::WeaklyAffirms,
        AffirmationLevel::Omits,
        AffirmationLevel::Violates,
    ];

    /// Scoring weight used by Spirit.
    ///
    /// A violation still weighs 1, not 0.
    pub fn weight(&self) -> u32 {
        match self {
            AffirmationLevel::StronglyAffirms => 5,
            AffirmationLevel::ModeratelyAffirms => 4,
            AffirmationLevel::WeaklyAffirms => 3,
            AffirmationLevel::Omits => 2,
            AffirmationLevel::Violates => 1,
        }
    }

    /// The label as it appears in critique text.
    pub fn label(&self) -> &'static str {
        match self {
            AffirmationLevel::StronglyAffirms => "Strongly Affirms",
            AffirmationLevel::ModeratelyAffirms => "Moderately Affirms",
            AffirmationLevel::WeaklyAffirms => "Weakly Affirms",
            AffirmationLevel::Omits => "Omits",
            AffirmationLevel::Violates => "Violates",
        }
    }
}

impl std::fmt::Display for AffirmationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::str::FromStr for AffirmationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        AffirmationLevel::ALL
            .into_iter()
            .find(|level| level.label().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("Unknown affirmation level: {}", s))
    }
}

/// One value's critique, produced by Conscience.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    /// Name of the value being graded.
    pub value_name: String,
    /// How strongly the answer upholds the value.
    pub affirmation: AffirmationLevel,
    /// Self-reported confidence, 0-100.
    pub confidence: u8,
    /// Short justification.
    pub reason: String,
}

impl Evaluation {
    pub fn new(
        value_name: impl Into<String>,
        affirmation: AffirmationLevel,
        confidence: u8,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            value_name: value_name.into(),
            affirmation,
            confidence: confidence.min(100),
            reason: reason.into(),
        }
    }
}
