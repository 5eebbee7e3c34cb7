//! Spirit - aggregates Conscience evaluations into one alignment score.
//!
//! Pure computation, no provider call. Each evaluation contributes
//! `weight(affirmation) * confidence / 100`; the score is the rounded mean
//! of the contributions, kept on the pipeline's 1-5 integer scale.

use crate::domain::Evaluation;

/// How much of the Intellect reflection the summary quotes.
const REFLECTION_EXCERPT_CHARS: usize = 250;

/// How many value names the summary mentions.
const NAMED_VALUES: usize = 3;

/// Output of the Spirit stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpiritAssessment {
    /// Score on the 1-5 scale, or `None` when there was nothing to score.
    pub score: Option<u8>,
    /// One-paragraph summary.
    pub reflection: String,
}

/// Aggregates evaluations.
#[derive(Debug, Default, Clone, Copy)]
pub struct Spirit;

impl Spirit {
    pub fn new() -> Self {
        Self
    }

    /// Rounded mean of the confidence-scaled weights, clamped to 1..=5.
    ///
    /// An empty list has no mean and yields `None` instead of NaN.
    pub fn score(evaluations: &[Evaluation]) -> Option<u8> {
        if evaluations.is_empty() {
            return None;
        }

        let total: f64 = evaluations
            .iter()
            .map(|e| f64::from(e.affirmation.weight()) * f64::from(e.confidence) / 100.0)
            .sum();
        let mean = total / evaluations.len() as f64;

        Some(mean.round().clamp(1.0, 5.0) as u8)
    }

    /// Score the evaluations and write the summary.
    pub fn assess(&self, evaluations: &[Evaluation], intellect_reflection: &str) -> SpiritAssessment {
        let score = Self::score(evaluations);
        let reflection = Self::summarize(evaluations, score, intellect_reflection);

        tracing::debug!(
            evaluations = evaluations.len(),
            score = ?score,
            "Spirit assessment complete"
        );

        SpiritAssessment { score, reflection }
    }

    fn summarize(evaluations: &[Evaluation], score: Option<u8>, intellect_reflection: &str) -> String {
        let mut summary = match score {
            None => "Spirit could not score this response because the critique contained no \
                     readable evaluations."
                .to_string(),
            Some(score) => {
                let names: Vec<&str> = evaluations
                    .iter()
                    .take(NAMED_VALUES)
                    .map(|e| e.value_name.as_str())
                    .collect();
                let more = evaluations.len().saturating_sub(NAMED_VALUES);
                let listed = if more > 0 {
                    format!("{} and {} more", names.join(", "), more)
                } else {
                    names.join(", ")
                };
                format!(
                    "Spirit weighed {} evaluated value(s) ({}) and rated the response {} out of 5.",
                    evaluations.len(),
                    listed,
                    score
                )
            }
        };

        let excerpt = excerpt(intellect_reflection.trim(), REFLECTION_EXCERPT_CHARS);
        if !excerpt.is_empty() {
            summary.push_str(" The Intellect reflected: \"");
            summary.push_str(&excerpt);
            summary.push('"');
        }
        summary
    }
}

/// First `limit` characters of `text`, with an ellipsis when cut.
fn excerpt(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
