//! Will - the binary gate between Intellect and the caller.
//!
//! The gate asks the completion provider for a single token, `violation` or
//! `approved`. Only a reply containing "violation" blocks; everything else,
//! including malformed text, approves.
//!
//! Failure policy: if the completion call errors or times out, the gate
//! fails OPEN and releases the Intellect answer unchanged. Availability is
//! preferred over safety here; the Conscience audit still runs afterwards.

use std::sync::Arc;

use crate::domain::{ValueSet, WillDecision};
use crate::engine::{CompletionClient, CompletionRequest};

/// Output of the Will stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WillVerdict {
    /// Text released to the caller.
    pub final_output: String,
    pub decision: WillDecision,
}

/// Binary approve/block gate.
pub struct Will {
    client: Arc<dyn CompletionClient>,
    temperature: f32,
}

impl Will {
    pub fn new(client: Arc<dyn CompletionClient>, temperature: f32) -> Self {
        Self {
            client,
            temperature,
        }
    }

    /// The fixed notice that replaces a blocked answer.
    pub fn suppression_message(value_set: &ValueSet) -> String {
        format!(
            "This response was withheld because it conflicts with the {} values.",
            value_set.name
        )
    }

    /// Interpret the gate model's raw reply.
    pub fn decide(raw: &str) -> WillDecision {
        if raw.to_lowercase().contains("violation") {
            WillDecision::Blocked
        } else {
            WillDecision::Approved
        }
    }

    /// Build the system instruction for a value set.
    pub fn system_prompt(value_set: &ValueSet) -> String {
        format!(
            "You are the final gate before a response reaches a user. Judge whether the \
             response below conflicts with the \"{name}\" values:\n{definition}\n\n\
             A response is a violation if it endorses, encourages or legitimizes a position \
             that conflicts with these values. Neutral or merely descriptive treatment of such \
             a position still counts as a violation when it presents the position as \
             acceptable.\n\n\
             The author's reflection is included as context for interpreting the response. \
             It is not evidence that the response is acceptable.\n\n\
             Reply with exactly one word: \"violation\" or \"approved\".",
            name = value_set.name,
            definition = value_set.definition_text(),
        )
    }

    fn user_prompt(prompt: &str, message: &str, reflection: &str) -> String {
        format!(
            "User prompt:\n{prompt}\n\nResponse:\n{message}\n\nAuthor's reflection:\n{reflection}"
        )
    }

    /// Approve or block `message`.
    ///
    /// Never fails: provider errors approve the message (fail-open).
    pub async fn judge(
        &self,
        prompt: &str,
        message: &str,
        value_set: &ValueSet,
        reflection: &str,
    ) -> WillVerdict {
        let request = CompletionRequest::new(
            Self::system_prompt(value_set),
            Self::user_prompt(prompt, message, reflection),
            self.temperature,
        );

        let decision = match self.client.complete(request).await {
            Ok(raw) => {
                let decision = Self::decide(&raw);
                tracing::debug!(raw = %raw.trim(), decision = %decision, "Will reply received");
                decision
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    value_set = %value_set.name,
                    "Will gate failed, releasing answer unchanged"
                );
                WillDecision::Approved
            }
        };

        let final_output = match decision {
            WillDecision::Approved => message.to_string(),
            WillDecision::Blocked => Self::suppression_message(value_set),
        };

        WillVerdict {
            final_output,
            decision,
        }
    }
}
