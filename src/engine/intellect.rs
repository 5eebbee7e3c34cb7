//! Intellect - drafts the candidate answer.
//!
//! The first stage of the pipeline. It asks the completion provider for an
//! answer that carries the value set implicitly, followed by a
//! `<REFLECTION>` block describing how the values shaped the answer.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::domain::ValueSet;
use crate::engine::{CompletionClient, CompletionRequest};
use crate::error::AlignmentResult;

static REFLECTION_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<REFLECTION>(.*?)</REFLECTION>").expect("reflection pattern is valid")
});

/// Output of the Intellect stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntellectOutput {
    /// The answer with every reflection block removed.
    pub message: String,
    /// Text of the first reflection block; empty when the model gave none.
    pub reflection: String,
}

impl IntellectOutput {
    /// Split raw model text into answer and reflection.
    ///
    /// A missing reflection is tolerated: the raw text becomes the message.
    pub fn parse(raw: &str) -> Self {
        let reflection = REFLECTION_BLOCK
            .captures(raw)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();

        let message = REFLECTION_BLOCK.replace_all(raw, "").trim().to_string();

        Self {
            message,
            reflection,
        }
    }
}

/// Produces a candidate answer plus a self-reported reflection.
pub struct Intellect {
    client: Arc<dyn CompletionClient>,
    temperature: f32,
}

impl Intellect {
    pub fn new(client: Arc<dyn CompletionClient>, temperature: f32) -> Self {
        Self {
            client,
            temperature,
        }
    }

    /// Build the system instruction for a value set.
    pub fn system_prompt(value_set: &ValueSet) -> String {
        format!(
            "You are a thoughtful assistant whose answers are shaped by the \"{name}\" values.\n\n\
             The {name} values are:\n{definition}\n\n\
             Answer the user directly and naturally. Let these values inform your tone, \
             emphasis and conclusions, but weave them into the answer instead of listing \
             or naming them one by one.\n\n\
             After your answer, add a short reflection on how the values shaped it, \
             enclosed exactly like this:\n\
             <REFLECTION>your reflection</REFLECTION>",
            name = value_set.name,
            definition = value_set.definition_text(),
        )
    }

    /// Draft an answer to `prompt` under `value_set`.
    ///
    /// Provider failures propagate: there is no reasonable default answer.
    pub async fn think(&self, prompt: &str, value_set: &ValueSet) -> AlignmentResult<IntellectOutput> {
        let request = CompletionRequest::new(
            Self::system_prompt(value_set),
            prompt,
            self.temperature,
        );

        let raw = self.client.complete(request).await?;
        let output = IntellectOutput::parse(&raw);

        tracing::debug!(
            value_set = %value_set.name,
            message_len = output.message.len(),
            has_reflection = !output.reflection.is_empty(),
            "Intellect produced a candidate answer"
        );

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{Reply, ScriptedClient};
    use crate::error::AlignmentError;

    #[test]
    fn test_parse_extracts_reflection() {
        let output = IntellectOutput::parse(
            "Honesty matters, even when it is hard.\n<REFLECTION>I leaned on truthfulness.</REFLECTION>",
        );
        assert_eq!(output.message, "Honesty matters, even when it is hard.");
        assert_eq!(output.reflection, "I leaned on truthfulness.");
    }

    #[test]
    fn test_parse_without_reflection_keeps_raw_text() {
        let output = IntellectOutput::parse("Just an answer.");
        assert_eq!(output.message, "Just an answer.");
        assert_eq!(output.reflection, "");
    }

    #[test]
    fn test_parse_is_case_insensitive_and_multiline() {
        let output = IntellectOutput::parse("Answer.\n<reflection>\nline one\nline two\n</reflection>\n");
        assert_eq!(output.message, "Answer.");
        assert_eq!(output.reflection, "line one\nline two");
    }

    #[test]
    fn test_parse_strips_every_block() {
        let output = IntellectOutput::parse(
            "<REFLECTION>first</REFLECTION>Answer<REFLECTION>second</REFLECTION>",
        );
        assert_eq!(output.message, "Answer");
        assert_eq!(output.reflection, "first");
    }

    #[test]
    fn test_unclosed_block_is_not_a_reflection() {
        let output = IntellectOutput::parse("Answer <REFLECTION>dangling");
        assert_eq!(output.message, "Answer <REFLECTION>dangling");
        assert!(output.reflection.is_empty());
    }

    #[test]
    fn test_system_prompt_embeds_value_set() {
        let set = ValueSet::from_text("Test", "1. Commitment to truth\n2. Mercy");
        let prompt = Intellect::system_prompt(&set);
        assert!(prompt.contains("\"Test\""));
        assert!(prompt.contains("1. Commitment to truth\n2. Mercy"));
        assert!(prompt.contains("<REFLECTION>"));
    }

    #[tokio::test]
    async fn test_think_sends_prompt_and_parses() {
        let client = Arc::new(ScriptedClient::texts(&[
            "Lying erodes trust.<REFLECTION>Truth first.</REFLECTION>",
        ]));
        let intellect = Intellect::new(client.clone(), 0.5);
        let set = ValueSet::from_text("Test", "1. Commitment to truth");

        let output = intellect
            .think("Is lying ever acceptable?", &set)
            .await
            .unwrap();

        assert_eq!(output.message, "Lying erodes trust.");
        assert_eq!(output.reflection, "Truth first.");

        let requests = client.recorded();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].user_prompt, "Is lying ever acceptable?");
        assert_eq!(requests[0].temperature, 0.5);
    }

    #[tokio::test]
    async fn test_think_propagates_provider_failure() {
        let client = Arc::new(ScriptedClient::new(vec![Reply::Fail("503".to_string())]));
        let intellect = Intellect::new(client, 0.5);
        let set = ValueSet::from_text("Test", "Truth");

        let result = intellect.think("hi", &set).await;
        assert!(matches!(result, Err(AlignmentError::Completion(_))));
    }
}
