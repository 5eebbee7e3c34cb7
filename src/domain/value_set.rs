//! Value set domain types.
//!
//! A value set is the named, ordered list of value statements that every
//! pipeline stage grades against. It is supplied by the caller and never
//! mutated by the pipeline.

use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;

use crate::error::{AlignmentError, AlignmentResult};

/// A named, ordered list of value statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ValueSet {
    /// Name of the value set (its identity).
    pub name: String,
    /// Value statements, one per entry, in grading order.
    ///
    /// Accepts either a list or a single block of newline-separated text.
    #[serde(deserialize_with = "deserialize_definition")]
    #[schema(value_type = Vec<String>)]
    pub definition: Vec<String>,
}

impl ValueSet {
    /// Create a value set from already-split statements.
    pub fn new(name: impl Into<String>, definition: Vec<String>) -> Self {
        Self {
            name: name.into(),
            definition: clean_statements(definition.iter().map(String::as_str)),
        }
    }

    /// Create a value set from free text, one statement per line.
    pub fn from_text(name: impl Into<String>, text: &str) -> Self {
        Self {
            name: name.into(),
            definition: clean_statements(text.lines()),
        }
    }

    /// Number of value statements.
    pub fn len(&self) -> usize {
        self.definition.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definition.is_empty()
    }

    /// The full definition as newline-separated text, as embedded in prompts.
    pub fn definition_text(&self) -> String {
        self.definition.join("\n")
    }

    /// Value names with any leading list numbering removed.
    ///
    /// `"1. Commitment to truth"` becomes `"Commitment to truth"`.
    pub fn value_names(&self) -> Vec<String> {
        self.definition
            .iter()
            .map(|statement| strip_numbering(statement).to_string())
            .collect()
    }
}

fn clean_statements<'a>(lines: impl Iterator<Item = &'a str>) -> Vec<String> {
    lines
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

fn strip_numbering(statement: &str) -> &str {
    let trimmed = statement.trim_start_matches(|c: char| c.is_ascii_digit());
    if trimmed.len() == statement.len() {
        return statement.trim_start_matches(['-', '*']).trim();
    }
    trimmed.trim_start_matches(['.', ')']).trim()
}

fn deserialize_definition<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Definition {
        Text(String),
        List(Vec<String>),
    }

    Ok(match Definition::deserialize(deserializer)? {
        Definition::Text(text) => clean_statements(text.lines()),
        Definition::List(items) => clean_statements(items.iter().map(String::as_str)),
    })
}

/// The configured library of value sets, with one designated default.
#[derive(Debug, Clone)]
pub struct ValueSetLibrary {
    sets: Vec<ValueSet>,
    default_name: String,
}

impl ValueSetLibrary {
    /// Build a library. The default name must refer to one of the sets.
    pub fn new(sets: Vec<ValueSet>, default_name: impl Into<String>) -> AlignmentResult<Self> {
        let default_name = default_name.into();
        if !sets.iter().any(|s| s.name == default_name) {
            return Err(AlignmentError::Config(format!(
                "Default value set '{}' is not defined in value_sets",
                default_name
            )));
        }
        if let Some(empty) = sets.iter().find(|s| s.is_empty()) {
            return Err(AlignmentError::Config(format!(
                "Value set '{}' has no value statements",
                empty.name
            )));
        }
        Ok(Self { sets, default_name })
    }

    /// Look up a value set by name.
    pub fn get(&self, name: &str) -> Option<&ValueSet> {
        self.sets.iter().find(|s| s.name == name)
    }

    /// The configured default value set.
    pub fn default_set(&self) -> &ValueSet {
        // Presence is checked in `new`.
        self.get(&self.default_name)
            .unwrap_or_else(|| &self.sets[0])
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    pub fn all(&self) -> &[ValueSet] {
        &self.sets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_text_skips_blank_lines() {
        let set = ValueSet::from_text("Test", "1. Commitment to truth\n\n  2. Respect for persons  \n");
        assert_eq!(set.len(), 2);
        assert_eq!(set.definition[1], "2. Respect for persons");
    }

    #[test]
    fn test_value_names_strip_numbering() {
        let set = ValueSet::new(
            "Test",
            vec![
                "1. Commitment to truth".to_string(),
                "2) Care for the vulnerable".to_string(),
                "- Humility".to_string(),
                "Justice".to_string(),
            ],
        );
        assert_eq!(
            set.value_names(),
            vec![
                "Commitment to truth",
                "Care for the vulnerable",
                "Humility",
                "Justice"
            ]
        );
    }

    #[test]
    fn test_definition_deserializes_from_text_or_list() {
        let from_text: ValueSet =
            serde_json::from_str(r#"{"name":"A","definition":"1. Truth\n2. Mercy"}"#).unwrap();
        let from_list: ValueSet =
            serde_json::from_str(r#"{"name":"A","definition":["1. Truth","2. Mercy"]}"#).unwrap();
        assert_eq!(from_text, from_list);
    }

    #[test]
    fn test_library_rejects_unknown_default() {
        let sets = vec![ValueSet::from_text("A", "Truth")];
        assert!(matches!(
            ValueSetLibrary::new(sets, "B"),
            Err(AlignmentError::Config(_))
        ));
    }

    #[test]
    fn test_library_rejects_empty_set() {
        let sets = vec![
            ValueSet::from_text("A", "Truth"),
            ValueSet::from_text("Empty", "\n\n"),
        ];
        assert!(matches!(
            ValueSetLibrary::new(sets, "A"),
            Err(AlignmentError::Config(_))
        ));
    }

    #[test]
    fn test_library_lookup() {
        let sets = vec![
            ValueSet::from_text("A", "Truth"),
            ValueSet::from_text("B", "Mercy"),
        ];
        let library = ValueSetLibrary::new(sets, "B").unwrap();
        assert_eq!(library.default_set().name, "B");
        assert!(library.get("A").is_some());
        assert!(library.get("C").is_none());
    }
}
