//! Configuration module for Alignment Core.
//!
//! Loads configuration from YAML files and environment variables.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

use crate::auth::ConfiguredApiKey;
use crate::domain::{ValueSet, ValueSetLibrary};

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    /// The value set library. The pipeline never falls back to a built-in set.
    pub value_sets: Vec<ValueSet>,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Completion provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions endpoint.
    #[serde(default = "default_provider_url")]
    pub provider_url: String,
    /// Bearer token for the provider.
    #[serde(default)]
    pub api_key: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Upper bound for a single completion call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_intellect_temperature")]
    pub intellect_temperature: f32,
    #[serde(default)]
    pub will_temperature: f32,
    #[serde(default = "default_conscience_temperature")]
    pub conscience_temperature: f32,
}

fn default_provider_url() -> String {
    "https://openrouter.ai/api/v1/chat/completions".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_intellect_temperature() -> f32 {
    0.5
}

fn default_conscience_temperature() -> f32 {
    0.2
}

/// Output format the Conscience stage asks for and parses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CritiqueFormat {
    /// Four-line `Value:` / `Affirmation Level:` / `Confidence:` / `Reason:` blocks.
    #[default]
    Lines,
    /// A JSON array of evaluation objects.
    Json,
}

/// Pipeline behavior configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Name of the value set used when a request names none.
    pub default_value_set: String,
    /// Whether blocked runs still get a Conscience critique of the suppression notice.
    #[serde(default)]
    pub audit_blocked_runs: bool,
    #[serde(default)]
    pub critique_format: CritiqueFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_value_set: "Default".to_string(),
            audit_blocked_runs: false,
            critique_format: CritiqueFormat::Lines,
        }
    }
}

/// Audit ledger configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Path of the append-only JSONL file.
    pub path: String,
    /// How many runs the in-memory audit tracker keeps.
    #[serde(default = "default_tracker_capacity")]
    pub tracker_capacity: usize,
}

fn default_tracker_capacity() -> usize {
    1024
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: "data/ledger.jsonl".to_string(),
            tracker_capacity: default_tracker_capacity(),
        }
    }
}

/// API key authentication configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_keys: Vec<ConfiguredApiKey>,
}

impl Config {
    /// Load configuration from files and environment.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (ALIGNMENT_*)
    /// 2. config/local.yaml (if exists)
    /// 3. config/default.yaml
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("ALIGNMENT")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Build the value set library from `value_sets` and the configured default.
    pub fn value_set_library(&self) -> Result<ValueSetLibrary, ConfigError> {
        ValueSetLibrary::new(
            self.value_sets.clone(),
            self.pipeline.default_value_set.clone(),
        )
        .map_err(|e| ConfigError::Message(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    const SAMPLE: &str = r#"
server:
  host: 127.0.0.1
  port: 8080
llm:
  model: openai/gpt-4o-mini
pipeline:
  default_value_set: Test
  critique_format: json
value_sets:
  - name: Test
    definition: |
      1. Commitment to truth
      2. Respect for persons
"#;

    fn load_sample() -> Config {
        ConfigLoader::builder()
            .add_source(File::from_str(SAMPLE, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_fill_optional_sections() {
        let config = load_sample();
        assert_eq!(config.llm.timeout_secs, 30);
        assert_eq!(config.llm.will_temperature, 0.0);
        assert!(!config.pipeline.audit_blocked_runs);
        assert_eq!(config.pipeline.critique_format, CritiqueFormat::Json);
        assert_eq!(config.ledger.tracker_capacity, 1024);
        assert!(!config.auth.enabled);
    }

    #[test]
    fn test_value_set_library_from_config() {
        let config = load_sample();
        let library = config.value_set_library().unwrap();
        assert_eq!(library.default_set().len(), 2);
    }

    #[test]
    fn test_missing_default_set_is_an_error() {
        let mut config = load_sample();
        config.pipeline.default_value_set = "Missing".to_string();
        assert!(config.value_set_library().is_err());
    }
}
