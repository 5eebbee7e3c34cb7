//! API Key authentication for pipeline callers.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Represents an API key with its metadata.
#[derive(Debug, Clone)]
pub struct ApiKeyInfo {
    /// Unique identifier for this key.
    pub key_id: String,
    /// Human-readable caller name, logged with each run.
    pub caller: String,
    /// Whether this key is active.
    pub active: bool,
}

/// API Key validator and store.
///
/// Only SHA-256 digests of the keys are held in memory.
#[derive(Clone)]
pub struct ApiKeyValidator {
    keys: Arc<RwLock<HashMap<String, ApiKeyInfo>>>,
}

impl ApiKeyValidator {
    /// Create a new validator with initial keys from config.
    pub fn new(configured_keys: Vec<ConfiguredApiKey>) -> Self {
        let mut keys = HashMap::new();

        for key in configured_keys {
            if key.key.trim().is_empty() {
                tracing::warn!(key_id = %key.id, "Ignoring API key with empty value");
                continue;
            }
            keys.insert(
                Self::hash_key(&key.key),
                ApiKeyInfo {
                    key_id: key.id,
                    caller: key.name,
                    active: key.active,
                },
            );
        }

        Self {
            keys: Arc::new(RwLock::new(keys)),
        }
    }

    /// Hash an API key for comparison.
    pub fn hash_key(key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Validate an API key and return its info if valid.
    pub async fn validate(&self, key: &str) -> Option<ApiKeyInfo> {
        let hashed = Self::hash_key(key);
        let keys = self.keys.read().await;

        keys.get(&hashed).filter(|info| info.active).cloned()
    }

    /// Number of usable keys.
    pub async fn active_count(&self) -> usize {
        self.keys.read().await.values().filter(|k| k.active).count()
    }
}

/// API key configuration from config file.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct ConfiguredApiKey {
    /// Unique ID for the key.
    pub id: String,
    /// The actual API key value.
    pub key: String,
    /// Human-readable caller name.
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured(id: &str, key: &str, active: bool) -> ConfiguredApiKey {
        ConfiguredApiKey {
            id: id.to_string(),
            key: key.to_string(),
            name: "Research notebook".to_string(),
            active,
        }
    }

    #[tokio::test]
    async fn test_api_key_validation() {
        let validator = ApiKeyValidator::new(vec![configured("key-1", "sk-test-key-12345", true)]);

        // Valid key
        let result = validator.validate("sk-test-key-12345").await;
        assert_eq!(result.unwrap().caller, "Research notebook");

        // Invalid key
        assert!(validator.validate("wrong-key").await.is_none());
    }

    #[tokio::test]
    async fn test_inactive_and_empty_keys_are_rejected() {
        let validator = ApiKeyValidator::new(vec![
            configured("key-1", "sk-disabled", false),
            configured("key-2", "  ", true),
        ]);

        assert!(validator.validate("sk-disabled").await.is_none());
        assert!(validator.validate("  ").await.is_none());
        assert_eq!(validator.active_count().await, 0);
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let hash = ApiKeyValidator::hash_key("abc");
        assert_eq!(
            hash,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
