//! Completion capability used by every pipeline stage.
//!
//! The pipeline only needs "send a system prompt and a user prompt at some
//! temperature, get text back". Any provider can sit behind
//! [`CompletionClient`]; [`OpenRouterClient`] speaks the OpenAI-compatible
//! chat completions protocol.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AlignmentError, AlignmentResult};

/// A single completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            temperature,
        }
    }
}

/// Trait for text completion providers.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Run one completion and return the generated text.
    async fn complete(&self, request: CompletionRequest) -> AlignmentResult<String>;
}

/// OpenRouter (or any OpenAI-compatible endpoint) configuration.
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    /// Chat completions URL.
    pub url: String,
    /// API key for the provider.
    pub api_key: String,
    /// Model to use.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// Request to the chat completions API.
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

/// Response from the chat completions API.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn into_text(self) -> AlignmentResult<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AlignmentError::Completion("Response contained no choices".to_string()))
    }
}

/// Completion client for OpenRouter's chat completions API.
pub struct OpenRouterClient {
    config: OpenRouterConfig,
    client: Client,
}

impl OpenRouterClient {
    /// Create a new client. Fails if no API key is configured.
    pub fn new(config: OpenRouterConfig) -> AlignmentResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(AlignmentError::Config(
                "llm.api_key is required for the completion provider".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AlignmentError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn build_request(&self, request: CompletionRequest) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system_prompt,
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.user_prompt,
                },
            ],
            temperature: request.temperature,
        }
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete(&self, request: CompletionRequest) -> AlignmentResult<String> {
        let body = self.build_request(request);

        tracing::debug!(
            model = %body.model,
            temperature = body.temperature,
            "Sending completion request"
        );

        let response = self
            .client
            .post(&self.config.url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .header("X-Title", "Alignment Core")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AlignmentError::Timeout(self.config.timeout_secs)
                } else {
                    AlignmentError::Completion(format!("Request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AlignmentError::Completion(format!(
                "API error {}: {}",
                status, body
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| AlignmentError::Completion(format!("Failed to parse response: {}", e)))?;

        chat_response.into_text()
    }
}

/// Decorator that bounds every call of the wrapped client.
///
/// A call that runs past the limit surfaces as [`AlignmentError::Timeout`],
/// which each stage handles through its normal error path.
pub struct TimeoutClient<C> {
    inner: C,
    limit: Duration,
}

impl<C: CompletionClient> TimeoutClient<C> {
    pub fn new(inner: C, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl<C: CompletionClient> CompletionClient for TimeoutClient<C> {
    async fn complete(&self, request: CompletionRequest) -> AlignmentResult<String> {
        match tokio::time::timeout(self.limit, self.inner.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(AlignmentError::Timeout(self.limit.as_secs())),
        }
    }
}
