use std::future::Future;
use std::time::Duration;

use docent_core::{DocentError, LlmConfig};
use serde::{Deserialize, Serialize};

/// A message in a chat conversation with the LLM.
///
/// # Examples
///
/// ```
/// use docent_retrieve::llm::{ChatMessage, Role};
///
/// let msg = ChatMessage::user("What is the travel policy?");
/// assert!(matches!(msg.role, Role::User));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Role in the chat conversation.
///
/// # Examples
///
/// ```
/// use docent_retrieve::llm::Role;
///
/// let role = Role::System;
/// assert_eq!(serde_json::to_string(&role).unwrap(), "\"system\"");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions.
    System,
    /// User input.
    User,
    /// Assistant response.
    Assistant,
}

/// A text generation backend.
pub trait CompletionService: Send + Sync {
    fn model(&self) -> &str;

    /// Complete the conversation and return the assistant's reply.
    fn complete(
        &self,
        messages: Vec<ChatMessage>,
    ) -> impl Future<Output = Result<String, DocentError>> + Send;
}

/// OpenAI-compatible chat completions client.
///
/// Works with any provider that exposes the `/v1/chat/completions` endpoint:
/// OpenAI, Ollama, vLLM, LiteLLM, etc.
///
/// # Examples
///
/// ```
/// use docent_core::LlmConfig;
/// use docent_retrieve::llm::{CompletionService, LlmClient};
///
/// let config = LlmConfig {
///     api_key: Some("test-key".into()),
///     ..LlmConfig::default()
/// };
/// let client = LlmClient::new(&config).unwrap();
/// assert_eq!(client.model(), "gpt-4o-mini");
/// ```
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
    api_key: Option<String>,
}

impl LlmClient {
    /// Create a new LLM client from configuration.
    ///
    /// Without a configured key, the provider's env var is read
    /// (`OPENAI_API_KEY` for `openai`). `ollama` runs without one. A missing
    /// key is not an error here; the service reports it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`DocentError::Llm`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, DocentError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DocentError::Llm(format!("failed to create HTTP client: {e}")))?;
        let api_key = config.provider.resolve_api_key(config.api_key.as_deref());
        Ok(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }
}

impl CompletionService for LlmClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    /// Builds a request to `{base_url}/v1/chat/completions` with the given
    /// messages and the configured temperature.
    async fn complete(&self, messages: Vec<ChatMessage>) -> Result<String, DocentError> {
        let base_url = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(self.config.provider.default_base_url())
            .trim_end_matches('/');
        let url = format!("{base_url}/v1/chat/completions");

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
        });

        let mut request = self.client.post(&url);
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = request.json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                DocentError::Llm(format!(
                    "request timed out after {}s: {e}",
                    self.config.timeout_secs
                ))
            } else {
                DocentError::Llm(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(DocentError::Llm(format!(
                "LLM API error {status}: {body_text}"
            )));
        }

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| DocentError::Llm(format!("failed to parse response: {e}")))?;

        let content = response_body
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| {
                DocentError::Llm(format!("unexpected response structure: {response_body}"))
            })?;

        Ok(content.to_string())
    }
}
