//! Completion model abstraction and the OpenAI-compatible client.
//!
//! Every model-backed stage talks to a [`ModelClient`], which wraps a
//! [`LanguageModel`] with a hard deadline. A stage that has no client (or
//! whose call fails) takes its deterministic path; model errors never escape
//! a stage on their own.
//!
//! | Type | Role |
//! |------|------|
//! | [`LanguageModel`] | Prompt in, completion text out |
//! | [`OpenAiChatModel`] | `POST {api_base}/chat/completions` |
//! | [`ModelClient`] | Shared handle with a per-call timeout |
//!
//! Calls are single-attempt: the pipeline falls back instead of retrying.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::ModelConfig;

/// Failure modes of a completion call.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("model API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model call timed out after {0:?}")]
    Timeout(Duration),
    #[error("{message}")]
    InvalidResponse { message: String },
}

/// A text-completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier, for logs.
    fn name(&self) -> &str;

    /// Complete a single user prompt.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Cloneable handle to a model with a per-call deadline.
#[derive(Clone)]
pub struct ModelClient {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
}

impl ModelClient {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    pub fn name(&self) -> &str {
        self.model.name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one completion, failing with [`LlmError::Timeout`] past the deadline.
    pub async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        match tokio::time::timeout(self.timeout, self.model.complete(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(self.timeout)),
        }
    }
}

// ============ OpenAI-compatible chat completions ============

pub struct OpenAiChatModel {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f64,
    timeout: Duration,
}

impl OpenAiChatModel {
    pub fn new(config: &ModelConfig, api_key: String) -> Result<Self, LlmError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            timeout,
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let resp = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout)
                } else {
                    LlmError::Http(e)
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let json: Value = resp.json().await?;
        parse_chat_content(&json)
    }
}

/// Pull `choices[0].message.content` out of a chat-completions response.
fn parse_chat_content(json: &Value) -> Result<String, LlmError> {
    json.get("choices")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|msg| msg.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| LlmError::InvalidResponse {
            message: "chat response is missing choices[0].message.content".to_string(),
        })
}

/// Build the configured model, if any.
///
/// Returns `Ok(None)` when the provider is disabled or the API key variable
/// is unset; the pipeline then runs entirely on its deterministic paths.
pub fn create_model(config: &ModelConfig) -> anyhow::Result<Option<ModelClient>> {
    match config.provider.as_str() {
        "disabled" => Ok(None),
        "openai" => {
            let api_key = match std::env::var(&config.api_key_env) {
                Ok(key) if !key.trim().is_empty() => key,
                _ => {
                    tracing::warn!(
                        env = %config.api_key_env,
                        "model API key not set; running without external model"
                    );
                    return Ok(None);
                }
            };
            let model = OpenAiChatModel::new(config, api_key)?;
            tracing::info!(model = %config.model, "external model enabled");
            Ok(Some(ModelClient::new(
                Arc::new(model),
                Duration::from_secs(config.timeout_secs),
            )))
        }
        other => anyhow::bail!("Unknown model provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Slow;

    #[async_trait]
    impl LanguageModel for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn complete(&self, _prompt: &str) -> Result<String, LlmError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        }
    }

    #[test]
    fn test_parse_chat_content() {
        let json = json!({ "choices": [{ "message": { "content": "true" } }] });
        assert_eq!(parse_chat_content(&json).unwrap(), "true");
    }

    #[test]
    fn test_parse_chat_content_missing() {
        let json = json!({ "choices": [] });
        assert!(matches!(
            parse_chat_content(&json),
            Err(LlmError::InvalidResponse { .. })
        ));
    }

    #[tokio::test]
    async fn test_client_enforces_deadline() {
        let client = ModelClient::new(Arc::new(Slow), Duration::from_millis(20));
        let err = client.complete("hi").await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout(_)));
    }

    #[test]
    fn test_disabled_provider_has_no_model() {
        let cfg = ModelConfig::default();
        assert!(create_model(&cfg).unwrap().is_none());
    }

    #[test]
    fn test_missing_key_has_no_model() {
        let cfg = ModelConfig {
            provider: "openai".to_string(),
            api_key_env: "CRICQ_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..ModelConfig::default()
        };
        assert!(create_model(&cfg).unwrap().is_none());
    }
}
