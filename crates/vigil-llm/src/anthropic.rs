//! Anthropic Messages API backend
//!
//! One HTTP round trip per [`LlmBackend::complete`] call. Failures are
//! reported as [`LlmError`] and never retried here; the review pipeline owns
//! retry policy and the core adapters own the fallback behaviour.

use crate::config::LlmConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use vigil_core::{ChatMessage, CompletionRequest, LlmBackend, LlmError};

/// Anthropic API version header value
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Longest provider error body echoed into `LlmError::Provider`
const MAX_ERROR_BODY: usize = 512;

/// HTTP backend for the Anthropic Messages API
#[derive(Clone)]
pub struct AnthropicBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicBackend {
    /// Create a backend with an explicit API key
    ///
    /// # Errors
    /// `LlmError::Misconfiguration` if the key is blank or the HTTP client
    /// cannot be constructed.
    pub fn new(api_key: impl Into<String>, config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::Misconfiguration(
                "Anthropic API key is empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| LlmError::Misconfiguration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            api_key,
            model: config.model.clone(),
        })
    }

    /// Create a backend reading the API key from the configured environment
    /// variable
    ///
    /// # Errors
    /// `LlmError::Misconfiguration` if the variable is unset.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        Self::from_config_with(config, |name| std::env::var(name).ok())
    }

    /// Create a backend resolving the API key through `lookup`
    ///
    /// # Errors
    /// `LlmError::Misconfiguration` if `lookup` finds no key.
    pub fn from_config_with<F>(config: &LlmConfig, lookup: F) -> Result<Self, LlmError>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let api_key = lookup(&config.api_key_env).ok_or_else(|| {
            LlmError::Misconfiguration(format!(
                "Anthropic API key not found in environment variable '{}'. \
                 Set it or configure a different api_key_env in [llm].",
                config.api_key_env
            ))
        })?;

        Self::new(api_key, config)
    }

    /// Model used for every call
    #[inline]
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body<'a>(&'a self, request: &'a CompletionRequest) -> AnthropicRequest<'a> {
        AnthropicRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            system: (!request.system.is_empty()).then_some(request.system.as_str()),
            messages: request
                .messages
                .iter()
                .map(|m| AnthropicMessage {
                    role: m.role(),
                    content: m.content(),
                })
                .collect(),
        }
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        debug!(
            provider = "anthropic",
            model = %self.model,
            max_tokens = request.max_tokens,
            messages = request.messages.len(),
            timeout_secs = request.timeout.as_secs(),
            "Invoking Anthropic backend"
        );

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .timeout(request.timeout)
            .json(&self.request_body(&request))
            .send()
            .await
            .map_err(|e| transport_error(&e, request.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(provider = "anthropic", status = status.as_u16(), "Anthropic call failed");
            return Err(LlmError::Provider {
                status: status.as_u16(),
                message: provider_message(&body),
            });
        }

        let body: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| transport_error(&e, request.timeout))?;

        let text = body.text();
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }

        debug!(
            provider = "anthropic",
            tokens_input = ?body.usage.as_ref().map(|u| u.input_tokens),
            tokens_output = ?body.usage.as_ref().map(|u| u.output_tokens),
            "Anthropic invocation completed"
        );

        Ok(text)
    }
}

impl std::fmt::Debug for AnthropicBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicBackend")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

fn transport_error(err: &reqwest::Error, timeout: Duration) -> LlmError {
    if err.is_timeout() {
        LlmError::Timeout {
            secs: timeout.as_secs(),
        }
    } else {
        LlmError::Transport(err.to_string())
    }
}

/// Extract the provider's error message, falling back to the raw body
fn provider_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(MAX_ERROR_BODY).collect())
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

impl AnthropicResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter(|block| block.content_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}
