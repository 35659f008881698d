//! Capability seams and adapters
//!
//! Two layers:
//! - [`LlmBackend`]: the raw, fallible model call (HTTP, CLI, test double).
//! - [`Generator`] / [`Reviewer`]: infallible seams the orchestrator drives.
//!
//! The adapters in between own the failure policy. Generation failures are
//! fail-soft: the candidate becomes [`NEUTRAL_APOLOGY`] and goes through
//! review like any other text. Review failures are fail-open: an unusable
//! verdict counts as approval, so a reviewer outage never blocks delivery.
//! Fail-open is a product decision (availability over strict enforcement)
//! and stays that way until the policy is revisited.

use crate::config::PipelineConfig;
use crate::error::{LlmError, VerdictError};
use crate::types::{ChatMessage, ConversationHistory, ReviewVerdict};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Candidate substituted when generation fails
pub const NEUTRAL_APOLOGY: &str = "Sorry, I could not process that.";

/// Default token budget for a generated reply
pub const DEFAULT_GENERATION_MAX_TOKENS: u32 = 1024;

/// Default token budget for a reviewer verdict
pub const DEFAULT_REVIEW_MAX_TOKENS: u32 = 256;

/// Default per-call timeout
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```json|```").expect("code fence pattern is valid"));

/// Input to a raw model call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    /// System instruction
    pub system: String,
    /// Conversation turns
    pub messages: Vec<ChatMessage>,
    /// Output token budget
    pub max_tokens: u32,
    /// Call timeout
    pub timeout: Duration,
}

/// Raw model call
///
/// Implementations report every failure as `LlmError`; they must not retry,
/// retry policy lives in the orchestrator.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Complete a conversation, returning the reply text
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

/// Produces candidate replies
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate a candidate; never fails
    async fn generate(
        &self,
        base_instruction: &str,
        rework_instruction: &str,
        history: &ConversationHistory,
    ) -> String;
}

/// Evaluates candidate replies
#[async_trait]
pub trait Reviewer: Send + Sync {
    /// Review a candidate; never fails
    async fn evaluate(&self, instruction: &str, candidate: &str, context: &str) -> ReviewVerdict;
}

async fn call_with_timeout(
    backend: &dyn LlmBackend,
    request: CompletionRequest,
) -> Result<String, LlmError> {
    let timeout = request.timeout;
    match tokio::time::timeout(timeout, backend.complete(request)).await {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout {
            secs: timeout.as_secs(),
        }),
    }
}

/// Fail-soft generation adapter
#[derive(Clone)]
pub struct GenerationAdapter {
    backend: Arc<dyn LlmBackend>,
    max_tokens: u32,
    timeout: Duration,
}

impl GenerationAdapter {
    /// Create adapter with default budgets
    #[must_use]
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            backend,
            max_tokens: DEFAULT_GENERATION_MAX_TOKENS,
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Create adapter from pipeline configuration
    #[must_use]
    pub fn from_config(backend: Arc<dyn LlmBackend>, config: &PipelineConfig) -> Self {
        Self::new(backend)
            .with_max_tokens(config.generation_max_tokens)
            .with_timeout(config.call_timeout())
    }

    /// With output token budget
    #[inline]
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// With call timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for GenerationAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationAdapter")
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Generator for GenerationAdapter {
    async fn generate(
        &self,
        base_instruction: &str,
        rework_instruction: &str,
        history: &ConversationHistory,
    ) -> String {
        let request = CompletionRequest {
            system: format!("{base_instruction}{rework_instruction}"),
            messages: history.messages().to_vec(),
            max_tokens: self.max_tokens,
            timeout: self.timeout,
        };

        match call_with_timeout(self.backend.as_ref(), request).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                tracing::warn!("generation returned no text; using neutral apology");
                NEUTRAL_APOLOGY.to_string()
            }
            Err(e) => {
                tracing::warn!(error = %e, "generation failed; using neutral apology");
                NEUTRAL_APOLOGY.to_string()
            }
        }
    }
}

/// Fail-open review adapter
#[derive(Clone)]
pub struct ReviewAdapter {
    backend: Arc<dyn LlmBackend>,
    max_tokens: u32,
    timeout: Duration,
}

impl ReviewAdapter {
    /// Create adapter with default budgets
    #[must_use]
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            backend,
            max_tokens: DEFAULT_REVIEW_MAX_TOKENS,
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Create adapter from pipeline configuration
    #[must_use]
    pub fn from_config(backend: Arc<dyn LlmBackend>, config: &PipelineConfig) -> Self {
        Self::new(backend)
            .with_max_tokens(config.review_max_tokens)
            .with_timeout(config.call_timeout())
    }

    /// With output token budget
    #[inline]
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// With call timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for ReviewAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewAdapter")
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// User turn sent to a reviewer
#[must_use]
pub fn review_prompt(candidate: &str, context: &str) -> String {
    format!("Agent response to review:\n\n\"{candidate}\"\n\nContext: {context}")
}

#[async_trait]
impl Reviewer for ReviewAdapter {
    async fn evaluate(&self, instruction: &str, candidate: &str, context: &str) -> ReviewVerdict {
        let request = CompletionRequest {
            system: instruction.to_string(),
            messages: vec![ChatMessage::user(review_prompt(candidate, context))],
            max_tokens: self.max_tokens,
            timeout: self.timeout,
        };

        let raw = match call_with_timeout(self.backend.as_ref(), request).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(error = %e, "review call failed; failing open");
                return ReviewVerdict::approve();
            }
        };

        parse_verdict(&raw).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "unusable review verdict; failing open");
            ReviewVerdict::approve()
        })
    }
}

/// Parse a reviewer reply into a verdict
///
/// Accepts `{"approved": bool, "reason": "..."}`, optionally wrapped in
/// markdown code fences or surrounded by prose.
///
/// # Errors
/// - `VerdictError::Malformed` if no JSON can be recovered
/// - `VerdictError::UnexpectedShape` if `approved` is missing or not a boolean
pub fn parse_verdict(raw: &str) -> Result<ReviewVerdict, VerdictError> {
    let stripped = CODE_FENCE.replace_all(raw, "");
    let clean = stripped.trim();

    let value: Value = match serde_json::from_str(clean) {
        Ok(value) => value,
        Err(err) => outermost_object(clean)
            .and_then(|span| serde_json::from_str(span).ok())
            .ok_or_else(|| VerdictError::Malformed(err.to_string()))?,
    };

    let Some(fields) = value.as_object() else {
        return Err(VerdictError::UnexpectedShape(format!(
            "expected an object, got {value}"
        )));
    };

    let approved = fields
        .get("approved")
        .and_then(Value::as_bool)
        .ok_or_else(|| VerdictError::UnexpectedShape("missing boolean `approved`".to_string()))?;

    if approved {
        return Ok(ReviewVerdict::approve());
    }

    let reason = fields
        .get("reason")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default();

    Ok(ReviewVerdict::reject(reason))
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
