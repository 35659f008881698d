//! Error types for Vigil Core
//!
//! Provides error handling for:
//! - Conversation history validation at the boundary
//! - Pipeline configuration
//! - Run cancellation
//! - Capability (LLM) call failures
//! - Reviewer verdict parsing
//!
//! Capability and verdict errors never escape the adapters: they are
//! converted into fail-soft candidates or fail-open verdicts. They exist so
//! the adapters can log what went wrong.

/// Main pipeline error type
///
/// Preconditions are enforced by construction: a [`ConversationHistory`]
/// is validated when built and a pipeline is validated when configured, so
/// a run can only end early by cancellation.
///
/// [`ConversationHistory`]: crate::ConversationHistory
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Cancelled by the caller before a terminal state was reached
    #[error("pipeline run cancelled")]
    Cancelled,
}

/// Conversation history validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HistoryError {
    /// No messages at all
    #[error("conversation history is empty")]
    Empty,

    /// A message has no text
    #[error("message {index} has empty content")]
    BlankContent { index: usize },

    /// The history does not end with the triggering user message
    #[error("last message must come from the user")]
    MissingUserTurn,
}

/// Pipeline configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Attempt budget must allow at least one attempt
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    /// Capability calls need a positive timeout
    #[error("call_timeout_secs must be at least 1")]
    ZeroTimeout,

    /// Token budget must be positive
    #[error("{field} must be at least 1")]
    ZeroTokens { field: &'static str },
}

/// Capability call failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LlmError {
    /// Network or transport failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Call exceeded its timeout
    #[error("call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Provider returned a non-success status
    #[error("provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    /// Provider answered without any text
    #[error("response contained no text")]
    EmptyResponse,

    /// Backend could not be constructed
    #[error("misconfiguration: {0}")]
    Misconfiguration(String),
}

impl LlmError {
    /// Check if the failure was a timeout
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Reviewer verdict parse failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerdictError {
    /// Payload is not JSON
    #[error("verdict is not valid JSON: {0}")]
    Malformed(String),

    /// Payload is JSON but not an object with a boolean `approved`
    #[error("unexpected verdict shape: {0}")]
    UnexpectedShape(String),
}
