//! Core types for Vigil
//!
//! Defines the fundamental types for the pipeline:
//! - Conversation messages and validated history
//! - Review stages and their status
//! - Reviewer verdicts
//! - Run identifiers

use crate::error::HistoryError;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique run identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Ulid);

impl RunId {
    /// Generate new run ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single conversation turn
///
/// Serialized as `{"role": "user" | "assistant", "content": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ChatMessage {
    /// Message written by the end user
    User { content: String },
    /// Message written by the agent
    Assistant { content: String },
}

impl ChatMessage {
    /// Create a user message
    #[inline]
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Create an assistant message
    #[inline]
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
        }
    }

    /// Message text
    #[inline]
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::User { content } | Self::Assistant { content } => content,
        }
    }

    /// Wire name of the role
    #[inline]
    #[must_use]
    pub fn role(&self) -> &'static str {
        match self {
            Self::User { .. } => "user",
            Self::Assistant { .. } => "assistant",
        }
    }

    /// Check if this is a user turn
    #[inline]
    #[must_use]
    pub fn is_user(&self) -> bool {
        matches!(self, Self::User { .. })
    }
}

/// Validated conversation history
///
/// Non-empty, every message has text, and the last message is the user turn
/// that triggered the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationHistory {
    messages: Vec<ChatMessage>,
}

impl ConversationHistory {
    /// Validate messages into a history
    ///
    /// # Errors
    /// - `HistoryError::Empty` if there are no messages
    /// - `HistoryError::BlankContent` if any message is blank
    /// - `HistoryError::MissingUserTurn` if the last message is not from the user
    pub fn new(messages: Vec<ChatMessage>) -> Result<Self, HistoryError> {
        if messages.is_empty() {
            return Err(HistoryError::Empty);
        }

        if let Some(index) = messages.iter().position(|m| m.content().trim().is_empty()) {
            return Err(HistoryError::BlankContent { index });
        }

        if !messages.last().is_some_and(ChatMessage::is_user) {
            return Err(HistoryError::MissingUserTurn);
        }

        Ok(Self { messages })
    }

    /// All messages in order
    #[inline]
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The triggering user message
    #[must_use]
    pub fn last_user_message(&self) -> &str {
        // Validation guarantees a trailing user turn.
        self.messages.last().map_or("", ChatMessage::content)
    }

    /// Number of messages
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false for a validated history
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl TryFrom<Vec<ChatMessage>> for ConversationHistory {
    type Error = HistoryError;

    fn try_from(messages: Vec<ChatMessage>) -> Result<Self, Self::Error> {
        Self::new(messages)
    }
}

/// The two ordered review stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Stage 1: ethics and compliance
    Compliance,
    /// Stage 2: culture and brand voice
    Culture,
}

impl Stage {
    /// Label used in rework notes
    #[inline]
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Stage::Compliance => "Ethics",
            Stage::Culture => "Culture",
        }
    }

    /// 1-based position in the review order
    #[inline]
    #[must_use]
    pub fn ordinal(self) -> u8 {
        match self {
            Stage::Compliance => 1,
            Stage::Culture => 2,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Compliance => write!(f, "compliance"),
            Stage::Culture => write!(f, "culture"),
        }
    }
}

/// Observable status of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// Stage has not evaluated anything yet
    #[default]
    Pending,
    /// Last evaluation approved
    Pass,
    /// Last evaluation asked for rework
    Rework,
}

/// Outcome of one stage evaluating one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    /// Whether the candidate may proceed
    pub approved: bool,
    /// Rejection reason, empty when approved
    pub reason: String,
}

impl ReviewVerdict {
    /// Approving verdict
    #[inline]
    #[must_use]
    pub fn approve() -> Self {
        Self {
            approved: true,
            reason: String::new(),
        }
    }

    /// Rejecting verdict with a reason
    #[inline]
    #[must_use]
    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: reason.into(),
        }
    }

    /// Status this verdict maps to
    #[inline]
    #[must_use]
    pub fn status(&self) -> StageStatus {
        if self.approved {
            StageStatus::Pass
        } else {
            StageStatus::Rework
        }
    }
}
