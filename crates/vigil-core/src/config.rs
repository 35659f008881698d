//! Pipeline configuration

use crate::capability::{DEFAULT_GENERATION_MAX_TOKENS, DEFAULT_REVIEW_MAX_TOKENS};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;

/// Default attempt budget
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Attempts before escalating
    pub max_attempts: u32,
    /// Output token budget for generation
    pub generation_max_tokens: u32,
    /// Output token budget for each review
    pub review_max_tokens: u32,
    /// Timeout applied to every capability call
    pub call_timeout_secs: u64,
}

impl PipelineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With attempt budget
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// With capability call timeout
    #[inline]
    #[must_use]
    pub fn with_call_timeout_secs(mut self, secs: u64) -> Self {
        self.call_timeout_secs = secs;
        self
    }

    /// Validate all fields
    ///
    /// # Errors
    /// Returns the first invalid field found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.attempt_budget()?;
        if self.call_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.generation_max_tokens == 0 {
            return Err(ConfigError::ZeroTokens {
                field: "generation_max_tokens",
            });
        }
        if self.review_max_tokens == 0 {
            return Err(ConfigError::ZeroTokens {
                field: "review_max_tokens",
            });
        }
        Ok(())
    }

    /// Attempt budget as a non-zero count
    ///
    /// # Errors
    /// `ConfigError::ZeroAttempts` if `max_attempts` is 0.
    pub fn attempt_budget(&self) -> Result<NonZeroU32, ConfigError> {
        NonZeroU32::new(self.max_attempts).ok_or(ConfigError::ZeroAttempts)
    }

    /// Capability call timeout
    #[inline]
    #[must_use]
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            generation_max_tokens: DEFAULT_GENERATION_MAX_TOKENS,
            review_max_tokens: DEFAULT_REVIEW_MAX_TOKENS,
            call_timeout_secs: 30,
        }
    }
}
