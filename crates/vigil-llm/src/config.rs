//! Backend configuration

use serde::{Deserialize, Serialize};

/// Default Anthropic Messages API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1/messages";

/// Default model for generation and review
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Environment variable holding the API key unless configured otherwise
pub const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// `[llm]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// Messages endpoint
    pub base_url: String,
    /// Model identifier
    pub model: String,
}

impl LlmConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With API key variable
    #[inline]
    #[must_use]
    pub fn with_api_key_env(mut self, name: impl Into<String>) -> Self {
        self.api_key_env = name.into();
        self
    }

    /// With endpoint
    #[inline]
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// With model
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_section_uses_defaults() {
        let config: LlmConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LlmConfig::default());
        assert_eq!(config.api_key_env, "ANTHROPIC_API_KEY");
    }

    #[test]
    fn overrides_keep_other_defaults() {
        let config: LlmConfig =
            serde_json::from_str(r#"{"model": "claude-3-5-haiku-latest"}"#).unwrap();
        assert_eq!(config.model, "claude-3-5-haiku-latest");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }
}
