//! Service configuration file
//!
//! ```toml
//! [server]
//! listen = "127.0.0.1:8080"
//! request_timeout_secs = 120
//!
//! [pipeline]
//! max_attempts = 3
//!
//! [llm]
//! model = "claude-sonnet-4-20250514"
//!
//! [[seed.tokens]]
//! token = "dev-token"
//! user = "6f1c2a3e-8a0e-4a53-9b7e-0d6c1f9b2e11"
//! ```
//!
//! Every section is optional.

use crate::catalog::{AgentId, AgentRole, AgentStatus, AgentTone, UserId};
use crate::prompts::BrandProfile;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vigil_core::PipelineConfig;
use vigil_llm::LlmConfig;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceConfigError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Pipeline section rejected
    #[error("invalid [pipeline] section: {0}")]
    Pipeline(#[from] vigil_core::ConfigError),

    /// Request timeout must be positive
    #[error("server.request_timeout_secs must be at least 1")]
    ZeroRequestTimeout,

    /// Seeded agent owner has no token or profile
    #[error("seeded agent {agent} belongs to unknown user {owner}")]
    UnknownOwner { agent: AgentId, owner: UserId },
}

/// Whole configuration file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub llm: LlmConfig,
    pub seed: SeedConfig,
}

impl ServiceConfig {
    /// Load and validate a configuration file
    ///
    /// # Errors
    /// `ServiceConfigError` if the file is unreadable, malformed or invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServiceConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ServiceConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parse and validate configuration text
    ///
    /// # Errors
    /// `ServiceConfigError` if the text is malformed or invalid.
    pub fn from_toml_str(text: &str) -> Result<Self, ServiceConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all sections
    ///
    /// # Errors
    /// The first invalid setting found.
    pub fn validate(&self) -> Result<(), ServiceConfigError> {
        self.pipeline.validate()?;
        if self.server.request_timeout_secs == 0 {
            return Err(ServiceConfigError::ZeroRequestTimeout);
        }
        for agent in &self.seed.agents {
            let known = self.seed.tokens.iter().any(|t| t.user == agent.owner)
                || self.seed.profiles.iter().any(|p| p.user == agent.owner);
            if !known {
                return Err(ServiceConfigError::UnknownOwner {
                    agent: agent.id,
                    owner: agent.owner,
                });
            }
        }
        Ok(())
    }
}

/// `[server]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address
    pub listen: SocketAddr,
    /// Bound on one chat request, pipeline included
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// Request timeout
    #[inline]
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8080)),
            request_timeout_secs: crate::chat::DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

/// `[seed]` section loaded into the in-memory stores
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub tokens: Vec<TokenSeed>,
    pub profiles: Vec<ProfileSeed>,
    pub agents: Vec<AgentSeed>,
}

/// Bearer token for a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSeed {
    pub token: String,
    pub user: UserId,
}

/// Brand profile of a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSeed {
    pub user: UserId,
    /// Onboarding goals; one agent is provisioned per matching role
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(flatten)]
    pub profile: BrandProfile,
}

/// Agent to provision at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSeed {
    pub id: AgentId,
    pub owner: UserId,
    pub role: AgentRole,
    /// Falls back to the owner's profile tone
    #[serde(default)]
    pub tone: Option<AgentTone>,
    #[serde(default)]
    pub status: Option<AgentStatus>,
}
