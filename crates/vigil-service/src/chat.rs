//! Chat request handling
//!
//! One request runs, in order:
//! 1. Authenticate the caller
//! 2. Validate the conversation history
//! 3. Load the agent and the caller's brand profile
//! 4. Build the generation and reviewer instructions
//! 5. Run the review pipeline, bounded by the request timeout
//! 6. Deliver the user/assistant pair to the message sink
//! 7. Respond with the delivered message and the pipeline status
//!
//! Failures in steps 1-3 return before any model call is made.

use crate::catalog::{AgentId, UserId};
use crate::prompts::{compliance_instruction, culture_instruction, review_context};
use crate::store::{
    AgentStore, Authenticator, DeliveryRecord, InMemoryStores, MessageSink, ProfileStore,
    SinkError,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use vigil_core::{
    ChatMessage, ConversationHistory, HistoryError, PipelineStatus, ReviewPipeline, RunRequest,
};

/// Default bound on one chat request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Incoming chat request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub agent_id: String,
    pub conversation_id: String,
    pub messages: Vec<ChatMessage>,
}

/// Successful chat response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Delivered message
    pub message: String,
    /// How the message was decided
    pub pipeline: PipelineStatus,
}

/// Chat request failures
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// No or unknown bearer token
    #[error("Unauthorized")]
    Unauthorized,

    /// Malformed body or invalid history
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Agent missing, paused, or owned by someone else
    #[error("Agent not found")]
    AgentNotFound,

    /// Pipeline exceeded the request timeout
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Delivered exchange could not be stored
    #[error("delivery failed: {0}")]
    Delivery(#[from] SinkError),
}

impl From<HistoryError> for ChatError {
    fn from(err: HistoryError) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

impl ChatError {
    /// HTTP status for this error
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized => 401,
            Self::InvalidRequest(_) => 400,
            Self::AgentNotFound => 404,
            Self::Timeout { .. } => 504,
            Self::Delivery(_) => 500,
        }
    }

    /// Message safe to show the caller
    ///
    /// Server-side failures are not described.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Delivery(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

/// External collaborators of the chat service
#[derive(Clone)]
pub struct Collaborators {
    pub auth: Arc<dyn Authenticator>,
    pub agents: Arc<dyn AgentStore>,
    pub profiles: Arc<dyn ProfileStore>,
    pub sink: Arc<dyn MessageSink>,
}

impl From<&InMemoryStores> for Collaborators {
    fn from(stores: &InMemoryStores) -> Self {
        Self {
            auth: stores.auth.clone(),
            agents: stores.agents.clone(),
            profiles: stores.profiles.clone(),
            sink: stores.sink.clone(),
        }
    }
}

/// Trigger for the review pipeline
#[derive(Clone)]
pub struct ChatService {
    pipeline: ReviewPipeline,
    collaborators: Collaborators,
    request_timeout: Duration,
}

impl ChatService {
    /// Create service with the default request timeout
    #[must_use]
    pub fn new(pipeline: ReviewPipeline, collaborators: Collaborators) -> Self {
        Self {
            pipeline,
            collaborators,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// With request timeout
    #[inline]
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Resolve the caller
    ///
    /// # Errors
    /// `ChatError::Unauthorized` if the token is absent or unknown.
    pub async fn authenticate(&self, bearer: Option<&str>) -> Result<UserId, ChatError> {
        let token = bearer
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(ChatError::Unauthorized)?;

        self.collaborators
            .auth
            .authenticate(token)
            .await
            .ok_or(ChatError::Unauthorized)
    }

    /// Handle one chat request end to end
    ///
    /// # Errors
    /// See [`ChatError`]; no model call is made for the 401/400/404 cases.
    pub async fn handle(
        &self,
        bearer: Option<&str>,
        request: ChatRequest,
    ) -> Result<ChatResponse, ChatError> {
        let user = self.authenticate(bearer).await?;
        self.handle_for(user, request).await
    }

    /// Handle a request for an already authenticated caller
    ///
    /// # Errors
    /// See [`ChatError`].
    pub async fn handle_for(
        &self,
        user: UserId,
        request: ChatRequest,
    ) -> Result<ChatResponse, ChatError> {
        let ChatRequest {
            agent_id,
            conversation_id,
            messages,
        } = request;

        if conversation_id.trim().is_empty() {
            return Err(ChatError::InvalidRequest(
                "conversationId must not be empty".to_string(),
            ));
        }
        let history = ConversationHistory::new(messages)?;

        let agent_id = AgentId::parse(&agent_id).ok_or(ChatError::AgentNotFound)?;
        let agent = self
            .collaborators
            .agents
            .find_agent(agent_id, user)
            .await
            .ok_or(ChatError::AgentNotFound)?;
        let profile = self
            .collaborators
            .profiles
            .profile(user)
            .await
            .unwrap_or_default();

        let last_user_message = history.last_user_message().to_string();
        let run = RunRequest::new(history, agent.system_prompt.clone())
            .with_review_context(review_context(&profile, agent.role))
            .with_compliance_instruction(compliance_instruction(&profile))
            .with_culture_instruction(culture_instruction(&profile));

        let result = tokio::time::timeout(self.request_timeout, self.pipeline.run(&run))
            .await
            .map_err(|_| {
                tracing::warn!(
                    %agent_id,
                    conversation_id = %conversation_id,
                    timeout_secs = self.request_timeout.as_secs(),
                    "chat request timed out"
                );
                ChatError::Timeout {
                    secs: self.request_timeout.as_secs(),
                }
            })?;

        self.collaborators
            .sink
            .deliver(DeliveryRecord::exchange(
                &conversation_id,
                &last_user_message,
                &result.delivered,
            ))
            .await
            .inspect_err(|e| {
                tracing::error!(
                    %agent_id,
                    conversation_id = %conversation_id,
                    error = %e,
                    "failed to store delivered exchange"
                );
            })?;

        tracing::info!(
            %agent_id,
            conversation_id = %conversation_id,
            attempts = result.trace.attempts,
            human_queue = result.trace.human_queue,
            "chat request completed"
        );

        Ok(ChatResponse {
            pipeline: result.status(),
            message: result.delivered,
        })
    }
}

impl std::fmt::Debug for ChatService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatService")
            .field("pipeline", &self.pipeline)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}
