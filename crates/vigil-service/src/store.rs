//! Collaborator seams for the chat service
//!
//! The chat flow depends on four narrow capabilities:
//! - [`Authenticator`]: bearer token to caller
//! - [`AgentStore`]: active agents owned by the caller
//! - [`ProfileStore`]: the caller's brand profile
//! - [`MessageSink`]: persistence of the delivered exchange
//!
//! The in-memory implementations back the `vigil` binary (seeded from the
//! configuration file) and the test suites.

use crate::catalog::{roles_for_goals, AgentId, AgentRecord, UserId};
use crate::config::SeedConfig;
use crate::prompts::BrandProfile;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;
use vigil_core::ChatMessage;

/// Delivery sink failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// Backing store unavailable or rejected the write
    #[error("message store unavailable: {0}")]
    Unavailable(String),
}

/// Resolves bearer tokens to callers
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Caller for a token, `None` when unauthenticated
    async fn authenticate(&self, bearer: &str) -> Option<UserId>;
}

/// Agent lookup
#[async_trait]
pub trait AgentStore: Send + Sync {
    /// Active agent `agent_id` owned by `owner`
    async fn find_agent(&self, agent_id: AgentId, owner: UserId) -> Option<AgentRecord>;
}

/// Brand profile lookup
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Profile of `owner`, `None` if never set
    async fn profile(&self, owner: UserId) -> Option<BrandProfile>;
}

/// Persists the delivered exchange
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Store the triggering user message and the delivered reply
    ///
    /// # Errors
    /// `SinkError` if the exchange could not be stored.
    async fn deliver(&self, records: [DeliveryRecord; 2]) -> Result<(), SinkError>;
}

/// One stored conversation message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRecord {
    pub id: Uuid,
    pub conversation_id: String,
    #[serde(flatten)]
    pub message: ChatMessage,
    pub created_at: DateTime<Utc>,
}

impl DeliveryRecord {
    /// Create record stamped now
    #[must_use]
    pub fn new(conversation_id: impl Into<String>, message: ChatMessage) -> Self {
        Self {
            id: Uuid::new_v4(),
            conversation_id: conversation_id.into(),
            message,
            created_at: Utc::now(),
        }
    }

    /// The user/assistant pair for one exchange
    #[must_use]
    pub fn exchange(conversation_id: &str, user: &str, assistant: &str) -> [Self; 2] {
        [
            Self::new(conversation_id, ChatMessage::user(user)),
            Self::new(conversation_id, ChatMessage::assistant(assistant)),
        ]
    }
}

/// Token table authenticator
#[derive(Debug, Default)]
pub struct InMemoryAuthenticator {
    tokens: DashMap<String, UserId>,
}

impl InMemoryAuthenticator {
    /// Create empty authenticator
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token
    pub fn insert(&self, token: impl Into<String>, user: UserId) {
        self.tokens.insert(token.into(), user);
    }
}

#[async_trait]
impl Authenticator for InMemoryAuthenticator {
    async fn authenticate(&self, bearer: &str) -> Option<UserId> {
        self.tokens.get(bearer).map(|entry| *entry.value())
    }
}

/// Agent table
#[derive(Debug, Default)]
pub struct InMemoryAgentStore {
    agents: DashMap<AgentId, AgentRecord>,
}

impl InMemoryAgentStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an agent
    pub fn insert(&self, agent: AgentRecord) {
        self.agents.insert(agent.id, agent);
    }

    /// All agents of `owner`, any status, sorted by role
    #[must_use]
    pub fn owned_by(&self, owner: UserId) -> Vec<AgentRecord> {
        let mut agents: Vec<_> = self
            .agents
            .iter()
            .filter(|agent| agent.owner == owner)
            .map(|agent| agent.value().clone())
            .collect();
        agents.sort_by_key(|agent| agent.role);
        agents
    }

    /// Number of agents
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Check if no agents are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[async_trait]
impl AgentStore for InMemoryAgentStore {
    async fn find_agent(&self, agent_id: AgentId, owner: UserId) -> Option<AgentRecord> {
        self.agents
            .get(&agent_id)
            .filter(|agent| agent.owner == owner && agent.is_active())
            .map(|agent| agent.value().clone())
    }
}

/// Profile table
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: DashMap<UserId, BrandProfile>,
}

impl InMemoryProfileStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile
    pub fn insert(&self, owner: UserId, profile: BrandProfile) {
        self.profiles.insert(owner, profile);
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn profile(&self, owner: UserId) -> Option<BrandProfile> {
        self.profiles.get(&owner).map(|p| p.value().clone())
    }
}

/// Conversation log keyed by conversation id
#[derive(Debug, Default)]
pub struct InMemoryMessageSink {
    conversations: DashMap<String, Vec<DeliveryRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryMessageSink {
    /// Create empty sink
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent deliveries fail (or succeed again)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Stored messages of a conversation, oldest first
    #[must_use]
    pub fn conversation(&self, conversation_id: &str) -> Vec<DeliveryRecord> {
        self.conversations
            .get(conversation_id)
            .map(|records| records.value().clone())
            .unwrap_or_default()
    }

    /// Total stored messages
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.conversations.iter().map(|c| c.value().len()).sum()
    }
}

#[async_trait]
impl MessageSink for InMemoryMessageSink {
    async fn deliver(&self, records: [DeliveryRecord; 2]) -> Result<(), SinkError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SinkError::Unavailable("writes disabled".to_string()));
        }

        let [user, assistant] = records;
        // Both records land under one entry guard so the pair is never split.
        self.conversations
            .entry(user.conversation_id.clone())
            .or_default()
            .extend([user, assistant]);
        Ok(())
    }
}

/// In-memory implementations of every collaborator
#[derive(Debug, Clone, Default)]
pub struct InMemoryStores {
    pub auth: Arc<InMemoryAuthenticator>,
    pub agents: Arc<InMemoryAgentStore>,
    pub profiles: Arc<InMemoryProfileStore>,
    pub sink: Arc<InMemoryMessageSink>,
}

impl InMemoryStores {
    /// Create empty stores
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate stores from the `[seed]` configuration section
    ///
    /// Agents are provisioned with their owner's business name, so profiles
    /// are loaded first.
    #[must_use]
    pub fn from_seed(seed: &SeedConfig) -> Self {
        let stores = Self::new();

        for token in &seed.tokens {
            stores.auth.insert(token.token.clone(), token.user);
        }
        for profile in &seed.profiles {
            stores.profiles.insert(profile.user, profile.profile.clone());
        }
        for agent in &seed.agents {
            let profile = seed
                .profiles
                .iter()
                .find(|p| p.user == agent.owner)
                .map(|p| &p.profile);
            let business_name = profile.map_or(crate::prompts::DEFAULT_BUSINESS_NAME, |p| {
                p.business_name()
            });
            let tone = agent
                .tone
                .or_else(|| profile.and_then(|p| p.tone))
                .unwrap_or_default();

            let mut record =
                AgentRecord::provision(agent.id, agent.owner, agent.role, tone, business_name);
            if let Some(status) = agent.status {
                record = record.with_status(status);
            }
            stores.agents.insert(record);
        }
        for profile in &seed.profiles {
            stores.onboard(profile.user, &profile.goals, &profile.profile, seed);
        }

        tracing::info!(
            tokens = seed.tokens.len(),
            profiles = seed.profiles.len(),
            agents = stores.agents.len(),
            "seeded in-memory stores"
        );
        stores
    }

    /// Provision one agent per role serving `goals`
    ///
    /// Roles the owner already has an explicitly seeded agent for are skipped.
    fn onboard(&self, owner: UserId, goals: &[String], profile: &BrandProfile, seed: &SeedConfig) {
        for role in roles_for_goals(goals) {
            let seeded = seed
                .agents
                .iter()
                .any(|agent| agent.owner == owner && agent.role == role);
            if seeded {
                continue;
            }

            let record = AgentRecord::provision(
                AgentId::new(),
                owner,
                role,
                profile.tone.unwrap_or_default(),
                profile.business_name(),
            );
            tracing::debug!(%owner, agent = %record.id, %role, "onboarded agent");
            self.agents.insert(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AgentRole, AgentStatus, AgentTone};

    fn agent(owner: UserId) -> AgentRecord {
        AgentRecord::provision(
            AgentId::new(),
            owner,
            AgentRole::Support,
            AgentTone::Friendly,
            "Acme",
        )
    }

    #[tokio::test]
    async fn agents_are_scoped_to_owner() {
        let store = InMemoryAgentStore::new();
        let owner = UserId::new();
        let record = agent(owner);
        let id = record.id;
        store.insert(record);

        assert!(store.find_agent(id, owner).await.is_some());
        assert!(store.find_agent(id, UserId::new()).await.is_none());
        assert!(store.find_agent(AgentId::new(), owner).await.is_none());
    }

    #[tokio::test]
    async fn paused_agents_are_hidden() {
        let store = InMemoryAgentStore::new();
        let owner = UserId::new();
        let record = agent(owner).with_status(AgentStatus::Paused);
        let id = record.id;
        store.insert(record);

        assert!(store.find_agent(id, owner).await.is_none());
    }

    #[tokio::test]
    async fn sink_stores_pairs_in_order() {
        let sink = InMemoryMessageSink::new();
        sink.deliver(DeliveryRecord::exchange("c1", "hi", "hello"))
            .await
            .unwrap();
        sink.deliver(DeliveryRecord::exchange("c1", "bye", "goodbye"))
            .await
            .unwrap();

        let contents: Vec<_> = sink
            .conversation("c1")
            .iter()
            .map(|r| r.message.content().to_string())
            .collect();
        assert_eq!(contents, vec!["hi", "hello", "bye", "goodbye"]);
        assert!(sink.conversation("c2").is_empty());
    }

    #[tokio::test]
    async fn unavailable_sink_rejects() {
        let sink = InMemoryMessageSink::new();
        sink.set_unavailable(true);

        let result = sink.deliver(DeliveryRecord::exchange("c1", "hi", "hello")).await;
        assert!(matches!(result, Err(SinkError::Unavailable(_))));
        assert_eq!(sink.message_count(), 0);
    }

    #[test]
    fn delivery_record_wire_shape() {
        let record = DeliveryRecord::new("c1", ChatMessage::assistant("hello"));
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["conversation_id"], "c1");
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "hello");
    }
}
