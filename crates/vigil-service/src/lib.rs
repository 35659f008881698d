//! Vigil Service - Chat endpoint for reviewed agent replies
//!
//! Turns an authenticated chat request into one review pipeline run:
//! - Agent catalog and role-specific system prompts
//! - Reviewer instructions built from the business's brand profile
//! - Collaborator seams (auth, agents, profiles, delivery) with in-memory
//!   implementations
//! - `POST /api/chat` over warp
//! - TOML configuration for the `vigil` binary

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod catalog;
pub mod chat;
pub mod config;
pub mod http;
pub mod prompts;
pub mod store;

pub use catalog::{
    build_system_prompt, roles_for_goals, AgentId, AgentRecord, AgentRole, AgentStatus,
    AgentTone, UserId,
};
pub use chat::{ChatError, ChatRequest, ChatResponse, ChatService, Collaborators};
pub use config::{ServiceConfig, ServiceConfigError};
pub use prompts::{compliance_instruction, culture_instruction, review_context, BrandProfile};
pub use store::{
    AgentStore, Authenticator, DeliveryRecord, InMemoryStores, MessageSink, ProfileStore,
    SinkError,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
