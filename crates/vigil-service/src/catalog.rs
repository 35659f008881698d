//! Agent role catalog
//!
//! Every business gets one agent per role its onboarding goals call for.
//! Each agent carries a role-specific system prompt that becomes the base
//! instruction of the review pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Account owning agents and a brand profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Generate new random ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique agent identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub Uuid);

impl AgentId {
    /// Generate new random ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a caller-supplied identifier
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(Self)
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Agent role
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Support,
    Sales,
    Finance,
    Marketing,
    Ops,
}

impl AgentRole {
    /// All roles in catalog order
    pub const ALL: [AgentRole; 5] = [
        AgentRole::Support,
        AgentRole::Sales,
        AgentRole::Finance,
        AgentRole::Marketing,
        AgentRole::Ops,
    ];

    /// Stable identifier
    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            AgentRole::Support => "support",
            AgentRole::Sales => "sales",
            AgentRole::Finance => "finance",
            AgentRole::Marketing => "marketing",
            AgentRole::Ops => "ops",
        }
    }

    /// Default agent name
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            AgentRole::Support => "Support Agent",
            AgentRole::Sales => "Sales Agent",
            AgentRole::Finance => "Finance Agent",
            AgentRole::Marketing => "Marketing Agent",
            AgentRole::Ops => "Operations Agent",
        }
    }

    /// What the agent does
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            AgentRole::Support => {
                "Answers customer questions, handles complaints, and resolves issues 24/7."
            }
            AgentRole::Sales => "Qualifies leads, follows up prospects, and helps close deals.",
            AgentRole::Finance => {
                "Tracks expenses, flags anomalies, and generates financial summaries."
            }
            AgentRole::Marketing => "Drafts content, writes copy, and helps plan campaigns.",
            AgentRole::Ops => "Handles scheduling, follow-ups, and keeps operations smooth.",
        }
    }

    /// Onboarding goals served by this role
    #[must_use]
    pub fn goals(self) -> &'static [&'static str] {
        match self {
            AgentRole::Support => &["support"],
            AgentRole::Sales => &["sales"],
            AgentRole::Finance => &["finance"],
            AgentRole::Marketing => &["marketing"],
            AgentRole::Ops => &["admin", "ops"],
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Distinct roles serving any of `goals`, in catalog order
#[must_use]
pub fn roles_for_goals<S: AsRef<str>>(goals: &[S]) -> Vec<AgentRole> {
    AgentRole::ALL
        .into_iter()
        .filter(|role| {
            goals
                .iter()
                .any(|goal| role.goals().contains(&goal.as_ref()))
        })
        .collect()
}

/// Voice an agent speaks in
///
/// Unknown labels fall back to professional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentTone {
    #[default]
    Professional,
    Friendly,
    Expert,
    Casual,
}

impl AgentTone {
    /// Parse a tone label leniently
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "friendly" => AgentTone::Friendly,
            "expert" => AgentTone::Expert,
            "casual" => AgentTone::Casual,
            _ => AgentTone::Professional,
        }
    }

    /// Lowercase label
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            AgentTone::Professional => "professional",
            AgentTone::Friendly => "friendly",
            AgentTone::Expert => "expert",
            AgentTone::Casual => "casual",
        }
    }

    /// Instruction inserted into the system prompt
    #[must_use]
    pub fn instruction(self) -> &'static str {
        match self {
            AgentTone::Professional => {
                "Communicate in a clear, authoritative, and professional manner. Be concise and trustworthy."
            }
            AgentTone::Friendly => {
                "Be warm, approachable, and personable. Use conversational language and show genuine care."
            }
            AgentTone::Expert => {
                "Demonstrate deep knowledge and confidence. Be precise and data-informed in your responses."
            }
            AgentTone::Casual => {
                "Keep it relaxed and conversational. Be helpful without being overly formal."
            }
        }
    }
}

impl From<String> for AgentTone {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl From<AgentTone> for String {
    fn from(tone: AgentTone) -> Self {
        tone.label().to_string()
    }
}

impl fmt::Display for AgentTone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Build the role-specific base instruction for an agent
#[must_use]
pub fn build_system_prompt(
    name: &str,
    role: AgentRole,
    description: &str,
    tone: AgentTone,
    business_name: &str,
) -> String {
    format!(
        "You are {name}, an AI {role} agent for {business_name}.

ROLE: {description}

TONE: {tone_instruction}

GUIDELINES:
- Keep responses concise and actionable (2-4 sentences unless detail is genuinely needed)
- Always stay in character as {name}
- If a request falls outside your role, acknowledge it warmly and suggest the right resource
- Never make up facts, prices, policies, or data you don't have
- Escalate serious issues (legal, financial, safety) to a human

ETHICS & VALUES:
- Be honest and transparent at all times
- Treat every person with respect regardless of their tone
- Do not use high-pressure tactics or create false urgency
- Protect user privacy: never ask for unnecessary personal information

You represent {business_name}. Every interaction reflects on the business.",
        role = role.id(),
        tone_instruction = tone.instruction(),
    )
}

/// Whether an agent answers chats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Active,
    Paused,
}

/// A provisioned agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub owner: UserId,
    pub name: String,
    pub role: AgentRole,
    pub description: String,
    pub tone: AgentTone,
    pub status: AgentStatus,
    /// Base instruction for the review pipeline
    pub system_prompt: String,
    pub created_at: DateTime<Utc>,
}

impl AgentRecord {
    /// Provision an active agent for a role
    #[must_use]
    pub fn provision(
        id: AgentId,
        owner: UserId,
        role: AgentRole,
        tone: AgentTone,
        business_name: &str,
    ) -> Self {
        let name = role.display_name().to_string();
        let description = role.description().to_string();
        let system_prompt = build_system_prompt(&name, role, &description, tone, business_name);

        Self {
            id,
            owner,
            name,
            role,
            description,
            tone,
            status: AgentStatus::Active,
            system_prompt,
            created_at: Utc::now(),
        }
    }

    /// With status
    #[inline]
    #[must_use]
    pub fn with_status(mut self, status: AgentStatus) -> Self {
        self.status = status;
        self
    }

    /// Check if the agent answers chats
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == AgentStatus::Active
    }
}
