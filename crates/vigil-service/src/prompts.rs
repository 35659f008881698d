//! Reviewer instructions built from a business's brand profile

use crate::catalog::{AgentRole, AgentTone};
use serde::{Deserialize, Serialize};

/// Name used when a business has not set one
pub const DEFAULT_BUSINESS_NAME: &str = "this business";

const VERDICT_FORMAT: &str =
    r#"Respond in JSON only: { "approved": true/false, "reason": "brief reason if rejected" }"#;

/// Identity a business gave during onboarding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrandProfile {
    pub business_name: Option<String>,
    pub tone: Option<AgentTone>,
    pub mission: Option<String>,
    pub values_statement: Option<String>,
    pub ethics_statement: Option<String>,
    pub brand_voice: Option<String>,
    /// Words and phrases the business never wants used
    pub brand_avoid: Vec<String>,
}

impl BrandProfile {
    /// Create profile for a named business
    #[must_use]
    pub fn named(business_name: impl Into<String>) -> Self {
        Self {
            business_name: Some(business_name.into()),
            ..Self::default()
        }
    }

    /// Business name, or a neutral stand-in
    #[must_use]
    pub fn business_name(&self) -> &str {
        present(self.business_name.as_ref()).unwrap_or(DEFAULT_BUSINESS_NAME)
    }

    /// Configured tone, professional when unset
    #[inline]
    #[must_use]
    pub fn tone(&self) -> AgentTone {
        self.tone.unwrap_or_default()
    }
}

fn present(field: Option<&String>) -> Option<&str> {
    field.map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Stage 1 reviewer instruction: ethics and compliance
#[must_use]
pub fn compliance_instruction(profile: &BrandProfile) -> String {
    let business = profile.business_name();
    let mut rules = Vec::new();
    if let Some(ethics) = present(profile.ethics_statement.as_ref()) {
        rules.push(format!("Business ethics commitments: {ethics}"));
    }
    rules.extend(
        [
            "- Contains false urgency or manipulative sales tactics",
            "- Makes claims that are clearly misleading or untrue",
            "- Contains discriminatory or offensive language",
            "- Asks for unnecessary private information",
            "- Gives specific legal or medical advice",
        ]
        .map(String::from),
    );

    format!(
        "You are SAGE, an AI Ethics & Compliance reviewer for {business}.

Review the agent response and approve it unless it clearly violates one of these rules:
{rules}

Be lenient: only reject responses that clearly break a rule. Approve anything reasonable.

{VERDICT_FORMAT}",
        rules = rules.join("\n"),
    )
}

/// Stage 2 reviewer instruction: culture and brand voice
#[must_use]
pub fn culture_instruction(profile: &BrandProfile) -> String {
    let business = profile.business_name();
    let mut identity = Vec::new();
    if let Some(mission) = present(profile.mission.as_ref()) {
        identity.push(format!("Business mission: {mission}"));
    }
    if let Some(values) = present(profile.values_statement.as_ref()) {
        identity.push(format!("Business values: {values}"));
    }
    if let Some(voice) = present(profile.brand_voice.as_ref()) {
        identity.push(format!("Brand voice: {voice}"));
    }
    let avoid: Vec<&str> = profile
        .brand_avoid
        .iter()
        .map(|w| w.trim())
        .filter(|w| !w.is_empty())
        .collect();
    if !avoid.is_empty() {
        identity.push(format!("Never use: {}", avoid.join(", ")));
    }

    let mut out = format!(
        "You are EMBER, an AI Culture & Values reviewer for {business}.

Review the agent response and approve it unless it clearly violates the brand voice."
    );
    for line in identity {
        out.push('\n');
        out.push_str(&line);
    }
    out.push_str(
        "\n\nBe lenient: only reject responses that clearly use banned language or badly contradict the brand voice. Approve anything reasonable.\n\n",
    );
    out.push_str(VERDICT_FORMAT);
    out
}

/// Context handed to both reviewers
#[must_use]
pub fn review_context(profile: &BrandProfile, role: AgentRole) -> String {
    format!(
        "Business: {}. Agent role: {}. Tone: {}.",
        profile.business_name(),
        role.id(),
        profile.tone().label()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acme() -> BrandProfile {
        BrandProfile {
            business_name: Some("Acme".to_string()),
            tone: Some(AgentTone::Friendly),
            mission: Some("Make shipping painless".to_string()),
            values_statement: Some("Honesty first".to_string()),
            ethics_statement: Some("We never upsell".to_string()),
            brand_voice: Some("Warm and plain".to_string()),
            brand_avoid: vec!["synergy".to_string(), " ".to_string(), "leverage".to_string()],
        }
    }

    #[test]
    fn empty_profile_uses_defaults() {
        let profile = BrandProfile::default();
        assert_eq!(profile.business_name(), "this business");
        assert_eq!(
            review_context(&profile, AgentRole::Support),
            "Business: this business. Agent role: support. Tone: professional."
        );
    }

    #[test]
    fn blank_business_name_uses_default() {
        let profile = BrandProfile::named("   ");
        assert_eq!(profile.business_name(), DEFAULT_BUSINESS_NAME);
    }

    #[test]
    fn review_context_format() {
        assert_eq!(
            review_context(&acme(), AgentRole::Sales),
            "Business: Acme. Agent role: sales. Tone: friendly."
        );
    }

    #[test]
    fn compliance_instruction_includes_ethics_statement() {
        let text = compliance_instruction(&acme());
        assert!(text.starts_with("You are SAGE, an AI Ethics & Compliance reviewer for Acme."));
        assert!(text.contains("Business ethics commitments: We never upsell"));
        assert!(text.contains("- Gives specific legal or medical advice"));
        assert!(text.ends_with(VERDICT_FORMAT));
    }

    #[test]
    fn compliance_instruction_without_ethics_statement() {
        let text = compliance_instruction(&BrandProfile::default());
        assert!(!text.contains("Business ethics commitments"));
        assert!(text.contains("rules:\n- Contains false urgency"));
    }

    #[test]
    fn culture_instruction_lists_identity() {
        let text = culture_instruction(&acme());
        assert!(text.starts_with("You are EMBER, an AI Culture & Values reviewer for Acme."));
        assert!(text.contains("Business mission: Make shipping painless"));
        assert!(text.contains("Business values: Honesty first"));
        assert!(text.contains("Brand voice: Warm and plain"));
        assert!(text.contains("Never use: synergy, leverage"));
    }

    #[test]
    fn culture_instruction_skips_missing_fields() {
        let text = culture_instruction(&BrandProfile::named("Acme"));
        assert!(!text.contains("Never use"));
        assert!(!text.contains("Business mission"));
        assert!(text.ends_with(VERDICT_FORMAT));
    }
}
