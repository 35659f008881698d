//! Escalation policy
//!
//! Terminal fallback taken when the attempt budget runs out without a
//! candidate approved by both stages.

use serde::{Deserialize, Serialize};

/// Fixed message delivered on escalation
pub const FALLBACK_MESSAGE: &str = "I'm sorry, I wasn't able to provide a complete response right now. A member of our team has been notified and will follow up with you shortly.";

/// Escalation outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escalation {
    /// Text delivered to the user
    pub text: String,
    /// Conversation must be picked up by a human
    pub human_queue: bool,
}

/// Stateless escalation policy
#[derive(Debug, Clone, Copy, Default)]
pub struct EscalationPolicy;

impl EscalationPolicy {
    /// Produce the fallback outcome
    #[inline]
    #[must_use]
    pub fn fallback() -> Escalation {
        Escalation {
            text: FALLBACK_MESSAGE.to_string(),
            human_queue: true,
        }
    }
}
