//! Vigil Core - Reviewed reply pipeline
//!
//! Generates a candidate reply, then subjects it to two ordered policy
//! reviews before it may be delivered:
//! - Stage 1: compliance (ethics, honesty, privacy)
//! - Stage 2: culture (mission, values, brand voice)
//!
//! A rejection feeds the reviewer's reason back into the next generation.
//! When the attempt budget runs out, the run escalates to a fixed fallback
//! message and flags the conversation for human follow-up.
//!
//! # Example
//!
//! ```rust,ignore
//! use vigil_core::{ConversationHistory, ChatMessage, ReviewPipeline, RunRequest};
//!
//! # async fn example(pipeline: ReviewPipeline) -> Result<(), Box<dyn std::error::Error>> {
//! let history = ConversationHistory::new(vec![ChatMessage::user("Do you ship internationally?")])?;
//! let request = RunRequest::new(history, "You are Support Agent...")
//!     .with_compliance_instruction("You are an ethics reviewer...")
//!     .with_culture_instruction("You are a culture reviewer...");
//!
//! let result = pipeline.run(&request).await;
//! println!("{} (attempts: {})", result.delivered, result.trace.attempts);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod capability;
pub mod config;
pub mod error;
pub mod escalation;
pub mod orchestrator;
pub mod state;
pub mod types;

// Re-exports for convenience
pub use capability::{
    parse_verdict, CompletionRequest, GenerationAdapter, Generator, LlmBackend, ReviewAdapter,
    Reviewer, NEUTRAL_APOLOGY,
};
pub use config::PipelineConfig;
pub use error::{ConfigError, HistoryError, LlmError, PipelineError, VerdictError};
pub use escalation::{Escalation, EscalationPolicy, FALLBACK_MESSAGE};
pub use orchestrator::{ReviewPipeline, RunRequest};
pub use state::{
    replay, Attempt, AttemptOutcome, FeedbackState, Phase, PipelineResult, PipelineState,
    PipelineStatus, PipelineTrace, StageRecord,
};
pub use types::{ChatMessage, ConversationHistory, ReviewVerdict, RunId, Stage, StageStatus};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Vigil Core
    pub use crate::{
        ChatMessage, ConversationHistory, Generator, LlmBackend, PipelineConfig, PipelineResult,
        ReviewPipeline, ReviewVerdict, Reviewer, RunRequest, Stage, StageStatus,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
