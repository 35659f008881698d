//! Review pipeline orchestrator
//!
//! Drives the attempt loop:
//! - Generate a candidate with the accumulated rework instruction
//! - Stage 1 (compliance) review; a rejection skips stage 2
//! - Stage 2 (culture) review on the same candidate
//! - Retry until both approve or the attempt budget is spent
//!
//! All state lives in one [`PipelineState`] per run. Runs share nothing but
//! the capability handles, so independent conversations can be processed
//! concurrently.

use crate::capability::{GenerationAdapter, Generator, LlmBackend, ReviewAdapter, Reviewer};
use crate::config::{PipelineConfig, DEFAULT_MAX_ATTEMPTS};
use crate::error::{ConfigError, PipelineError};
use crate::state::{AttemptOutcome, Phase, PipelineResult, PipelineState};
use crate::types::{ConversationHistory, ReviewVerdict, RunId, Stage};
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything one run needs besides the capabilities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    /// Validated conversation
    pub history: ConversationHistory,
    /// Role-specific generation instruction
    pub base_instruction: String,
    /// Context handed to both reviewers
    pub review_context: String,
    /// Stage 1 reviewer instruction
    pub compliance_instruction: String,
    /// Stage 2 reviewer instruction
    pub culture_instruction: String,
}

impl RunRequest {
    /// Create request with empty review instructions
    #[must_use]
    pub fn new(history: ConversationHistory, base_instruction: impl Into<String>) -> Self {
        Self {
            history,
            base_instruction: base_instruction.into(),
            review_context: String::new(),
            compliance_instruction: String::new(),
            culture_instruction: String::new(),
        }
    }

    /// With reviewer context
    #[inline]
    #[must_use]
    pub fn with_review_context(mut self, context: impl Into<String>) -> Self {
        self.review_context = context.into();
        self
    }

    /// With stage 1 instruction
    #[inline]
    #[must_use]
    pub fn with_compliance_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.compliance_instruction = instruction.into();
        self
    }

    /// With stage 2 instruction
    #[inline]
    #[must_use]
    pub fn with_culture_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.culture_instruction = instruction.into();
        self
    }

    fn instruction(&self, stage: Stage) -> &str {
        match stage {
            Stage::Compliance => &self.compliance_instruction,
            Stage::Culture => &self.culture_instruction,
        }
    }
}

/// The generate-review-retry-escalate pipeline
#[derive(Clone)]
pub struct ReviewPipeline {
    generator: Arc<dyn Generator>,
    compliance: Arc<dyn Reviewer>,
    culture: Arc<dyn Reviewer>,
    max_attempts: NonZeroU32,
}

impl ReviewPipeline {
    /// Create pipeline using one reviewer for both stages
    #[must_use]
    pub fn new(generator: Arc<dyn Generator>, reviewer: Arc<dyn Reviewer>) -> Self {
        Self {
            generator,
            compliance: reviewer.clone(),
            culture: reviewer,
            max_attempts: NonZeroU32::MIN.saturating_add(DEFAULT_MAX_ATTEMPTS - 1),
        }
    }

    /// Build the production pipeline over one model backend
    ///
    /// # Errors
    /// Returns `ConfigError` if the configuration is invalid.
    pub fn from_config(
        backend: Arc<dyn LlmBackend>,
        config: &PipelineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let generator = GenerationAdapter::from_config(backend.clone(), config);
        let reviewer = ReviewAdapter::from_config(backend, config);

        Ok(Self::new(Arc::new(generator), Arc::new(reviewer))
            .with_max_attempts(config.attempt_budget()?))
    }

    /// With a dedicated stage 2 reviewer
    #[inline]
    #[must_use]
    pub fn with_culture_reviewer(mut self, reviewer: Arc<dyn Reviewer>) -> Self {
        self.culture = reviewer;
        self
    }

    /// With a dedicated stage 1 reviewer
    #[inline]
    #[must_use]
    pub fn with_compliance_reviewer(mut self, reviewer: Arc<dyn Reviewer>) -> Self {
        self.compliance = reviewer;
        self
    }

    /// With attempt budget
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: NonZeroU32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Attempt budget
    #[inline]
    #[must_use]
    pub fn max_attempts(&self) -> NonZeroU32 {
        self.max_attempts
    }

    /// Run the pipeline to a terminal result
    pub async fn run(&self, request: &RunRequest) -> PipelineResult {
        self.run_to_state(request).await.finish()
    }

    /// Run the pipeline, giving up as soon as `cancel` fires
    ///
    /// Dropping the in-flight run cancels whichever stage call is pending.
    /// Nothing has been delivered at that point, so there is nothing to roll
    /// back.
    ///
    /// # Errors
    /// `PipelineError::Cancelled` if the token fired first.
    pub async fn run_cancellable(
        &self,
        request: &RunRequest,
        cancel: &CancellationToken,
    ) -> Result<PipelineResult, PipelineError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::info!("pipeline run cancelled by caller");
                Err(PipelineError::Cancelled)
            }
            result = self.run(request) => Ok(result),
        }
    }

    /// Run the pipeline and return its final state, attempts included
    pub async fn run_to_state(&self, request: &RunRequest) -> PipelineState {
        let run_id = RunId::new();
        tracing::info!(
            %run_id,
            max_attempts = self.max_attempts.get(),
            history_len = request.history.len(),
            "starting review pipeline"
        );

        let mut state = PipelineState::new(self.max_attempts);
        while let Some(attempt) = state.next_index() {
            let rework = state.rework_instruction();
            tracing::debug!(
                %run_id,
                attempt,
                has_feedback = !rework.is_empty(),
                "generating candidate"
            );

            let candidate = self
                .generator
                .generate(&request.base_instruction, &rework, &request.history)
                .await;
            let outcome = self.review(run_id, attempt, candidate, request).await;
            state = state.step(outcome);
        }

        match state.phase() {
            Phase::Approved { attempt } => {
                tracing::info!(%run_id, attempt, "candidate approved by both stages");
            }
            Phase::Exhausted | Phase::Running => {
                tracing::warn!(
                    %run_id,
                    attempts = state.attempts().len(),
                    "attempt budget exhausted; escalating to human queue"
                );
            }
        }

        state
    }

    async fn review(
        &self,
        run_id: RunId,
        attempt: u32,
        candidate: String,
        request: &RunRequest,
    ) -> AttemptOutcome {
        let compliance = self
            .compliance
            .evaluate(
                request.instruction(Stage::Compliance),
                &candidate,
                &request.review_context,
            )
            .await;
        log_verdict(run_id, attempt, Stage::Compliance, &compliance);

        if !compliance.approved {
            return AttemptOutcome {
                candidate,
                compliance,
                culture: None,
            };
        }

        let culture = self
            .culture
            .evaluate(
                request.instruction(Stage::Culture),
                &candidate,
                &request.review_context,
            )
            .await;
        log_verdict(run_id, attempt, Stage::Culture, &culture);

        AttemptOutcome {
            candidate,
            compliance,
            culture: Some(culture),
        }
    }
}

impl std::fmt::Debug for ReviewPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewPipeline")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

fn log_verdict(run_id: RunId, attempt: u32, stage: Stage, verdict: &ReviewVerdict) {
    tracing::debug!(
        %run_id,
        attempt,
        stage = %stage,
        stage_no = stage.ordinal(),
        approved = verdict.approved,
        reason = %verdict.reason,
        "stage verdict"
    );
}
