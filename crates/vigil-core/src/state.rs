//! Pipeline state machine
//!
//! The attempt loop is modelled as a pure step function folded over at most
//! `max_attempts` outcomes:
//!
//! ```text
//! PipelineState::new(max) --step(outcome)--> ... --step(outcome)--> terminal
//!                                                   Approved | Exhausted
//! ```
//!
//! The orchestrator performs the I/O (generation, reviews) and feeds each
//! outcome into [`PipelineState::step`]. Everything observable about a run,
//! the feedback carried between attempts and the trace, is derived here, so
//! it can be rebuilt from the recorded attempts with [`replay`].

use crate::escalation::EscalationPolicy;
use crate::types::{ReviewVerdict, Stage, StageStatus};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::num::NonZeroU32;

/// What one generate-then-review cycle produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptOutcome {
    /// Generated candidate text
    pub candidate: String,
    /// Stage 1 verdict
    pub compliance: ReviewVerdict,
    /// Stage 2 verdict, absent when stage 1 rejected
    pub culture: Option<ReviewVerdict>,
}

impl AttemptOutcome {
    /// Outcome where stage 1 rejected
    #[must_use]
    pub fn rejected_by_compliance(candidate: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            candidate: candidate.into(),
            compliance: ReviewVerdict::reject(reason),
            culture: None,
        }
    }

    /// Outcome where both stages ran
    #[must_use]
    pub fn reviewed(candidate: impl Into<String>, culture: ReviewVerdict) -> Self {
        Self {
            candidate: candidate.into(),
            compliance: ReviewVerdict::approve(),
            culture: Some(culture),
        }
    }

    /// Both stages approved this candidate
    #[inline]
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.compliance.approved && self.culture.as_ref().is_some_and(|v| v.approved)
    }
}

/// A recorded attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based attempt number
    pub index: u32,
    /// Generated candidate text
    pub candidate: String,
    /// Stage 1 verdict
    pub compliance: ReviewVerdict,
    /// Stage 2 verdict, absent when stage 1 rejected
    pub culture: Option<ReviewVerdict>,
}

impl Attempt {
    fn from_outcome(index: u32, outcome: AttemptOutcome) -> Self {
        let AttemptOutcome {
            candidate,
            compliance,
            culture,
        } = outcome;
        // Stage 2 never evaluates a candidate stage 1 rejected.
        let culture = if compliance.approved { culture } else { None };

        Self {
            index,
            candidate,
            compliance,
            culture,
        }
    }

    /// Both stages approved this candidate
    #[inline]
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.compliance.approved && self.culture.as_ref().is_some_and(|v| v.approved)
    }
}

impl From<Attempt> for AttemptOutcome {
    fn from(attempt: Attempt) -> Self {
        Self {
            candidate: attempt.candidate,
            compliance: attempt.compliance,
            culture: attempt.culture,
        }
    }
}

/// Rejection notes carried into the next generation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedbackState {
    compliance_note: String,
    culture_note: String,
}

impl FeedbackState {
    /// Pending note for a stage
    #[inline]
    #[must_use]
    pub fn note(&self, stage: Stage) -> &str {
        match stage {
            Stage::Compliance => &self.compliance_note,
            Stage::Culture => &self.culture_note,
        }
    }

    /// Rework instruction appended to the base instruction
    ///
    /// Stage 1 feedback always precedes stage 2 feedback.
    #[must_use]
    pub fn rework_instruction(&self) -> String {
        let mut out = String::new();
        for stage in [Stage::Compliance, Stage::Culture] {
            let note = self.note(stage);
            if !note.is_empty() {
                let _ = write!(
                    out,
                    "\n\n{} reviewer feedback: {note}. Please address this.",
                    stage.label()
                );
            }
        }
        out
    }

    /// Fold an attempt's verdicts into the pending notes
    pub fn absorb(&mut self, attempt: &Attempt) {
        if !attempt.compliance.approved {
            self.compliance_note.clone_from(&attempt.compliance.reason);
            // A fresh stage 1 rejection invalidates any stage 2 critique.
            self.culture_note.clear();
            return;
        }

        if let Some(culture) = attempt.culture.as_ref().filter(|v| !v.approved) {
            self.culture_note.clone_from(&culture.reason);
        }
    }
}

/// One stage evaluation in the trace log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Attempt the evaluation belongs to
    pub attempt: u32,
    /// Stage that evaluated
    pub stage: Stage,
    /// Resulting status
    pub status: StageStatus,
    /// Rejection reason, empty on pass
    pub reason: String,
}

/// Externally observable record of how the decision was reached
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineTrace {
    /// Latest stage 1 status
    pub compliance: StageStatus,
    /// Latest stage 2 status
    pub culture: StageStatus,
    /// Latest stage 1 reason
    pub compliance_note: String,
    /// Latest stage 2 reason
    pub culture_note: String,
    /// Attempts consumed
    pub attempts: u32,
    /// Conversation flagged for human follow-up
    pub human_queue: bool,
    /// Every stage evaluation in order
    pub log: Vec<StageRecord>,
}

impl PipelineTrace {
    /// Latest status of a stage
    #[inline]
    #[must_use]
    pub fn status(&self, stage: Stage) -> StageStatus {
        match stage {
            Stage::Compliance => self.compliance,
            Stage::Culture => self.culture,
        }
    }

    /// Latest reason recorded for a stage
    #[inline]
    #[must_use]
    pub fn note(&self, stage: Stage) -> &str {
        match stage {
            Stage::Compliance => &self.compliance_note,
            Stage::Culture => &self.culture_note,
        }
    }

    /// Number of evaluations a stage performed
    #[must_use]
    pub fn evaluations(&self, stage: Stage) -> usize {
        self.log.iter().filter(|r| r.stage == stage).count()
    }

    fn record(&mut self, attempt: u32, stage: Stage, verdict: &ReviewVerdict) {
        let status = verdict.status();
        match stage {
            Stage::Compliance => {
                self.compliance = status;
                self.compliance_note.clone_from(&verdict.reason);
            }
            Stage::Culture => {
                self.culture = status;
                self.culture_note.clone_from(&verdict.reason);
            }
        }
        self.log.push(StageRecord {
            attempt,
            stage,
            status,
            reason: verdict.reason.clone(),
        });
    }

    /// Wire representation returned to callers
    #[must_use]
    pub fn status_payload(&self) -> PipelineStatus {
        PipelineStatus {
            stage1: self.compliance,
            stage2: self.culture,
            attempts: self.attempts,
            human_queue: self.human_queue,
            stage1_note: self.compliance_note.clone(),
            stage2_note: self.culture_note.clone(),
        }
    }
}

/// Pipeline status as returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatus {
    pub stage1: StageStatus,
    pub stage2: StageStatus,
    pub attempts: u32,
    pub human_queue: bool,
    pub stage1_note: String,
    pub stage2_note: String,
}

/// Where the run stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// More attempts may follow
    Running,
    /// Both stages approved the candidate of this attempt
    Approved { attempt: u32 },
    /// Budget spent without a jointly approved candidate
    Exhausted,
}

impl Phase {
    /// Check if the run reached a terminal phase
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Phase::Running)
    }
}

/// Terminal output of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResult {
    /// Message handed to the delivery sink
    pub delivered: String,
    /// How the decision was reached
    pub trace: PipelineTrace,
}

impl PipelineResult {
    /// Check if the run ended in escalation
    #[inline]
    #[must_use]
    pub fn is_escalated(&self) -> bool {
        self.trace.human_queue
    }

    /// Wire status payload
    #[inline]
    #[must_use]
    pub fn status(&self) -> PipelineStatus {
        self.trace.status_payload()
    }
}

/// State of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineState {
    max_attempts: NonZeroU32,
    attempts: Vec<Attempt>,
    feedback: FeedbackState,
    trace: PipelineTrace,
    phase: Phase,
}

impl PipelineState {
    /// Fresh state with both stages pending
    #[must_use]
    pub fn new(max_attempts: NonZeroU32) -> Self {
        Self {
            max_attempts,
            attempts: Vec::new(),
            feedback: FeedbackState::default(),
            trace: PipelineTrace::default(),
            phase: Phase::Running,
        }
    }

    /// Index of the next attempt, or `None` once terminal
    #[must_use]
    pub fn next_index(&self) -> Option<u32> {
        if self.phase.is_terminal() {
            None
        } else {
            Some(self.attempt_count() + 1)
        }
    }

    /// Rework instruction for the next generation
    #[inline]
    #[must_use]
    pub fn rework_instruction(&self) -> String {
        self.feedback.rework_instruction()
    }

    /// Advance by one attempt
    ///
    /// Outcomes fed after a terminal phase are ignored.
    #[must_use]
    pub fn step(mut self, outcome: AttemptOutcome) -> Self {
        let Some(index) = self.next_index() else {
            tracing::warn!(phase = ?self.phase, "ignoring attempt after terminal phase");
            return self;
        };

        let attempt = Attempt::from_outcome(index, outcome);

        self.trace.attempts = index;
        self.trace.record(index, Stage::Compliance, &attempt.compliance);
        if let Some(culture) = &attempt.culture {
            self.trace.record(index, Stage::Culture, culture);
        }
        self.feedback.absorb(&attempt);

        self.phase = if attempt.is_approved() {
            Phase::Approved { attempt: index }
        } else if index >= self.max_attempts.get() {
            Phase::Exhausted
        } else {
            Phase::Running
        };

        self.attempts.push(attempt);
        self
    }

    /// Current phase
    #[inline]
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Recorded attempts
    #[inline]
    #[must_use]
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// Pending feedback
    #[inline]
    #[must_use]
    pub fn feedback(&self) -> &FeedbackState {
        &self.feedback
    }

    /// Trace so far
    #[inline]
    #[must_use]
    pub fn trace(&self) -> &PipelineTrace {
        &self.trace
    }

    /// Attempt budget
    #[inline]
    #[must_use]
    pub fn max_attempts(&self) -> NonZeroU32 {
        self.max_attempts
    }

    fn attempt_count(&self) -> u32 {
        u32::try_from(self.attempts.len()).unwrap_or(u32::MAX)
    }

    /// Produce the terminal result
    ///
    /// Anything other than an approved attempt escalates.
    #[must_use]
    pub fn finish(self) -> PipelineResult {
        let Self {
            attempts,
            mut trace,
            phase,
            ..
        } = self;

        let approved = match phase {
            Phase::Approved { attempt } => attempts
                .into_iter()
                .find(|a| a.index == attempt)
                .map(|a| a.candidate),
            Phase::Running | Phase::Exhausted => None,
        };

        match approved {
            Some(delivered) => PipelineResult { delivered, trace },
            None => {
                let escalation = EscalationPolicy::fallback();
                trace.human_queue = escalation.human_queue;
                PipelineResult {
                    delivered: escalation.text,
                    trace,
                }
            }
        }
    }
}

/// Rebuild a run's state from its recorded attempts
#[must_use]
pub fn replay<I>(max_attempts: NonZeroU32, attempts: I) -> PipelineState
where
    I: IntoIterator<Item = Attempt>,
{
    attempts
        .into_iter()
        .map(AttemptOutcome::from)
        .fold(PipelineState::new(max_attempts), PipelineState::step)
}
