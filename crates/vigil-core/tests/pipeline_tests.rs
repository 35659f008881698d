use pretty_assertions::assert_eq;
use std::num::NonZeroU32;
use std::sync::Arc;
use vigil_core::{
    LlmError, ReviewAdapter, ReviewPipeline, ReviewVerdict, StageStatus, FALLBACK_MESSAGE,
    NEUTRAL_APOLOGY,
};
use vigil_core::{GenerationAdapter, Stage};
use vigil_test_utils::{
    run_request, ScriptedBackend, ScriptedGenerator, ScriptedReviewer, COMPLIANCE_INSTRUCTION,
    CULTURE_INSTRUCTION, REVIEW_CONTEXT,
};

fn budget(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).unwrap()
}

#[tokio::test]
async fn test_ships_internationally_scenario() {
    let generator = ScriptedGenerator::always("Yes, we ship to over 40 countries.");
    let pipeline = ReviewPipeline::new(generator.clone(), ScriptedReviewer::approving());

    let result = pipeline.run(&run_request("Do you ship internationally?")).await;

    assert_eq!(result.delivered, "Yes, we ship to over 40 countries.");
    assert_eq!(result.trace.attempts, 1);
    assert!(!result.trace.human_queue);
    assert_eq!(result.trace.compliance, StageStatus::Pass);
    assert_eq!(result.trace.culture, StageStatus::Pass);
    assert_eq!(generator.calls().len(), 1);
    assert_eq!(generator.rework_for(1), "");
}

#[tokio::test]
async fn test_manipulative_tone_scenario_escalates() {
    let compliance = ScriptedReviewer::rejecting("manipulative tone");
    let culture = ScriptedReviewer::approving();
    let pipeline = ReviewPipeline::new(ScriptedGenerator::always("Buy now!"), compliance.clone())
        .with_culture_reviewer(culture.clone())
        .with_max_attempts(budget(3));

    let result = pipeline.run(&run_request("Should I buy?")).await;
    let status = result.status();

    assert_eq!(status.attempts, 3);
    assert!(status.human_queue);
    assert_eq!(status.stage1, StageStatus::Rework);
    assert_eq!(status.stage2, StageStatus::Pending);
    assert_eq!(status.stage1_note, "manipulative tone");
    assert_eq!(result.delivered, FALLBACK_MESSAGE);
    assert_eq!(compliance.call_count(), 3);
    assert_eq!(culture.call_count(), 0);
}

#[tokio::test]
async fn test_always_rejecting_stops_at_budget() {
    let generator = ScriptedGenerator::always("meh");
    let compliance = ScriptedReviewer::new([
        ReviewVerdict::approve(),
        ReviewVerdict::reject("misleading"),
    ]);
    let culture = ScriptedReviewer::rejecting("off brand");
    let pipeline = ReviewPipeline::new(generator.clone(), compliance)
        .with_culture_reviewer(culture)
        .with_max_attempts(budget(3));

    let result = pipeline.run(&run_request("hi")).await;

    assert_eq!(generator.calls().len(), 3);
    assert_eq!(result.trace.attempts, 3);
    assert!(result.is_escalated());
}

#[tokio::test]
async fn test_compliance_feedback_reaches_second_attempt() {
    let generator = ScriptedGenerator::new(["first draft", "second draft"]);
    let compliance = ScriptedReviewer::new([
        ReviewVerdict::reject("creates false urgency"),
        ReviewVerdict::approve(),
    ]);
    let pipeline = ReviewPipeline::new(generator.clone(), compliance)
        .with_culture_reviewer(ScriptedReviewer::approving());

    let result = pipeline.run(&run_request("hi")).await;

    assert_eq!(result.delivered, "second draft");
    assert_eq!(result.trace.attempts, 2);
    let rework = generator.rework_for(2);
    assert!(rework.contains("creates false urgency"));
    assert!(!rework.contains("Culture reviewer feedback"));
}

#[tokio::test]
async fn test_compliance_rejection_discards_culture_note() {
    // attempt 1: culture rejects (R2); attempt 2: compliance rejects (R1b);
    // attempt 3 must see R1b but not R2.
    let generator = ScriptedGenerator::new(["a", "b", "c"]);
    let compliance = ScriptedReviewer::new([
        ReviewVerdict::approve(),
        ReviewVerdict::reject("unverified claim"),
        ReviewVerdict::approve(),
    ]);
    let culture = ScriptedReviewer::new([
        ReviewVerdict::reject("too corporate"),
        ReviewVerdict::approve(),
    ]);
    let pipeline = ReviewPipeline::new(generator.clone(), compliance)
        .with_culture_reviewer(culture.clone())
        .with_max_attempts(budget(4));

    let result = pipeline.run(&run_request("hi")).await;

    assert_eq!(
        generator.rework_for(2),
        "\n\nCulture reviewer feedback: too corporate. Please address this."
    );
    let third = generator.rework_for(3);
    assert!(third.contains("unverified claim"));
    assert!(!third.contains("too corporate"));

    assert_eq!(result.delivered, "c");
    assert_eq!(result.trace.attempts, 3);
    assert_eq!(culture.call_count(), 2);
}

#[tokio::test]
async fn test_reviewers_receive_their_instructions() {
    let compliance = ScriptedReviewer::approving();
    let culture = ScriptedReviewer::approving();
    let pipeline = ReviewPipeline::new(ScriptedGenerator::always("ok"), compliance.clone())
        .with_culture_reviewer(culture.clone());

    pipeline.run(&run_request("hi")).await;

    let stage1 = &compliance.calls()[0];
    assert_eq!(stage1.instruction, COMPLIANCE_INSTRUCTION);
    assert_eq!(stage1.candidate, "ok");
    assert_eq!(stage1.context, REVIEW_CONTEXT);
    assert_eq!(culture.calls()[0].instruction, CULTURE_INSTRUCTION);
}

#[tokio::test]
async fn test_failing_reviewer_backend_fails_open() {
    let reviewer = ReviewAdapter::new(ScriptedBackend::failing());
    let culture = ScriptedReviewer::approving();
    let pipeline = ReviewPipeline::new(ScriptedGenerator::always("Hello!"), Arc::new(reviewer))
        .with_culture_reviewer(culture.clone());

    let result = pipeline.run(&run_request("hi")).await;

    assert_eq!(result.delivered, "Hello!");
    assert_eq!(result.trace.compliance, StageStatus::Pass);
    assert_eq!(culture.call_count(), 1);
}

#[tokio::test]
async fn test_failing_generator_backend_is_reviewed_like_any_candidate() {
    let backend = ScriptedBackend::new([
        Err(LlmError::Timeout { secs: 30 }),
        Ok("Here is a proper answer.".to_string()),
    ]);
    let compliance = ScriptedReviewer::new([
        ReviewVerdict::reject("not an answer"),
        ReviewVerdict::approve(),
    ]);
    let pipeline = ReviewPipeline::new(Arc::new(GenerationAdapter::new(backend)), compliance.clone())
        .with_culture_reviewer(ScriptedReviewer::approving());

    let result = pipeline.run(&run_request("hi")).await;

    assert_eq!(compliance.calls()[0].candidate, NEUTRAL_APOLOGY);
    assert_eq!(result.delivered, "Here is a proper answer.");
    assert_eq!(result.trace.attempts, 2);
}

#[tokio::test]
async fn test_trace_log_records_every_evaluation() {
    let compliance = ScriptedReviewer::new([
        ReviewVerdict::reject("r1"),
        ReviewVerdict::approve(),
    ]);
    let pipeline = ReviewPipeline::new(ScriptedGenerator::always("x"), compliance)
        .with_culture_reviewer(ScriptedReviewer::approving());

    let result = pipeline.run(&run_request("hi")).await;

    assert_eq!(result.trace.evaluations(Stage::Compliance), 2);
    assert_eq!(result.trace.evaluations(Stage::Culture), 1);
    assert_eq!(result.trace.log[0].reason, "r1");

    // Evaluations are logged in review order within each attempt.
    let order: Vec<_> = result
        .trace
        .log
        .iter()
        .map(|record| (record.attempt, record.stage.ordinal()))
        .collect();
    assert_eq!(order, vec![(1, 1), (2, 1), (2, 2)]);
}

#[tokio::test]
async fn test_run_state_replays_to_same_result() {
    let compliance = ScriptedReviewer::new([
        ReviewVerdict::approve(),
        ReviewVerdict::reject("r1"),
    ]);
    let pipeline = ReviewPipeline::new(ScriptedGenerator::new(["a", "b", "c"]), compliance)
        .with_culture_reviewer(ScriptedReviewer::rejecting("r2"))
        .with_max_attempts(budget(3));

    let state = pipeline.run_to_state(&run_request("hi")).await;
    let replayed = vigil_core::replay(budget(3), state.attempts().to_vec());

    assert_eq!(replayed.trace(), state.trace());
    assert_eq!(replayed.finish(), state.finish());
}

#[tokio::test]
async fn test_independent_runs_share_no_state() {
    let pipeline = ReviewPipeline::new(
        ScriptedGenerator::always("reply"),
        ScriptedReviewer::approving(),
    );

    let first = run_request("first");
    let second = run_request("second");
    let (a, b) = tokio::join!(pipeline.run(&first), pipeline.run(&second));

    assert_eq!(a.trace.attempts, 1);
    assert_eq!(b.trace.attempts, 1);
}

struct Stalled;

#[async_trait::async_trait]
impl vigil_core::Generator for Stalled {
    async fn generate(
        &self,
        _: &str,
        _: &str,
        _: &vigil_core::ConversationHistory,
    ) -> String {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        "never".to_string()
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_interrupts_a_pending_stage() {
    let reviewer = ScriptedReviewer::approving();
    let pipeline = ReviewPipeline::new(Arc::new(Stalled), reviewer.clone());
    let token = tokio_util::sync::CancellationToken::new();

    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        canceller.cancel();
    });

    let result = pipeline.run_cancellable(&run_request("hi"), &token).await;

    assert!(matches!(result, Err(vigil_core::PipelineError::Cancelled)));
    assert_eq!(reviewer.call_count(), 0);
}
