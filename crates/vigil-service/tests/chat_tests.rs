use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use vigil_core::{
    ChatMessage, ConversationHistory, Generator, ReviewPipeline, ReviewVerdict, StageStatus,
    FALLBACK_MESSAGE,
};
use vigil_service::{
    AgentId, AgentRecord, AgentRole, AgentTone, BrandProfile, ChatError, ChatRequest,
    ChatService, Collaborators, InMemoryStores, UserId,
};
use vigil_test_utils::{ScriptedGenerator, ScriptedReviewer};

const TOKEN: &str = "tok-acme";

struct Fixture {
    stores: InMemoryStores,
    owner: UserId,
    agent: AgentId,
}

impl Fixture {
    fn new() -> Self {
        let stores = InMemoryStores::new();
        let owner = UserId::new();
        stores.auth.insert(TOKEN, owner);

        let profile = BrandProfile {
            business_name: Some("Acme".to_string()),
            tone: Some(AgentTone::Friendly),
            ethics_statement: Some("We never upsell".to_string()),
            brand_avoid: vec!["synergy".to_string()],
            ..BrandProfile::default()
        };
        stores.profiles.insert(owner, profile);

        let agent = AgentRecord::provision(
            AgentId::new(),
            owner,
            AgentRole::Support,
            AgentTone::Friendly,
            "Acme",
        );
        let agent_id = agent.id;
        stores.agents.insert(agent);

        Self {
            stores,
            owner,
            agent: agent_id,
        }
    }

    fn service(&self, pipeline: ReviewPipeline) -> ChatService {
        ChatService::new(pipeline, Collaborators::from(&self.stores))
    }

    fn request(&self, message: &str) -> ChatRequest {
        ChatRequest {
            agent_id: self.agent.to_string(),
            conversation_id: "conv-1".to_string(),
            messages: vec![ChatMessage::user(message)],
        }
    }
}

#[tokio::test]
async fn test_approved_reply_is_delivered_and_stored() {
    let fixture = Fixture::new();
    let generator = ScriptedGenerator::always("Yes, we ship to over 40 countries.");
    let compliance = ScriptedReviewer::approving();
    let culture = ScriptedReviewer::approving();
    let service = fixture.service(
        ReviewPipeline::new(generator.clone(), compliance.clone())
            .with_culture_reviewer(culture.clone()),
    );

    let response = service
        .handle(Some(TOKEN), fixture.request("Do you ship internationally?"))
        .await
        .unwrap();

    assert_eq!(response.message, "Yes, we ship to over 40 countries.");
    assert_eq!(response.pipeline.attempts, 1);
    assert!(!response.pipeline.human_queue);
    assert_eq!(response.pipeline.stage1, StageStatus::Pass);
    assert_eq!(response.pipeline.stage2, StageStatus::Pass);

    let stored = fixture.stores.sink.conversation("conv-1");
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].message, ChatMessage::user("Do you ship internationally?"));
    assert_eq!(
        stored[1].message,
        ChatMessage::assistant("Yes, we ship to over 40 countries.")
    );

    let call = &generator.calls()[0];
    assert!(call
        .base_instruction
        .starts_with("You are Support Agent, an AI support agent for Acme."));

    let review = &compliance.calls()[0];
    assert!(review.instruction.contains("Business ethics commitments: We never upsell"));
    assert_eq!(
        review.context,
        "Business: Acme. Agent role: support. Tone: friendly."
    );
    assert!(culture.calls()[0].instruction.contains("Never use: synergy"));
}

#[tokio::test]
async fn test_exhausted_pipeline_delivers_fallback() {
    let fixture = Fixture::new();
    let compliance = ScriptedReviewer::rejecting("manipulative tone");
    let culture = ScriptedReviewer::approving();
    let service = fixture.service(
        ReviewPipeline::new(ScriptedGenerator::always("Buy now!"), compliance)
            .with_culture_reviewer(culture.clone()),
    );

    let response = service
        .handle(Some(TOKEN), fixture.request("Should I buy?"))
        .await
        .unwrap();

    assert_eq!(response.message, FALLBACK_MESSAGE);
    assert_eq!(response.pipeline.attempts, 3);
    assert!(response.pipeline.human_queue);
    assert_eq!(response.pipeline.stage1, StageStatus::Rework);
    assert_eq!(response.pipeline.stage2, StageStatus::Pending);
    assert_eq!(response.pipeline.stage1_note, "manipulative tone");
    assert_eq!(culture.call_count(), 0);

    let stored = fixture.stores.sink.conversation("conv-1");
    assert_eq!(stored[1].message.content(), FALLBACK_MESSAGE);
}

#[tokio::test]
async fn test_unknown_token_is_unauthorized_without_model_calls() {
    let fixture = Fixture::new();
    let generator = ScriptedGenerator::always("x");
    let service = fixture.service(ReviewPipeline::new(
        generator.clone(),
        ScriptedReviewer::approving(),
    ));

    for bearer in [None, Some(""), Some("someone-else")] {
        let err = service
            .handle(bearer, fixture.request("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Unauthorized));
        assert_eq!(err.status_code(), 401);
    }

    assert!(generator.calls().is_empty());
    assert_eq!(fixture.stores.sink.message_count(), 0);
}

#[tokio::test]
async fn test_agent_of_another_owner_is_not_found() {
    let fixture = Fixture::new();
    let stranger = UserId::new();
    fixture.stores.auth.insert("tok-stranger", stranger);
    let generator = ScriptedGenerator::always("x");
    let service = fixture.service(ReviewPipeline::new(
        generator.clone(),
        ScriptedReviewer::approving(),
    ));

    let err = service
        .handle(Some("tok-stranger"), fixture.request("hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::AgentNotFound));
    assert_eq!(err.status_code(), 404);
    assert!(generator.calls().is_empty());
}

#[tokio::test]
async fn test_unparseable_agent_id_is_not_found() {
    let fixture = Fixture::new();
    let service = fixture.service(ReviewPipeline::new(
        ScriptedGenerator::always("x"),
        ScriptedReviewer::approving(),
    ));
    let mut request = fixture.request("hi");
    request.agent_id = "support".to_string();

    let err = service.handle(Some(TOKEN), request).await.unwrap_err();
    assert!(matches!(err, ChatError::AgentNotFound));
}

#[tokio::test]
async fn test_invalid_history_is_rejected_before_pipeline() {
    let fixture = Fixture::new();
    let generator = ScriptedGenerator::always("x");
    let service = fixture.service(ReviewPipeline::new(
        generator.clone(),
        ScriptedReviewer::approving(),
    ));

    let cases = [
        vec![],
        vec![ChatMessage::user("  ")],
        vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")],
    ];
    for messages in cases {
        let mut request = fixture.request("unused");
        request.messages = messages;

        let err = service.handle(Some(TOKEN), request).await.unwrap_err();
        assert!(matches!(err, ChatError::InvalidRequest(_)));
        assert_eq!(err.status_code(), 400);
    }

    assert!(generator.calls().is_empty());
}

#[tokio::test]
async fn test_missing_profile_uses_defaults() {
    let fixture = Fixture::new();
    let newcomer = UserId::new();
    fixture.stores.auth.insert("tok-new", newcomer);
    let agent = AgentRecord::provision(
        AgentId::new(),
        newcomer,
        AgentRole::Sales,
        AgentTone::default(),
        "this business",
    );
    let agent_id = agent.id;
    fixture.stores.agents.insert(agent);

    let compliance = ScriptedReviewer::approving();
    let service = fixture.service(ReviewPipeline::new(
        ScriptedGenerator::always("Happy to help."),
        compliance.clone(),
    ));

    let request = ChatRequest {
        agent_id: agent_id.to_string(),
        conversation_id: "conv-new".to_string(),
        messages: vec![ChatMessage::user("hi")],
    };
    service.handle(Some("tok-new"), request).await.unwrap();

    assert_eq!(
        compliance.calls()[0].context,
        "Business: this business. Agent role: sales. Tone: professional."
    );
    assert_ne!(fixture.owner, newcomer);
}

#[tokio::test]
async fn test_delivery_failure_is_internal_error() {
    let fixture = Fixture::new();
    fixture.stores.sink.set_unavailable(true);
    let service = fixture.service(ReviewPipeline::new(
        ScriptedGenerator::always("ok"),
        ScriptedReviewer::approving(),
    ));

    let err = service
        .handle(Some(TOKEN), fixture.request("hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::Delivery(_)));
    assert_eq!(err.status_code(), 500);
    assert_eq!(err.public_message(), "Internal server error");
}

struct Stalled;

#[async_trait]
impl Generator for Stalled {
    async fn generate(&self, _: &str, _: &str, _: &ConversationHistory) -> String {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        "too late".to_string()
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_pipeline_times_out_without_delivery() {
    let fixture = Fixture::new();
    let service = fixture
        .service(ReviewPipeline::new(
            Arc::new(Stalled),
            ScriptedReviewer::new([ReviewVerdict::approve()]),
        ))
        .with_request_timeout(Duration::from_secs(5));

    let err = service
        .handle(Some(TOKEN), fixture.request("hi"))
        .await
        .unwrap_err();

    assert!(matches!(err, ChatError::Timeout { secs: 5 }));
    assert_eq!(err.status_code(), 504);
    assert_eq!(fixture.stores.sink.message_count(), 0);
}
