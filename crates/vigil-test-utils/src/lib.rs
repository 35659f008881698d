//! Testing utilities for Vigil workspace
//!
//! Scripted capabilities and fixtures shared by the test suites.

#![allow(missing_docs)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use vigil_core::{
    ChatMessage, CompletionRequest, ConversationHistory, Generator, LlmBackend, LlmError,
    ReviewVerdict, Reviewer, RunRequest,
};

pub const BASE_INSTRUCTION: &str = "You are Support Agent, an AI support agent for Acme.";
pub const COMPLIANCE_INSTRUCTION: &str = "You are SAGE, an ethics reviewer.";
pub const CULTURE_INSTRUCTION: &str = "You are EMBER, a culture reviewer.";
pub const REVIEW_CONTEXT: &str = "Business: Acme. Agent role: support. Tone: friendly.";

pub fn history(message: &str) -> ConversationHistory {
    ConversationHistory::new(vec![ChatMessage::user(message)]).unwrap()
}

pub fn run_request(message: &str) -> RunRequest {
    RunRequest::new(history(message), BASE_INSTRUCTION)
        .with_review_context(REVIEW_CONTEXT)
        .with_compliance_instruction(COMPLIANCE_INSTRUCTION)
        .with_culture_instruction(CULTURE_INSTRUCTION)
}

/// Pops scripted items, repeating the last one once the script runs dry
#[derive(Debug)]
struct Script<T: Clone> {
    items: Mutex<VecDeque<T>>,
    last: Mutex<Option<T>>,
}

impl<T: Clone> Script<T> {
    fn new(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            items: Mutex::new(items.into_iter().collect()),
            last: Mutex::new(None),
        }
    }

    fn next(&self) -> T {
        let mut last = self.last.lock();
        if let Some(item) = self.items.lock().pop_front() {
            *last = Some(item);
        }
        last.clone().expect("script must contain at least one item")
    }
}

/// Generation call as observed by a scripted generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationCall {
    pub base_instruction: String,
    pub rework_instruction: String,
    pub history_len: usize,
}

#[derive(Debug)]
pub struct ScriptedGenerator {
    script: Script<String>,
    calls: Mutex<Vec<GenerationCall>>,
}

impl ScriptedGenerator {
    pub fn new<I, S>(candidates: I) -> Arc<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Arc::new(Self {
            script: Script::new(candidates.into_iter().map(Into::into)),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn always(candidate: &str) -> Arc<Self> {
        Self::new([candidate])
    }

    pub fn calls(&self) -> Vec<GenerationCall> {
        self.calls.lock().clone()
    }

    pub fn rework_for(&self, attempt: usize) -> String {
        self.calls.lock()[attempt - 1].rework_instruction.clone()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(
        &self,
        base_instruction: &str,
        rework_instruction: &str,
        history: &ConversationHistory,
    ) -> String {
        self.calls.lock().push(GenerationCall {
            base_instruction: base_instruction.to_string(),
            rework_instruction: rework_instruction.to_string(),
            history_len: history.len(),
        });
        self.script.next()
    }
}

/// Review call as observed by a scripted reviewer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewCall {
    pub instruction: String,
    pub candidate: String,
    pub context: String,
}

#[derive(Debug)]
pub struct ScriptedReviewer {
    script: Script<ReviewVerdict>,
    calls: Mutex<Vec<ReviewCall>>,
}

impl ScriptedReviewer {
    pub fn new(verdicts: impl IntoIterator<Item = ReviewVerdict>) -> Arc<Self> {
        Arc::new(Self {
            script: Script::new(verdicts),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn approving() -> Arc<Self> {
        Self::new([ReviewVerdict::approve()])
    }

    pub fn rejecting(reason: &str) -> Arc<Self> {
        Self::new([ReviewVerdict::reject(reason)])
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<ReviewCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Reviewer for ScriptedReviewer {
    async fn evaluate(&self, instruction: &str, candidate: &str, context: &str) -> ReviewVerdict {
        self.calls.lock().push(ReviewCall {
            instruction: instruction.to_string(),
            candidate: candidate.to_string(),
            context: context.to_string(),
        });
        self.script.next()
    }
}

/// Raw backend replaying scripted replies
#[derive(Debug)]
pub struct ScriptedBackend {
    script: Script<Result<String, LlmError>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedBackend {
    pub fn new(replies: impl IntoIterator<Item = Result<String, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Script::new(replies),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn replying(text: &str) -> Arc<Self> {
        Self::new([Ok(text.to_string())])
    }

    pub fn failing() -> Arc<Self> {
        Self::new([Err(LlmError::Transport("connection refused".to_string()))])
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl LlmBackend for ScriptedBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        self.requests.lock().push(request);
        self.script.next()
    }
}
