//! End-to-end turn pipeline tests with a scripted model: persistence,
//! retrieval grounding, tool dispatch, disclosure gating, and the
//! background revision pass.

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use confide_agent::{ModelRouter, Orchestrator, TurnConfig, TurnRequest, build_turn_handler};
use confide_core::Scope;
use confide_core::error::{ChannelError, LlmError};
use confide_core::llm::{
    FinishReason, FunctionCall, GenerateRequest, GenerateResponse, LlmService,
};
use confide_core::message::MessageMeta;
use confide_memory::MemoryStore;
use confide_policy::ConsentPrompter;
use confide_tools::builtin_registry;

/// Scripted model: embeddings are bag-of-tokens, extraction and
/// classifier prompts are recognized by content, everything else pops
/// the next scripted turn response.
struct ScriptedLlm {
    turn_responses: Mutex<VecDeque<GenerateResponse>>,
}

impl ScriptedLlm {
    fn new(responses: Vec<GenerateResponse>) -> Self {
        Self {
            turn_responses: Mutex::new(responses.into()),
        }
    }
}

fn text_response(text: &str) -> GenerateResponse {
    GenerateResponse {
        text: Some(text.to_string()),
        function_calls: Vec::new(),
        finish_reason: FinishReason::Stop,
        model: "scripted".into(),
    }
}

#[async_trait]
impl LlmService for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        let all_text: String = request.messages.iter().map(|m| m.content.as_str()).collect();
        if all_text.contains("You extract durable facts") {
            return Ok(text_response(r#"{"facts": ["joined the chess club"], "targets": []}"#));
        }
        if all_text.contains("privacy classifier") {
            return Ok(text_response("share_safe"));
        }
        self.turn_responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::Malformed("script exhausted".into()))
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vec = vec![0.0f32; 32];
                for token in text.to_lowercase().split_whitespace() {
                    let mut bucket = 0usize;
                    for b in token.bytes() {
                        bucket = bucket.wrapping_mul(31).wrapping_add(b as usize);
                    }
                    vec[bucket % 32] += 1.0;
                }
                vec
            })
            .collect())
    }
}

struct FixedPrompter(bool);

#[async_trait]
impl ConsentPrompter for FixedPrompter {
    async fn request_consent(
        &self,
        _subject: &str,
        _requester: &str,
        _scope: &str,
        _target: &str,
    ) -> Result<bool, ChannelError> {
        Ok(self.0)
    }
}

fn handler(
    dir: &std::path::Path,
    llm: Arc<ScriptedLlm>,
    prompter_answer: bool,
) -> (Arc<MemoryStore>, confide_agent::TurnHandler) {
    let llm: Arc<dyn LlmService> = llm;
    let memory = Arc::new(MemoryStore::open(dir, Arc::clone(&llm)));
    let registry = Arc::new(builtin_registry(Arc::clone(&memory), None));
    let router = ModelRouter::new(Arc::clone(&llm), "fast-model", "capable-model", 0.5);
    let orchestrator = Arc::new(Orchestrator::new(router, registry));
    let handler = build_turn_handler(
        llm,
        Arc::clone(&memory),
        orchestrator,
        Arc::new(FixedPrompter(prompter_answer)),
        "fast-model",
        "Confide",
        TurnConfig::default(),
    );
    (memory, handler)
}

fn turn(content: &str) -> TurnRequest {
    TurnRequest {
        meta: MessageMeta::user("m1", Scope::channel("g1", "c1"), "u1").with_username("Alice"),
        content: content.to_string(),
        subject_user_id: None,
        media_texts: Vec::new(),
        needs_reasoning: true,
    }
}

async fn wait_for_entity(memory: &MemoryStore, entity_id: &str) -> bool {
    for _ in 0..100 {
        if memory.get_entity(entity_id).await.is_some() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test(flavor = "multi_thread")]
async fn answered_turn_persists_both_sides_and_revises() {
    let dir = tempfile::tempdir().unwrap();
    let llm = Arc::new(ScriptedLlm::new(vec![text_response("Nice to meet you!")]));
    let (memory, handler) = handler(dir.path(), llm, true);

    let outcome = handler.handle(turn("I joined the chess club")).await.unwrap();
    assert_eq!(outcome.answer, "Nice to meet you!");
    assert_eq!(outcome.reply_meta.reply_to.as_deref(), Some("m1"));

    let records = memory.list_messages(None, 10).await;
    assert_eq!(records.len(), 2);

    assert!(wait_for_entity(&memory, "user:u1").await);
    let entity = memory.get_entity("user:u1").await.unwrap();
    assert_eq!(entity.document, "- joined the chess club");
}

#[tokio::test(flavor = "multi_thread")]
async fn tool_calls_run_against_real_memory() {
    let dir = tempfile::tempdir().unwrap();
    let llm = Arc::new(ScriptedLlm::new(vec![
        GenerateResponse {
            text: None,
            function_calls: vec![FunctionCall {
                name: "retrieve_memory".into(),
                arguments: json!({"query": "standup"}),
            }],
            finish_reason: FinishReason::ToolCalls,
            model: "scripted".into(),
        },
        text_response("The standup is at 10am."),
    ]));
    let (memory, handler) = handler(dir.path(), llm, true);

    let earlier = MessageMeta::user("m0", Scope::channel("g1", "c1"), "u2");
    memory.upsert_message("standup moved to 10am", &earlier).await.unwrap();

    let outcome = handler.handle(turn("when is standup?")).await.unwrap();
    assert_eq!(outcome.answer, "The standup is at 10am.");
}

#[tokio::test(flavor = "multi_thread")]
async fn cross_channel_questions_are_refused_when_disabled() {
    let dir = tempfile::tempdir().unwrap();
    // No scripted responses: a refusal must never reach the model.
    let llm = Arc::new(ScriptedLlm::new(Vec::new()));
    let (memory, handler) = handler(dir.path(), llm, true);

    let mut req = turn("what did they post in #general");
    req.subject_user_id = Some("u2".to_string());
    let outcome = handler.handle(req).await.unwrap();
    assert!(outcome.answer.contains("can't share"));

    // Refused turns still persist the question and the refusal.
    assert_eq!(memory.list_messages(None, 10).await.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn denied_consent_refuses_and_caches_the_denial() {
    let dir = tempfile::tempdir().unwrap();
    let llm = Arc::new(ScriptedLlm::new(Vec::new()));
    let (memory, handler) = handler(dir.path(), llm, false);

    let mut req = turn("what is their email");
    req.subject_user_id = Some("u2".to_string());
    let outcome = handler.handle(req).await.unwrap();
    assert!(outcome.answer.contains("consent"));
    assert_eq!(memory.get_consent("u2", "g1", "conversation_history").await, Some(false));
}

#[tokio::test(flavor = "multi_thread")]
async fn granted_consent_lets_the_turn_proceed() {
    let dir = tempfile::tempdir().unwrap();
    let llm = Arc::new(ScriptedLlm::new(vec![text_response("They mentioned it publicly.")]));
    let (memory, handler) = handler(dir.path(), llm, true);

    let mut req = turn("what is their email");
    req.subject_user_id = Some("u2".to_string());
    let outcome = handler.handle(req).await.unwrap();
    assert_eq!(outcome.answer, "They mentioned it publicly.");
    assert_eq!(memory.get_consent("u2", "g1", "conversation_history").await, Some(true));
}
