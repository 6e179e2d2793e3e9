//! The tool-calling loop around one model exchange.
//!
//! One question goes in with the assembled system prompt and the tool
//! catalog; the model may answer directly or request tool calls. Tool
//! results are fed back for up to a fixed number of steps, then whatever
//! text the model last produced is the answer. Tool failures are reported
//! to the model as error payloads rather than failing the turn.

use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use confide_core::Result;
use confide_core::llm::{ChatMessage, GenerateRequest};
use confide_core::retry::retry;
use confide_core::tool::{ToolContext, ToolRegistry};

use crate::prompt_cache::PromptCache;
use crate::prompts::make_system_prompt;
use crate::router::{ModelRouter, estimate_tokens};

/// Everything one orchestrated exchange needs.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    pub question: String,
    pub core_text: String,
    pub user_text: String,
    pub server_text: String,
    pub policy_text: String,
    pub context_docs: Vec<String>,
    /// Text already extracted from attachments (transcripts, OCR, PDFs).
    pub media_parts: Vec<String>,
    pub needs_reasoning: bool,
    pub tool_ctx: ToolContext,
}

pub struct Orchestrator {
    router: ModelRouter,
    tools: Arc<ToolRegistry>,
    cache: PromptCache,
    max_tool_steps: usize,
}

impl Orchestrator {
    pub fn new(router: ModelRouter, tools: Arc<ToolRegistry>) -> Self {
        Self {
            router,
            tools,
            cache: PromptCache::default(),
            max_tool_steps: 3,
        }
    }

    pub fn with_max_tool_steps(mut self, steps: usize) -> Self {
        self.max_tool_steps = steps;
        self
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    fn system_prompt(&self, req: &AgentRequest) -> String {
        let mut system = match self.cache.get(
            &req.core_text,
            &req.user_text,
            &req.server_text,
            &req.policy_text,
        ) {
            Some(cached) => cached,
            None => {
                let built = make_system_prompt(
                    &req.core_text,
                    &req.user_text,
                    &req.server_text,
                    &req.policy_text,
                );
                self.cache.set(
                    &req.core_text,
                    &req.user_text,
                    &req.server_text,
                    &req.policy_text,
                    built.clone(),
                );
                built
            }
        };

        // Retrieval context is per-turn; it never enters the cache.
        if !req.context_docs.is_empty() {
            system.push_str("\n\n### CONTEXT\n");
            system.push_str(&req.context_docs.join("\n\n"));
        }
        system
    }

    /// Run one exchange to a final text answer.
    pub async fn run(&self, req: AgentRequest) -> Result<String> {
        let system = self.system_prompt(&req);
        let model = self
            .router
            .choose_model(estimate_tokens(&req.question), req.needs_reasoning)
            .to_string();
        let definitions = self.tools.definitions();

        let mut user_content = req.question.clone();
        for part in &req.media_parts {
            user_content.push_str("\n\n");
            user_content.push_str(part);
        }

        let request = GenerateRequest {
            model: model.clone(),
            messages: vec![
                ChatMessage::system(system.clone()),
                ChatMessage::user(user_content),
            ],
            tools: definitions.clone(),
            max_output_tokens: Some(1024),
        };
        let mut response =
            retry("agent_generate", || self.router.llm().generate(request.clone())).await?;

        for step in 0..self.max_tool_steps {
            if response.function_calls.is_empty() {
                return Ok(response.text_or_empty().to_string());
            }

            let mut messages = vec![ChatMessage::system(system.clone())];
            for call in &response.function_calls {
                debug!(step, tool = %call.name, "Dispatching tool call");
                let result = match self
                    .tools
                    .dispatch(&call.name, call.arguments.clone(), &req.tool_ctx)
                    .await
                {
                    Ok(value) => value,
                    Err(e) => json!({"error": e.to_string()}),
                };
                messages.push(ChatMessage::tool(
                    json!({"name": call.name, "content": [result]}).to_string(),
                ));
            }

            let request = GenerateRequest {
                model: model.clone(),
                messages,
                tools: definitions.clone(),
                max_output_tokens: Some(1024),
            };
            response =
                retry("agent_generate", || self.router.llm().generate(request.clone())).await?;
        }

        Ok(response.text_or_empty().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use confide_core::Scope;
    use confide_core::error::{LlmError, ToolError};
    use confide_core::llm::{FinishReason, FunctionCall, GenerateResponse, LlmService};
    use confide_core::tool::Tool;
    use serde_json::Value;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedLlm {
        responses: Mutex<VecDeque<GenerateResponse>>,
        calls: AtomicUsize,
    }

    impl ScriptedLlm {
        fn new(responses: Vec<GenerateResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmService for ScriptedLlm {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(
            &self,
            _r: GenerateRequest,
        ) -> std::result::Result<GenerateResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| LlmError::Malformed("script exhausted".into()))
        }

        async fn embed(&self, texts: &[String]) -> std::result::Result<Vec<Vec<f32>>, LlmError> {
            Ok(texts.iter().map(|_| vec![0.0]).collect())
        }
    }

    fn text_response(text: &str) -> GenerateResponse {
        GenerateResponse {
            text: Some(text.to_string()),
            function_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
            model: "m".into(),
        }
    }

    fn call_response(name: &str, arguments: Value) -> GenerateResponse {
        GenerateResponse {
            text: None,
            function_calls: vec![FunctionCall { name: name.into(), arguments }],
            finish_reason: FinishReason::ToolCalls,
            model: "m".into(),
        }
    }

    struct CountingTool(AtomicUsize);

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            "counter"
        }

        fn description(&self) -> &str {
            "counts invocations"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object", "properties": {}})
        }

        async fn execute(
            &self,
            _args: Value,
            _ctx: &ToolContext,
        ) -> std::result::Result<Value, ToolError> {
            let n = self.0.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(json!({"count": n}))
        }
    }

    fn request() -> AgentRequest {
        AgentRequest {
            question: "hello".into(),
            core_text: "core".into(),
            user_text: String::new(),
            server_text: String::new(),
            policy_text: "- policy".into(),
            context_docs: Vec::new(),
            media_parts: Vec::new(),
            needs_reasoning: true,
            tool_ctx: ToolContext::new(Scope::direct(), "u1"),
        }
    }

    fn orchestrator(llm: Arc<ScriptedLlm>) -> Orchestrator {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(CountingTool(AtomicUsize::new(0))));
        let router = ModelRouter::new(llm, "fast-model", "capable-model", 0.5);
        Orchestrator::new(router, Arc::new(registry))
    }

    #[tokio::test]
    async fn direct_answer_needs_one_call() {
        let llm = Arc::new(ScriptedLlm::new(vec![text_response("hi there")]));
        let orch = orchestrator(Arc::clone(&llm));

        let answer = orch.run(request()).await.unwrap();
        assert_eq!(answer, "hi there");
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn tool_results_feed_the_next_step() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            call_response("counter", json!({})),
            text_response("done"),
        ]));
        let orch = orchestrator(Arc::clone(&llm));

        let answer = orch.run(request()).await.unwrap();
        assert_eq!(answer, "done");
        assert_eq!(llm.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unknown_tool_reports_an_error_payload_instead_of_failing() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            call_response("no_such_tool", json!({})),
            text_response("recovered"),
        ]));
        let orch = orchestrator(llm);

        let answer = orch.run(request()).await.unwrap();
        assert_eq!(answer, "recovered");
    }

    #[tokio::test]
    async fn loop_is_capped_and_returns_last_text() {
        let llm = Arc::new(ScriptedLlm::new(vec![
            call_response("counter", json!({})),
            call_response("counter", json!({})),
            call_response("counter", json!({})),
            call_response("counter", json!({})),
        ]));
        let orch = orchestrator(Arc::clone(&llm));

        let answer = orch.run(request()).await.unwrap();
        assert_eq!(answer, "");
        // Initial exchange plus one per allowed step.
        assert_eq!(llm.calls.load(Ordering::SeqCst), 4);
    }
}
