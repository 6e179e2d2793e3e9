//! OpenAI-compatible model client.
//!
//! Works with any endpoint exposing `/v1/chat/completions` and
//! `/v1/embeddings` (OpenAI, OpenRouter, Ollama, vLLM, Together, ...).
//! This is the only module that knows about the wire format; everything
//! above it speaks [`LlmService`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use confide_core::error::LlmError;
use confide_core::llm::{
    ChatRole, FinishReason, FunctionCall, GenerateRequest, GenerateResponse, LlmService,
    ToolDefinition,
};

pub struct OpenAiCompatService {
    name: String,
    base_url: String,
    api_key: String,
    embedding_model: String,
    client: reqwest::Client,
}

impl OpenAiCompatService {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        embedding_model: impl Into<String>,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| LlmError::NotConfigured(format!("http client: {e}")))?;
        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            embedding_model: embedding_model.into(),
            client,
        })
    }

    pub fn openai(api_key: impl Into<String>, embedding_model: impl Into<String>) -> Result<Self, LlmError> {
        Self::new("openai", "https://api.openai.com/v1", api_key, embedding_model)
    }

    fn request_error(e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout(e.to_string())
        } else {
            LlmError::Network(e.to_string())
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
        let status = response.status().as_u16();
        match status {
            200 => Ok(response),
            429 => Err(LlmError::RateLimited { retry_after_secs: 5 }),
            401 | 403 => Err(LlmError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            )),
            _ => {
                let body = response.text().await.unwrap_or_default();
                warn!(status, body = %body, "Model endpoint returned error");
                Err(LlmError::ApiError { status_code: status, message: body })
            }
        }
    }

    fn to_api_messages(request: &GenerateRequest) -> Vec<Value> {
        request
            .messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    ChatRole::System => "system",
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                    ChatRole::Tool => "tool",
                };
                json!({"role": role, "content": m.content})
            })
            .collect()
    }

    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect()
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    model: String,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Deserialize)]
struct ApiToolCall {
    function: ApiFunction,
}

#[derive(Deserialize)]
struct ApiFunction {
    name: String,
    /// JSON-encoded argument object, as the wire format sends it
    arguments: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

fn map_finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("stop") | None => FinishReason::Stop,
        Some("tool_calls") => FinishReason::ToolCalls,
        Some("length") => FinishReason::Length,
        Some("content_filter") => FinishReason::ContentFilter,
        Some(_) => FinishReason::Other,
    }
}

fn convert_response(api: ApiResponse) -> Result<GenerateResponse, LlmError> {
    let choice = api
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LlmError::Malformed("no choices in response".into()))?;

    let function_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| {
            let arguments = serde_json::from_str(&tc.function.arguments)
                .unwrap_or(Value::Object(Default::default()));
            FunctionCall { name: tc.function.name, arguments }
        })
        .collect::<Vec<_>>();

    let finish_reason = if function_calls.is_empty() {
        map_finish_reason(choice.finish_reason.as_deref())
    } else {
        FinishReason::ToolCalls
    };

    Ok(GenerateResponse {
        text: choice.message.content.filter(|c| !c.is_empty()),
        function_calls,
        finish_reason,
        model: api.model,
    })
}

#[async_trait]
impl LlmService for OpenAiCompatService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut body = json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request),
            "stream": false,
        });
        if let Some(max_tokens) = request.max_output_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if !request.tools.is_empty() {
            body["tools"] = json!(Self::to_api_tools(&request.tools));
        }

        debug!(service = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(Self::request_error)?;
        let response = Self::check_status(response).await?;

        let api: ApiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Malformed(format!("failed to parse response: {e}")))?;
        convert_response(api)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let url = format!("{}/embeddings", self.base_url);
        let body = json!({
            "model": self.embedding_model,
            "input": texts,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(Self::request_error)?;
        let response = Self::check_status(response).await?;

        let api: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Malformed(format!("failed to parse embeddings: {e}")))?;
        if api.data.len() != texts.len() {
            return Err(LlmError::Malformed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                api.data.len()
            )));
        }
        Ok(api.data.into_iter().map(|row| row.embedding).collect())
    }
}
