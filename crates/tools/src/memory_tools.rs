//! Memory tools: retrieval for grounding and explicit long-term storage.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;

use confide_core::error::ToolError;
use confide_core::message::{MessageMeta, MessageRole};
use confide_core::tool::{Tool, ToolContext};
use confide_memory::{MemoryStore, MetaFilter};

pub struct RetrieveMemoryTool {
    memory: Arc<MemoryStore>,
}

impl RetrieveMemoryTool {
    pub fn new(memory: Arc<MemoryStore>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Tool for RetrieveMemoryTool {
    fn name(&self) -> &str {
        "retrieve_memory"
    }

    fn description(&self) -> &str {
        "Retrieve relevant past content from memory for grounding answers."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string"},
                "k": {"type": "integer"},
                "channel_only": {"type": "boolean"}
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;
        let k = arguments["k"].as_u64().unwrap_or(6) as usize;
        let channel_only = arguments["channel_only"].as_bool().unwrap_or(true);

        let filter = match (&ctx.scope.channel_id, channel_only) {
            (Some(channel), true) => {
                let mut f = MetaFilter::new();
                f.insert("channel_id".into(), json!(channel));
                Some(f)
            }
            _ => None,
        };

        let items: Vec<serde_json::Value> = self
            .memory
            .retrieve(query, k, filter.as_ref())
            .await
            .into_iter()
            .map(|hit| json!({"text": hit.document, "meta": hit.metadata}))
            .collect();
        Ok(json!({"items": items}))
    }
}

pub struct StoreMemoryTool {
    memory: Arc<MemoryStore>,
}

impl StoreMemoryTool {
    pub fn new(memory: Arc<MemoryStore>) -> Self {
        Self { memory }
    }
}

#[async_trait]
impl Tool for StoreMemoryTool {
    fn name(&self) -> &str {
        "store_memory"
    }

    fn description(&self) -> &str {
        "Store an item in long-term memory with optional tags."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "text": {"type": "string"},
                "tags": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["text"]
        })
    }

    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<serde_json::Value, ToolError> {
        let text = arguments["text"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'text' argument".into()))?;
        let mut tags: Vec<String> = arguments["tags"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|t| t.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if tags.is_empty() {
            tags.push("memo".to_string());
        }

        let key = format!(
            "mem:{}:{}:{}",
            ctx.scope.guild_or_direct(),
            ctx.scope.channel_id.as_deref().unwrap_or(""),
            ctx.user_id.as_deref().unwrap_or("")
        );
        let meta = MessageMeta {
            message_id: key,
            scope: ctx.scope.clone(),
            user_id: ctx.user_id.clone(),
            username: None,
            role: MessageRole::System,
            modality: Default::default(),
            reply_to: None,
            created_at: chrono::Utc::now(),
            tags: tags.clone(),
        };
        self.memory
            .upsert_message(text, &meta)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "store_memory".into(),
                reason: e.to_string(),
            })?;
        Ok(json!({"status": "stored", "tags": tags}))
    }
}
