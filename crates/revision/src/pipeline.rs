//! The background revision pass that keeps entity records current.
//!
//! After every answered turn the pipeline asks a fast model for durable
//! facts, then folds them into the relevant entity records. It runs off
//! the hot path; nothing here may fail the user-visible turn, so every
//! error degrades to a logged skip.

use chrono::Utc;
use serde_json::{Map, json};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use confide_core::Scope;
use confide_core::llm::{ChatMessage, GenerateRequest, LlmService};
use confide_core::retry::retry;
use confide_memory::{MemoryStore, csv_set};

use crate::extract::{EXTRACTION_PROMPT, ExtractedTarget, clean_facts, parse_extraction};

/// One turn handed to the pipeline.
#[derive(Debug, Clone)]
pub struct RevisionRequest {
    pub author_id: String,
    pub author_display: Option<String>,
    pub scope: Scope,
    pub message_text: String,
    pub answer_text: Option<String>,
    pub is_owner: bool,
}

/// Entity revision with permission guards and a sensitive-fact gate.
pub struct RevisionPipeline {
    llm: Arc<dyn LlmService>,
    memory: Arc<MemoryStore>,
    model: String,
    bot_name: String,
    enabled: bool,
    max_facts: usize,
    allow_sensitive: bool,
}

impl RevisionPipeline {
    pub fn new(
        llm: Arc<dyn LlmService>,
        memory: Arc<MemoryStore>,
        model: impl Into<String>,
        bot_name: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            memory,
            model: model.into(),
            bot_name: bot_name.into(),
            enabled: true,
            max_facts: 12,
            allow_sensitive: false,
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_max_facts(mut self, max_facts: usize) -> Self {
        self.max_facts = max_facts;
        self
    }

    pub fn with_allow_sensitive(mut self, allow: bool) -> Self {
        self.allow_sensitive = allow;
        self
    }

    fn build_payload(&self, req: &RevisionRequest) -> String {
        let mut lines = vec![
            format!("author_id={}", req.author_id),
            format!("author_display={}", req.author_display.as_deref().unwrap_or("")),
            format!("guild_id={}", req.scope.guild_id.as_deref().unwrap_or("direct")),
            format!("channel_id={}", req.scope.channel_id.as_deref().unwrap_or("")),
            format!("message:\n{}", req.message_text.trim()),
        ];
        if let Some(answer) = req.answer_text.as_deref().filter(|a| !a.is_empty()) {
            lines.push(format!("assistant_response:\n{}", answer.trim()));
        }
        lines.join("\n")
    }

    /// Run one revision pass. Never returns an error; failures log and
    /// leave the store untouched.
    pub async fn run(&self, req: RevisionRequest) {
        if !self.enabled || req.message_text.trim().is_empty() {
            return;
        }

        let prompt = format!("{}\n\n{}", EXTRACTION_PROMPT, self.build_payload(&req).trim());
        let request = GenerateRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            tools: Vec::new(),
            max_output_tokens: Some(256),
        };
        let response = match retry("entity_revision", || self.llm.generate(request.clone())).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Entity extraction call failed; skipping revision");
                return;
            }
        };

        let Some(extraction) = parse_extraction(response.text_or_empty()) else {
            debug!("No parseable extraction; skipping revision");
            return;
        };

        let facts = clean_facts(&extraction.facts);
        if facts.is_empty() {
            return;
        }

        let sensitive = clean_facts(&extraction.sensitive);
        if !sensitive.is_empty() && !self.allow_sensitive {
            info!(author = %req.author_id, count = sensitive.len(), "Sensitive facts present; skipping revision");
            return;
        }

        let default_entity = format!("user:{}", req.author_id);
        let mut targets = extraction.targets;
        if targets.is_empty() {
            targets.push(ExtractedTarget {
                entity_id: default_entity.clone(),
                kind: "user".to_string(),
                display_name: req.author_display.clone().unwrap_or_default(),
            });
        }
        // The owner's turns fold into the assistant's self entity as well.
        if req.is_owner && !targets.iter().any(|t| t.entity_id == "bot:self") {
            targets.push(ExtractedTarget {
                entity_id: "bot:self".to_string(),
                kind: "bot".to_string(),
                display_name: self.bot_name.clone(),
            });
        }

        for target in targets {
            let entity_id = if target.entity_id.is_empty() {
                default_entity.clone()
            } else {
                target.entity_id.clone()
            };

            // An author's turn may only revise their own user entity.
            if entity_id.starts_with("user:") && entity_id != default_entity {
                continue;
            }
            // The assistant's self entity is owner-editable only.
            if entity_id == "bot:self" && !req.is_owner {
                continue;
            }

            self.apply_to_entity(&entity_id, &target, &facts, &req).await;
        }
    }

    async fn apply_to_entity(
        &self,
        entity_id: &str,
        target: &ExtractedTarget,
        facts: &[String],
        req: &RevisionRequest,
    ) {
        let existing = self.memory.get_entity(entity_id).await;
        let (existing_doc, existing_meta) = existing
            .map(|r| (r.document, r.metadata))
            .unwrap_or_default();

        let existing_facts =
            clean_facts(existing_doc.lines().map(|l| l.trim_start_matches(['-', ' '])));

        // New facts first; the cap drops the oldest.
        let mut combined: Vec<String> = facts.to_vec();
        combined.extend(existing_facts);
        let combined: Vec<String> = clean_facts(combined).into_iter().take(self.max_facts).collect();
        if combined.is_empty() {
            return;
        }

        let mut channels: BTreeSet<String> = csv_set(existing_meta.get("channels"));
        if let Some(channel) = req.scope.channel_id.as_deref() {
            channels.insert(channel.to_string());
        }

        let display_name = if !target.display_name.is_empty() {
            target.display_name.clone()
        } else {
            existing_meta
                .get("display_name")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .or_else(|| req.author_display.clone())
                .unwrap_or_default()
        };

        let tags: BTreeSet<String> =
            ["entity".to_string(), target.kind.clone()].into_iter().collect();

        let mut metadata = Map::new();
        metadata.insert("entity_id".into(), json!(entity_id));
        metadata.insert("kind".into(), json!(target.kind));
        metadata.insert("display_name".into(), json!(display_name));
        metadata.insert("tags".into(), json!(tags.into_iter().collect::<Vec<_>>().join(",")));
        metadata.insert("source".into(), json!("auto_revision"));
        metadata.insert("updated_at".into(), json!(Utc::now().to_rfc3339()));
        metadata.insert("guild_id".into(), json!(req.scope.guild_id));
        if !channels.is_empty() {
            metadata.insert(
                "channels".into(),
                json!(channels.into_iter().collect::<Vec<_>>().join(",")),
            );
        }

        let content = combined
            .iter()
            .map(|fact| format!("- {fact}"))
            .collect::<Vec<_>>()
            .join("\n");

        if let Err(e) = self.memory.upsert_entity(entity_id, &content, metadata).await {
            warn!(entity = entity_id, error = %e, "Entity upsert failed during revision");
        }
    }
}
