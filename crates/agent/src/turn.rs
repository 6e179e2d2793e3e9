//! The per-turn pipeline: persist, resolve instructions, check
//! disclosure policy, retrieve context, answer, and kick off revision.
//!
//! Each stage degrades independently. A failed message write or a failed
//! revision pass is logged and the turn proceeds; only a failed model
//! exchange fails the turn.

use std::sync::Arc;
use tracing::warn;

use confide_core::llm::LlmService;
use confide_core::message::MessageMeta;
use confide_core::tool::ToolContext;
use confide_core::{Error, Result};
use confide_memory::{MemoryStore, MetaFilter};
use confide_policy::{ConsentEngine, ConsentPrompter, ShareDecision, make_policy_text};
use confide_revision::{RevisionPipeline, RevisionRequest};
use serde_json::json;

use crate::orchestrator::{AgentRequest, Orchestrator};

const BLOCKED_REPLY: &str = "I can't share content from other channels here.";
const NO_CONSENT_REPLY: &str =
    "I don't have their consent to share that. You could ask them directly.";

/// Turn-pipeline knobs that come from configuration.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    pub owner_id: Option<String>,
    pub cross_channel_default: bool,
    pub retrieval_k: usize,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            owner_id: None,
            cross_channel_default: false,
            retrieval_k: 6,
        }
    }
}

/// One incoming message to answer.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub meta: MessageMeta,
    pub content: String,
    /// Set when the question concerns another user (the disclosure
    /// subject); same-author questions never trigger the consent path.
    pub subject_user_id: Option<String>,
    /// Text already extracted from attachments by the ingesting surface.
    pub media_texts: Vec<String>,
    pub needs_reasoning: bool,
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub answer: String,
    pub reply_meta: MessageMeta,
}

pub struct TurnHandler {
    memory: Arc<MemoryStore>,
    consent: Arc<ConsentEngine>,
    revision: Arc<RevisionPipeline>,
    orchestrator: Arc<Orchestrator>,
    prompter: Arc<dyn ConsentPrompter>,
    config: TurnConfig,
}

impl TurnHandler {
    pub fn new(
        memory: Arc<MemoryStore>,
        consent: Arc<ConsentEngine>,
        revision: Arc<RevisionPipeline>,
        orchestrator: Arc<Orchestrator>,
        prompter: Arc<dyn ConsentPrompter>,
        config: TurnConfig,
    ) -> Self {
        Self {
            memory,
            consent,
            revision,
            orchestrator,
            prompter,
            config,
        }
    }

    pub async fn handle(&self, req: TurnRequest) -> Result<TurnOutcome> {
        let requester = req
            .meta
            .user_id
            .clone()
            .ok_or_else(|| Error::Internal("turn request without an author".into()))?;
        let scope = req.meta.scope.clone();
        let guild = scope.guild_id.as_deref();

        if let Err(e) = self.memory.upsert_message(&req.content, &req.meta).await {
            warn!(message_id = %req.meta.message_id, error = %e, "Failed to persist incoming message");
        }

        let core_text = self.memory.get_persona_core().await;
        let user_text = self.memory.get_persona_user(&requester).await;
        let server_text = match guild {
            Some(g) => self.memory.get_persona_server(g).await,
            None => String::new(),
        };
        let policy_text =
            make_policy_text(&self.memory, guild, self.config.cross_channel_default).await;

        let cross_enabled = match guild {
            Some(g) => self
                .memory
                .get_cross_channel(g)
                .await
                .unwrap_or(self.config.cross_channel_default),
            None => self.config.cross_channel_default,
        };

        // Disclosure gate for questions about someone else.
        if let Some(subject) = req.subject_user_id.as_deref().filter(|s| *s != requester) {
            let decision = self
                .consent
                .classify_share_request(&req.content, &requester, subject, cross_enabled)
                .await;
            match decision {
                ShareDecision::Blocked => {
                    return self.finish(&req, BLOCKED_REPLY.to_string(), false).await;
                }
                ShareDecision::NeedsConsent => {
                    let requester_name =
                        req.meta.username.clone().unwrap_or_else(|| requester.clone());
                    let granted = self
                        .consent
                        .ensure_consent(
                            subject,
                            scope.guild_or_direct(),
                            "conversation_history",
                            &requester_name,
                            self.prompter.as_ref(),
                        )
                        .await;
                    if !granted {
                        return self.finish(&req, NO_CONSENT_REPLY.to_string(), false).await;
                    }
                }
                ShareDecision::Safe => {}
            }
        }

        // Retrieval stays channel-local unless cross-channel is enabled.
        let filter = match (&scope.channel_id, cross_enabled) {
            (Some(channel), false) => {
                let mut f = MetaFilter::new();
                f.insert("channel_id".into(), json!(channel));
                Some(f)
            }
            _ => None,
        };
        let context_docs: Vec<String> = self
            .memory
            .retrieve(&req.content, self.config.retrieval_k, filter.as_ref())
            .await
            .into_iter()
            .map(|hit| hit.document)
            .collect();

        let answer = self
            .orchestrator
            .run(AgentRequest {
                question: req.content.clone(),
                core_text,
                user_text,
                server_text,
                policy_text,
                context_docs,
                media_parts: req.media_texts.clone(),
                needs_reasoning: req.needs_reasoning,
                tool_ctx: ToolContext::new(scope, requester),
            })
            .await?;

        self.finish(&req, answer, true).await
    }

    /// Persist the reply, optionally kick off revision, and build the
    /// outcome. Policy refusals skip revision: a refused turn produced no
    /// assistant content worth folding into entities.
    async fn finish(&self, req: &TurnRequest, answer: String, revise: bool) -> Result<TurnOutcome> {
        let reply_meta = MessageMeta::assistant_reply(req.meta.scope.clone(), &req.meta.message_id);
        if let Err(e) = self.memory.upsert_message(&answer, &reply_meta).await {
            warn!(message_id = %reply_meta.message_id, error = %e, "Failed to persist reply");
        }

        if revise && let Some(author) = req.meta.user_id.clone() {
            let is_owner = self.config.owner_id.as_deref() == Some(author.as_str());
            let revision = Arc::clone(&self.revision);
            let revision_req = RevisionRequest {
                author_id: author,
                author_display: req.meta.username.clone(),
                scope: req.meta.scope.clone(),
                message_text: req.content.clone(),
                answer_text: Some(answer.clone()),
                is_owner,
            };
            tokio::spawn(async move {
                revision.run(revision_req).await;
            });
        }

        Ok(TurnOutcome { answer, reply_meta })
    }
}

/// Convenience constructor wiring the whole pipeline from shared parts.
pub fn build_turn_handler(
    llm: Arc<dyn LlmService>,
    memory: Arc<MemoryStore>,
    orchestrator: Arc<Orchestrator>,
    prompter: Arc<dyn ConsentPrompter>,
    fast_model: &str,
    bot_name: &str,
    config: TurnConfig,
) -> TurnHandler {
    let consent = Arc::new(
        ConsentEngine::new(Arc::clone(&memory))
            .with_classifier(Arc::clone(&llm), fast_model.to_string()),
    );
    let revision = Arc::new(RevisionPipeline::new(
        llm,
        Arc::clone(&memory),
        fast_model,
        bot_name,
    ));
    TurnHandler::new(memory, consent, revision, orchestrator, prompter, config)
}
