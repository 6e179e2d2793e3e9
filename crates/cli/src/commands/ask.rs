//! `confide ask` — run one question through the full turn pipeline.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use confide_agent::{ModelRouter, Orchestrator, TurnConfig, TurnHandler, TurnRequest};
use confide_channels::{ChatAdapter, deliver_reply};
use confide_config::AppConfig;
use confide_core::error::ChannelError;
use confide_core::message::MessageMeta;
use confide_core::scope::Scope;
use confide_policy::{ConsentEngine, ConsentPrompter};
use confide_revision::RevisionPipeline;
use confide_tools::{SearchCredentials, builtin_registry};
use tokio::time::Duration;
use uuid::Uuid;

use super::{CliError, connect_llm, open_store};

/// Prompts the terminal user for an allow/deny decision. Anything other
/// than an explicit yes denies.
struct StdinPrompter;

#[async_trait]
impl ConsentPrompter for StdinPrompter {
    async fn request_consent(
        &self,
        subject_user_id: &str,
        requester_name: &str,
        scope: &str,
        target: &str,
    ) -> Result<bool, ChannelError> {
        let question = format!(
            "{requester_name} is asking about {target} belonging to {subject_user_id} (scope {scope}). Allow? [y/N] "
        );
        tokio::task::spawn_blocking(move || {
            print!("{question}");
            std::io::stdout()
                .flush()
                .map_err(|e| ChannelError::DeliveryFailed {
                    channel: "stdin".into(),
                    reason: e.to_string(),
                })?;
            let mut line = String::new();
            std::io::stdin()
                .read_line(&mut line)
                .map_err(|e| ChannelError::DeliveryFailed {
                    channel: "stdin".into(),
                    reason: e.to_string(),
                })?;
            let answer = line.trim().to_ascii_lowercase();
            Ok(answer == "y" || answer == "yes")
        })
        .await
        .map_err(|e| ChannelError::DeliveryFailed {
            channel: "stdin".into(),
            reason: e.to_string(),
        })?
    }
}

/// Writes replies to stdout; attachments stay on disk and are named.
struct StdoutAdapter;

#[async_trait]
impl ChatAdapter for StdoutAdapter {
    async fn send_text(&self, _scope: &Scope, text: &str) -> Result<(), ChannelError> {
        println!("{text}");
        Ok(())
    }

    async fn send_file(
        &self,
        _scope: &Scope,
        text: &str,
        attachment: &Path,
    ) -> Result<(), ChannelError> {
        println!("{text}");
        println!("[attachment: {}]", attachment.display());
        Ok(())
    }
}

pub async fn run(
    config: &AppConfig,
    question: String,
    subject: Option<String>,
) -> Result<(), CliError> {
    let llm = connect_llm(config)?;
    let memory = open_store(config, Arc::clone(&llm));

    let search = config.web_search.as_ref().map(|ws| SearchCredentials {
        api_key: ws.api_key.clone(),
        cx: ws.cx.clone(),
    });
    let tools = Arc::new(builtin_registry(Arc::clone(&memory), search));

    let router = ModelRouter::new(
        Arc::clone(&llm),
        config.models.fast.clone(),
        config.models.capable.clone(),
        config.models.fast_ratio,
    );
    let orchestrator = Arc::new(Orchestrator::new(router, tools));

    let consent = Arc::new(
        ConsentEngine::new(Arc::clone(&memory))
            .with_classifier(Arc::clone(&llm), config.models.fast.clone())
            .with_timeout(Duration::from_secs(config.policy.consent_timeout_secs)),
    );
    let revision = Arc::new(
        RevisionPipeline::new(
            Arc::clone(&llm),
            Arc::clone(&memory),
            &config.models.fast,
            &config.bot_name,
        )
        .with_enabled(config.revision.enabled)
        .with_max_facts(config.revision.max_facts)
        .with_allow_sensitive(config.revision.allow_sensitive),
    );

    let owner_id = if config.owner_id.is_empty() {
        None
    } else {
        Some(config.owner_id.clone())
    };
    let author = owner_id.clone().unwrap_or_else(|| "cli-user".to_string());
    let handler = TurnHandler::new(
        memory,
        consent,
        revision,
        orchestrator,
        Arc::new(StdinPrompter),
        TurnConfig {
            owner_id,
            cross_channel_default: config.policy.cross_channel_default,
            retrieval_k: 6,
        },
    );

    let scope = Scope::direct();
    let meta = MessageMeta::user(format!("cli:{}", Uuid::new_v4().simple()), scope.clone(), author);
    let outcome = handler
        .handle(TurnRequest {
            meta,
            content: question,
            subject_user_id: subject,
            media_texts: Vec::new(),
            needs_reasoning: false,
        })
        .await?;

    let overflow_dir = config.memory.path.join("overflow");
    deliver_reply(&StdoutAdapter, &scope, &outcome.answer, &overflow_dir).await?;
    Ok(())
}
