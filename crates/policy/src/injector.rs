//! The privacy policy block injected into every system prompt.

use confide_memory::MemoryStore;

/// Render the privacy rules for the current scope, reflecting the
/// server's stored cross-channel toggle (or `default_cross_channel` when
/// the server never set one).
pub async fn make_policy_text(
    memory: &MemoryStore,
    guild_id: Option<&str>,
    default_cross_channel: bool,
) -> String {
    let cross = match guild_id {
        Some(guild) => memory
            .get_cross_channel(guild)
            .await
            .unwrap_or(default_cross_channel),
        None => default_cross_channel,
    };

    let mut lines = vec![
        "- Do not share a user's private information without explicit consent.",
        "- Information from DMs is private unless user opted in.",
        "- Channel content is shareable within the same channel; cross-channel sharing is allowed only if the server policy toggle is enabled.",
        "- If asked about User A by User B, and the info is not clearly public in this channel, ask for explicit consent from User A before sharing.",
        "- If consent is missing or denied, refuse briefly and suggest asking the user directly.",
        "- Obey instruction precedence on conflicts: core > user > server/channel.",
    ]
    .into_iter()
    .map(String::from)
    .collect::<Vec<_>>();
    lines.push(format!(
        "- Cross-channel sharing is {} for this server.",
        if cross { "ENABLED" } else { "DISABLED" }
    ));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use confide_core::error::LlmError;
    use confide_core::llm::{GenerateRequest, GenerateResponse, LlmService};
    use std::sync::Arc;

    struct NoEmbeddings;

    #[async_trait]
    impl LlmService for NoEmbeddings {
        fn name(&self) -> &str {
            "none"
        }

        async fn generate(&self, _r: GenerateRequest) -> Result<GenerateResponse, LlmError> {
            Err(LlmError::NotConfigured("test".into()))
        }

        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
            Ok(texts.iter().map(|_| vec![1.0]).collect())
        }
    }

    #[tokio::test]
    async fn policy_text_reflects_the_stored_toggle() {
        let dir = tempfile::tempdir().unwrap();
        let memory = MemoryStore::open(dir.path(), Arc::new(NoEmbeddings));

        let text = make_policy_text(&memory, Some("g1"), false).await;
        assert!(text.contains("DISABLED"));
        assert!(text.contains("core > user > server/channel"));

        memory.set_cross_channel("g1", true).await.unwrap();
        let text = make_policy_text(&memory, Some("g1"), false).await;
        assert!(text.contains("ENABLED"));
    }

    #[tokio::test]
    async fn direct_scope_uses_the_configured_default() {
        let dir = tempfile::tempdir().unwrap();
        let memory = MemoryStore::open(dir.path(), Arc::new(NoEmbeddings));

        let text = make_policy_text(&memory, None, true).await;
        assert!(text.contains("ENABLED"));
    }
}
