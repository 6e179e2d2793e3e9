//! Routing between the fast and capable model tiers.
//!
//! Long or reasoning-heavy turns always escalate; everything else is
//! split probabilistically so the fast tier absorbs most of the load.

use rand::Rng;
use std::sync::Arc;
use tracing::debug;

use confide_core::error::LlmError;
use confide_core::llm::LlmService;
use confide_core::retry::retry;

/// Prompt size above which a turn always uses the capable tier.
pub const ESCALATION_TOKEN_THRESHOLD: usize = 3000;

/// Crude token estimate: four characters per token, at least one.
pub fn estimate_tokens(text: &str) -> usize {
    (text.len() / 4).max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Fast,
    Capable,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Fast => "fast",
            ModelTier::Capable => "capable",
        }
    }
}

pub struct ModelRouter {
    llm: Arc<dyn LlmService>,
    fast_model: String,
    capable_model: String,
    fast_ratio: f64,
}

impl ModelRouter {
    pub fn new(
        llm: Arc<dyn LlmService>,
        fast_model: impl Into<String>,
        capable_model: impl Into<String>,
        fast_ratio: f64,
    ) -> Self {
        Self {
            llm,
            fast_model: fast_model.into(),
            capable_model: capable_model.into(),
            fast_ratio: fast_ratio.clamp(0.0, 1.0),
        }
    }

    pub fn llm(&self) -> &Arc<dyn LlmService> {
        &self.llm
    }

    pub fn fast_model(&self) -> &str {
        &self.fast_model
    }

    pub fn capable_model(&self) -> &str {
        &self.capable_model
    }

    /// Pick the tier for a turn, then map it to a model name.
    pub fn choose_model(&self, prompt_tokens: usize, needs_reasoning: bool) -> &str {
        let tier = self.choose_tier(prompt_tokens, needs_reasoning);
        debug!(tier = tier.as_str(), prompt_tokens, "Model choice");
        match tier {
            ModelTier::Fast => &self.fast_model,
            ModelTier::Capable => &self.capable_model,
        }
    }

    pub fn choose_tier(&self, prompt_tokens: usize, needs_reasoning: bool) -> ModelTier {
        if needs_reasoning || prompt_tokens > ESCALATION_TOKEN_THRESHOLD {
            return ModelTier::Capable;
        }
        if rand::rng().random_bool(self.fast_ratio) {
            ModelTier::Fast
        } else {
            ModelTier::Capable
        }
    }

    /// Embed with retry on transient failures.
    pub async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        retry("router_embed", || self.llm.embed(texts)).await
    }
}
