//! CLI command implementations and shared wiring.

pub mod ask;
pub mod config_cmd;
pub mod consent;
pub mod memory;
pub mod persona;
pub mod policy;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use confide_config::AppConfig;
use confide_core::error::LlmError;
use confide_core::llm::{GenerateRequest, GenerateResponse, LlmService};
use confide_memory::{MemoryStore, RankWeights};
use confide_providers::OpenAiCompatService;

pub type CliError = Box<dyn std::error::Error>;

pub fn load_config(path: Option<&Path>) -> Result<AppConfig, CliError> {
    let config = match path {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

/// The configured hosted-model client. Errors when no API key is set.
pub fn connect_llm(config: &AppConfig) -> Result<Arc<dyn LlmService>, CliError> {
    let api_key = config
        .models
        .api_key
        .clone()
        .ok_or("no API key configured; set CONFIDE_API_KEY or models.api_key")?;
    let base_url = config
        .models
        .api_url
        .clone()
        .unwrap_or_else(|| "https://api.openai.com/v1".to_string());
    let service =
        OpenAiCompatService::new("openai", base_url, api_key, config.models.embedding.clone())?;
    Ok(Arc::new(service))
}

/// A model client for commands that never generate or embed. Every call
/// fails, which the store degrades for reads.
struct OfflineLlm;

#[async_trait]
impl LlmService for OfflineLlm {
    fn name(&self) -> &str {
        "offline"
    }

    async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        Err(LlmError::NotConfigured("offline command".into()))
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Err(LlmError::NotConfigured("offline command".into()))
    }
}

pub fn open_store(config: &AppConfig, llm: Arc<dyn LlmService>) -> Arc<MemoryStore> {
    Arc::new(MemoryStore::open(&config.memory.path, llm).with_weights(RankWeights {
        vector: config.memory.vector_weight,
        lexical: config.memory.lexical_weight,
    }))
}

/// A store for read-only commands; writes through it will fail at the
/// embedding step.
pub fn open_store_offline(config: &AppConfig) -> Arc<MemoryStore> {
    open_store(config, Arc::new(OfflineLlm))
}
