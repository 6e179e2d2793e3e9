//! Configuration loading, validation, and management for Confide.
//!
//! Loads configuration from `confide.toml` (path overridable via
//! `CONFIDE_CONFIG`) with environment variable overrides for secrets.
//! Validates all settings at startup.

use confide_core::error::Error;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `confide.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// The assistant's display name
    #[serde(default = "default_bot_name")]
    pub bot_name: String,

    /// The owning user's platform id — the only actor allowed to update
    /// the assistant's own entity record
    #[serde(default)]
    pub owner_id: String,

    #[serde(default)]
    pub models: ModelsConfig,

    #[serde(default)]
    pub memory: MemoryConfig,

    #[serde(default)]
    pub revision: RevisionConfig,

    #[serde(default)]
    pub policy: PolicyConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    /// Web search credentials (optional; feature no-ops when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_search: Option<WebSearchConfig>,

    /// Object storage for large attachments (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_store: Option<ObjectStoreConfig>,
}

fn default_bot_name() -> String {
    "Confide".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot_name: default_bot_name(),
            owner_id: String::new(),
            models: ModelsConfig::default(),
            memory: MemoryConfig::default(),
            revision: RevisionConfig::default(),
            policy: PolicyConfig::default(),
            ingest: IngestConfig::default(),
            web_search: None,
            object_store: None,
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("bot_name", &self.bot_name)
            .field("owner_id", &self.owner_id)
            .field("models", &self.models)
            .field("memory", &self.memory)
            .field("revision", &self.revision)
            .field("policy", &self.policy)
            .field("ingest", &self.ingest)
            .field("web_search", &self.web_search)
            .field("object_store", &self.object_store)
            .finish()
    }
}

/// Model tier identifiers and the generation endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Cheap, quick model for routine turns and classification
    #[serde(default = "default_fast_model")]
    pub fast: String,

    /// Higher-capability model for reasoning and long prompts
    #[serde(default = "default_capable_model")]
    pub capable: String,

    /// Embedding model for the semantic store
    #[serde(default = "default_embed_model")]
    pub embedding: String,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// API key (env override: CONFIDE_API_KEY)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Probability of routing a routine turn to the fast model
    #[serde(default = "default_fast_ratio")]
    pub fast_ratio: f64,
}

fn default_fast_model() -> String {
    "gpt-4o-mini".into()
}
fn default_capable_model() -> String {
    "gpt-4o".into()
}
fn default_embed_model() -> String {
    "text-embedding-3-small".into()
}
fn default_fast_ratio() -> f64 {
    0.5
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            fast: default_fast_model(),
            capable: default_capable_model(),
            embedding: default_embed_model(),
            api_url: None,
            api_key: None,
            fast_ratio: default_fast_ratio(),
        }
    }
}

impl std::fmt::Debug for ModelsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelsConfig")
            .field("fast", &self.fast)
            .field("capable", &self.capable)
            .field("embedding", &self.embedding)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("fast_ratio", &self.fast_ratio)
            .finish()
    }
}

/// Semantic store location and ranking weights.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Directory holding the per-collection JSONL files
    #[serde(default = "default_storage_path")]
    pub path: PathBuf,

    /// Weight of the normalized vector similarity in the fused score
    #[serde(default = "default_vector_weight")]
    pub vector_weight: f32,

    /// Weight of the lexical overlap in the fused score
    #[serde(default = "default_lexical_weight")]
    pub lexical_weight: f32,
}

fn default_storage_path() -> PathBuf {
    PathBuf::from("./confide_data")
}
fn default_vector_weight() -> f32 {
    0.8
}
fn default_lexical_weight() -> f32 {
    0.2
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            vector_weight: default_vector_weight(),
            lexical_weight: default_lexical_weight(),
        }
    }
}

/// Entity revision pipeline toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Hard cap on facts retained per entity
    #[serde(default = "default_max_facts")]
    pub max_facts: usize,

    /// Whether sensitive facts may be stored at all
    #[serde(default)]
    pub allow_sensitive: bool,
}

fn default_true() -> bool {
    true
}
fn default_max_facts() -> usize {
    12
}

impl Default for RevisionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_facts: default_max_facts(),
            allow_sensitive: false,
        }
    }
}

/// Disclosure policy defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Default for servers without an explicit cross-channel toggle
    #[serde(default)]
    pub cross_channel_default: bool,

    /// How long to wait for an allow/deny decision (seconds)
    #[serde(default = "default_consent_timeout")]
    pub consent_timeout_secs: u64,
}

fn default_consent_timeout() -> u64 {
    180
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            cross_channel_default: false,
            consent_timeout_secs: default_consent_timeout(),
        }
    }
}

/// Content ingestion toggles (extraction itself is an external collaborator).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub ocr_enabled: bool,

    #[serde(default = "default_speech_language")]
    pub speech_language: String,
}

fn default_speech_language() -> String {
    "en-US".into()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            ocr_enabled: false,
            speech_language: default_speech_language(),
        }
    }
}

/// Google CSE-shaped web search credentials.
#[derive(Clone, Serialize, Deserialize)]
pub struct WebSearchConfig {
    pub api_key: String,
    pub cx: String,
}

impl std::fmt::Debug for WebSearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSearchConfig")
            .field("api_key", &"[REDACTED]")
            .field("cx", &self.cx)
            .finish()
    }
}

/// Object storage target for oversized responses and archives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    pub bucket: String,

    #[serde(default = "default_true")]
    pub sign_urls: bool,

    #[serde(default = "default_sign_expiry")]
    pub sign_url_expiry_secs: u64,
}

fn default_sign_expiry() -> u64 {
    86_400
}

impl AppConfig {
    /// Load from the given TOML file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        let mut config: AppConfig = toml::from_str(&raw).map_err(|e| Error::Config {
            message: format!("invalid config {}: {e}", path.display()),
        })?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for setups with no config file.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = AppConfig::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("CONFIDE_API_KEY") {
            self.models.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("CONFIDE_API_URL") {
            self.models.api_url = Some(url);
        }
        if let Ok(owner) = std::env::var("CONFIDE_OWNER_ID") {
            self.owner_id = owner;
        }
        if let Ok(path) = std::env::var("CONFIDE_MEMORY_PATH") {
            self.memory.path = PathBuf::from(path);
        }
    }

    fn validate(&self) -> Result<(), Error> {
        if !(0.0..=1.0).contains(&self.models.fast_ratio) {
            return Err(Error::Config {
                message: format!("models.fast_ratio must be in [0,1], got {}", self.models.fast_ratio),
            });
        }
        let weight_sum = self.memory.vector_weight + self.memory.lexical_weight;
        if !(0.99..=1.01).contains(&weight_sum) {
            return Err(Error::Config {
                message: format!("memory ranking weights must sum to 1.0, got {weight_sum}"),
            });
        }
        if self.revision.max_facts == 0 {
            return Err(Error::Config {
                message: "revision.max_facts must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.revision.max_facts, 12);
        assert!(!config.policy.cross_channel_default);
        assert!((config.models.fast_ratio - 0.5).abs() < f64::EPSILON);
        assert!((config.memory.vector_weight - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn loads_partial_toml() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            tmp,
            r#"
bot_name = "Keeper"
owner_id = "42"

[revision]
max_facts = 6

[policy]
cross_channel_default = true
"#
        )
        .unwrap();

        let config = AppConfig::load(tmp.path()).unwrap();
        assert_eq!(config.bot_name, "Keeper");
        assert_eq!(config.owner_id, "42");
        assert_eq!(config.revision.max_facts, 6);
        assert!(config.policy.cross_channel_default);
        // untouched sections keep their defaults
        assert_eq!(config.models.fast, "gpt-4o-mini");
    }

    #[test]
    fn rejects_bad_ratio() {
        let mut config = AppConfig::default();
        config.models.fast_ratio = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_bad_weights() {
        let mut config = AppConfig::default();
        config.memory.vector_weight = 0.9;
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.models.api_key = Some("sk-secret".into());
        let out = format!("{config:?}");
        assert!(!out.contains("sk-secret"));
        assert!(out.contains("[REDACTED]"));
    }
}
