//! Deterministic embedding stubs for store tests.

use async_trait::async_trait;

use confide_core::error::LlmError;
use confide_core::llm::{GenerateRequest, GenerateResponse, LlmService};

/// Embeds each text into a fixed-size bag-of-tokens vector so that shared
/// tokens produce genuinely close embeddings. No generation support.
#[derive(Debug, Default)]
pub(crate) struct StubEmbedder;

#[async_trait]
impl LlmService for StubEmbedder {
    fn name(&self) -> &str {
        "stub-embedder"
    }

    async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        Err(LlmError::NotConfigured("stub embedder cannot generate".into()))
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vec = vec![0.0f32; 64];
                for token in text.to_lowercase().split_whitespace() {
                    let mut bucket = 0usize;
                    for b in token.bytes() {
                        bucket = bucket.wrapping_mul(31).wrapping_add(b as usize);
                    }
                    vec[bucket % 64] += 1.0;
                }
                vec
            })
            .collect())
    }
}

/// Always fails to embed.
#[derive(Debug)]
pub(crate) struct FailingEmbedder;

#[async_trait]
impl LlmService for FailingEmbedder {
    fn name(&self) -> &str {
        "failing-embedder"
    }

    async fn generate(&self, _request: GenerateRequest) -> Result<GenerateResponse, LlmError> {
        Err(LlmError::NotConfigured("failing embedder".into()))
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Err(LlmError::Network("embedding endpoint unreachable".into()))
    }
}
