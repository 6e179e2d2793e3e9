//! # Confide Core
//!
//! Domain types, traits, and error definitions for the Confide assistant
//! runtime. This crate has **zero framework dependencies** — it defines the
//! domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator (model service, tools, chat adapter) is defined as a
//! trait here. Implementations live in their respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod llm;
pub mod message;
pub mod retry;
pub mod scope;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use llm::{
    ChatMessage, ChatRole, FinishReason, FunctionCall, GenerateRequest, GenerateResponse,
    LlmService, ToolDefinition,
};
pub use message::{MessageMeta, MessageRole, Modality};
pub use retry::{RetryPolicy, Transient, retry, retry_with};
pub use scope::Scope;
pub use tool::{Tool, ToolContext, ToolRegistry};
