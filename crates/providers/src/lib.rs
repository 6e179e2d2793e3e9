//! Hosted model clients. One OpenAI-compatible HTTP implementation of
//! [`confide_core::LlmService`] covers every endpoint the assistant
//! talks to.

pub mod http;

pub use http::OpenAiCompatService;
