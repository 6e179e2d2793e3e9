//! Policy for the assistant: instruction precedence across persona
//! layers, consent capture with a persistent decision cache, and the
//! privacy rules injected into every prompt.

pub mod consent;
pub mod injector;
pub mod precedence;

pub use consent::{
    ConsentEngine, ConsentOutcome, ConsentPrompter, InfoClass, PRIVACY_MARKERS, SENSITIVE_KEYS,
    ShareDecision, can_share, classify_info,
};
pub use injector::make_policy_text;
pub use precedence::{build_prompt_text, deep_merge, resolve_instructions};
