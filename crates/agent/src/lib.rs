//! The agent: model routing, prompt assembly and caching, the
//! tool-calling orchestrator, and the end-to-end turn pipeline.

pub mod orchestrator;
pub mod prompt_cache;
pub mod prompts;
pub mod router;
pub mod turn;

pub use orchestrator::{AgentRequest, Orchestrator};
pub use prompt_cache::PromptCache;
pub use prompts::{CAPABILITIES_TEXT, make_system_prompt};
pub use router::{ESCALATION_TOKEN_THRESHOLD, ModelRouter, ModelTier, estimate_tokens};
pub use turn::{TurnConfig, TurnHandler, TurnOutcome, TurnRequest, build_turn_handler};
