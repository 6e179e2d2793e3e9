//! Built-in tools for the agent: memory retrieval and storage, a
//! calculator, current time, and web search.

pub mod calculator;
pub mod memory_tools;
pub mod time;
pub mod web_search;

pub use calculator::CalculatorTool;
pub use memory_tools::{RetrieveMemoryTool, StoreMemoryTool};
pub use time::GetTimeTool;
pub use web_search::{SearchCredentials, WebSearchTool};

use std::sync::Arc;

use confide_core::tool::ToolRegistry;
use confide_memory::MemoryStore;

/// Register the full built-in toolset.
pub fn builtin_registry(
    memory: Arc<MemoryStore>,
    search: Option<SearchCredentials>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(RetrieveMemoryTool::new(Arc::clone(&memory))));
    registry.register(Box::new(StoreMemoryTool::new(memory)));
    registry.register(Box::new(CalculatorTool));
    registry.register(Box::new(GetTimeTool));
    registry.register(Box::new(WebSearchTool::new(search)));
    registry
}
