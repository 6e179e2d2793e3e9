//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are dispatched by the orchestrator when the model emits a
//! function call. Every execution carries a [`ToolContext`] naming the
//! requesting user and scope, so tools can filter memory by channel
//! without reaching for process-wide state.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::ToolError;
use crate::llm::ToolDefinition;
use crate::scope::Scope;

/// Per-request context threaded through tool dispatch.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Scope of the turn being handled
    pub scope: Scope,

    /// The user whose turn triggered this dispatch
    pub user_id: Option<String>,
}

impl ToolContext {
    pub fn new(scope: Scope, user_id: impl Into<String>) -> Self {
        Self { scope, user_id: Some(user_id.into()) }
    }
}

/// The core Tool trait.
///
/// Each built-in (retrieve_memory, store_memory, calculator, get_time,
/// web_search) implements this trait and is registered in the
/// [`ToolRegistry`] made available to the orchestrator.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool. The output is a JSON value serialized back to the
    /// model verbatim.
    async fn execute(
        &self,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> std::result::Result<serde_json::Value, ToolError>;

    /// Convert this tool into a definition for the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { tools: HashMap::new() }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// All tool definitions, for sending to the model.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Dispatch a function call against the registry.
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: serde_json::Value,
        ctx: &ToolContext,
    ) -> std::result::Result<serde_json::Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(arguments, ctx).await
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
