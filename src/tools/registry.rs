//! Tool registry for managing available tools
//!
//! The registry maps tool names to `ToolSpec`s. It supports both static tools
//! (registered directly) and tools pulled from providers (like the MCP
//! gateway). Lookup is explicit; unknown names fail closed.

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde_json::Value;

use super::provider::ToolProvider;
use super::tool::{ToolResult, ToolSpec, ToolSummary};
use crate::conversation::ToolCallRequest;
use crate::core::{AgentError, AgentResult};

/// Registry that holds all available tools
///
/// Handlers must be safe for concurrent invocation; the registry adds no
/// locking of its own.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolSpec>,
}

impl ToolRegistry {
    /// Create a new empty tool registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool
    pub fn register(&mut self, spec: ToolSpec) -> AgentResult<()> {
        if self.tools.contains_key(&spec.name) {
            return Err(AgentError::DuplicateTool(spec.name));
        }
        tracing::info!("[ToolRegistry] Registering tool: {}", spec.name);
        self.tools.insert(spec.name.clone(), spec);
        Ok(())
    }

    /// Add every tool of a provider
    ///
    /// Returns an error if any tool name conflicts with an existing tool.
    /// Nothing is registered in that case.
    pub async fn add_provider(&mut self, provider: &dyn ToolProvider) -> AgentResult<()> {
        tracing::info!("[ToolRegistry] Adding provider '{}'", provider.name());

        let tools = provider.get_tools().await?;

        let mut seen = HashSet::new();
        if let Some(conflict) = tools
            .iter()
            .find(|t| self.tools.contains_key(&t.name) || !seen.insert(t.name.as_str()))
        {
            tracing::error!(
                "[ToolRegistry] Tool name conflict: '{}' (from provider '{}')",
                conflict.name,
                provider.name()
            );
            return Err(AgentError::DuplicateTool(conflict.name.clone()));
        }

        for tool in tools {
            self.register(tool)?;
        }

        Ok(())
    }

    /// Get a tool by name
    pub fn lookup(&self, name: &str) -> AgentResult<&ToolSpec> {
        self.tools
            .get(name)
            .ok_or_else(|| AgentError::UnknownTool(name.to_string()))
    }

    /// Summaries for the model backend, sorted by name
    pub fn summaries(&self) -> Vec<ToolSummary> {
        let mut summaries: Vec<ToolSummary> = self.tools.values().map(|t| t.summary()).collect();
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        summaries
    }

    /// Execute a tool call requested by the model
    pub async fn invoke(&self, call: &ToolCallRequest) -> AgentResult<ToolResult> {
        self.invoke_named(&call.name, &call.id, &call.arguments)
            .await
    }

    /// Execute a tool by name
    ///
    /// Fails with `UnknownTool` or `InvalidArguments` before the handler runs.
    /// Handler errors and panics are converted into a failed `ToolResult`.
    pub async fn invoke_named(
        &self,
        name: &str,
        call_id: &str,
        arguments: &Value,
    ) -> AgentResult<ToolResult> {
        let spec = self.lookup(name)?;

        spec.schema
            .validate(arguments)
            .map_err(|reason| AgentError::invalid_arguments(name, reason))?;

        tracing::info!("[ToolRegistry] Executing tool: {} ({})", name, call_id);
        tracing::debug!("[ToolRegistry] Input: {}", arguments);

        let outcome = AssertUnwindSafe(spec.handler.call(arguments))
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(Ok(payload)) => ToolResult::success(name, call_id, payload),
            Ok(Err(e)) => {
                let err = AgentError::tool_execution(name, format!("{:#}", e));
                tracing::warn!("[ToolRegistry] {}", err);
                ToolResult::failure(name, call_id, format!("{:#}", e))
            }
            Err(_) => {
                tracing::error!("[ToolRegistry] Tool '{}' panicked", name);
                ToolResult::failure(name, call_id, "tool handler panicked")
            }
        };

        tracing::debug!(
            "[ToolRegistry] Tool {} completed. Success: {}",
            name,
            result.success
        );

        Ok(result)
    }

    /// Get the list of tool names
    pub fn tool_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
