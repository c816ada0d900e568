//! Tool Provider trait
//!
//! Abstraction for dynamic tool sources (the MCP gateway, OpenAPI specs, etc.)

use async_trait::async_trait;

use super::tool::ToolSpec;
use crate::core::AgentResult;

/// Trait for dynamic tool providers
///
/// Providers fetch tools from external sources and expose them as `ToolSpec`s
/// whose handlers forward calls to that source.
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Get all tools from this provider
    ///
    /// Called once when the provider is added to a registry.
    async fn get_tools(&self) -> AgentResult<Vec<ToolSpec>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &str;
}
