//! Gateway Tool Provider
//!
//! Implements ToolProvider for the MCP gateway. With static bindings no
//! discovery call is made, which keeps startup clear of gateway rate limits.

use std::sync::Arc;

use async_trait::async_trait;

use super::config::{GatewayConfig, ToolBinding};
use super::server::GatewayClient;
use super::tool_adapter::{binding_spec, discovered_spec};
use crate::core::AgentResult;
use crate::tools::{ToolProvider, ToolSpec};

pub struct GatewayToolProvider {
    client: Arc<GatewayClient>,
    bindings: Vec<ToolBinding>,
}

impl GatewayToolProvider {
    pub fn new(client: Arc<GatewayClient>, bindings: Vec<ToolBinding>) -> Self {
        Self { client, bindings }
    }

    pub fn from_config(config: &GatewayConfig) -> AgentResult<Self> {
        let client = Arc::new(GatewayClient::new(config)?);
        Ok(Self::new(client, config.tools.clone()))
    }

    pub fn client(&self) -> &Arc<GatewayClient> {
        &self.client
    }
}

#[async_trait]
impl ToolProvider for GatewayToolProvider {
    async fn get_tools(&self) -> AgentResult<Vec<ToolSpec>> {
        if !self.bindings.is_empty() {
            tracing::info!("[GatewayToolProvider] Binding {} static tools", self.bindings.len());
            for binding in &self.bindings {
                tracing::info!("[GatewayToolProvider]   {} -> {}", binding.alias, binding.remote);
            }
            return Ok(self
                .bindings
                .iter()
                .map(|binding| binding_spec(self.client.clone(), binding))
                .collect());
        }

        tracing::info!("[GatewayToolProvider] Discovering tools from {}", self.client.url());
        let tools = self.client.list_tools().await?;
        let specs: Vec<ToolSpec> = tools
            .iter()
            .map(|tool| discovered_spec(self.client.clone(), tool))
            .collect();

        tracing::info!("[GatewayToolProvider] Created {} gateway tools", specs.len());
        Ok(specs)
    }

    fn name(&self) -> &str {
        "gateway"
    }
}
