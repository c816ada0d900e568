//! Gateway Tool Adapter
//!
//! Exposes gateway tools as registry `ToolSpec`s. Static bindings become a
//! local alias for a remote name; discovered tools keep their remote name and
//! carry the schema the gateway advertises.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::config::ToolBinding;
use super::payload::ToolPayload;
use super::server::GatewayClient;
use crate::tools::{ArgumentSchema, ToolHandler, ToolSpec};

/// Handler forwarding calls to one remote gateway tool
pub struct GatewayTool {
    client: Arc<GatewayClient>,
    remote_name: String,
}

impl GatewayTool {
    pub fn new(client: Arc<GatewayClient>, remote_name: impl Into<String>) -> Self {
        Self {
            client,
            remote_name: remote_name.into(),
        }
    }

    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }
}

#[async_trait]
impl ToolHandler for GatewayTool {
    async fn call(&self, arguments: &Value) -> Result<Value> {
        let raw = self.client.call_tool_text(&self.remote_name, arguments).await?;
        tracing::debug!("[GatewayTool] Raw result from {}: {}", self.remote_name, raw);

        let payload = ToolPayload::normalize(&raw);
        if !payload.is_success() {
            bail!(
                "{} returned status {}: {}",
                self.remote_name,
                payload.status_code,
                payload.body
            );
        }

        Ok(payload.body)
    }
}

/// Tool spec for a static alias binding
pub fn binding_spec(client: Arc<GatewayClient>, binding: &ToolBinding) -> ToolSpec {
    let description = binding
        .description
        .clone()
        .unwrap_or_else(|| format!("Gateway tool bound to {}", binding.remote));

    ToolSpec::new(
        binding.alias.clone(),
        description,
        binding.schema.clone().unwrap_or_default(),
        Arc::new(GatewayTool::new(client, binding.remote.clone())),
    )
}

/// Tool spec for a tool discovered with `list_tools`
pub fn discovered_spec(client: Arc<GatewayClient>, tool: &rmcp::model::Tool) -> ToolSpec {
    let schema = ArgumentSchema::from_json_schema(&Value::Object(tool.input_schema.as_ref().clone()));
    let description = tool
        .description
        .as_ref()
        .map(|d| d.to_string())
        .unwrap_or_else(|| format!("Gateway tool {}", tool.name));

    ToolSpec::new(
        tool.name.to_string(),
        description,
        schema,
        Arc::new(GatewayTool::new(client, tool.name.to_string())),
    )
}
