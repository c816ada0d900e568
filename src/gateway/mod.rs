//! MCP tool gateway
//!
//! Remote tools are reached through a streamable-HTTP MCP gateway protected by
//! OAuth2 client credentials. `GatewayToolProvider` turns them into registry
//! tools, either from static alias bindings or by discovery.

pub mod config;
pub mod payload;
pub mod provider;
pub mod server;
pub mod token;
pub mod tool_adapter;

pub use config::{GatewayConfig, OAuthConfig, ToolBinding};
pub use payload::ToolPayload;
pub use provider::GatewayToolProvider;
pub use server::GatewayClient;
pub use token::TokenCache;
pub use tool_adapter::{binding_spec, discovered_spec, GatewayTool};
