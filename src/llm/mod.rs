//! Model backends
//!
//! The agent talks to a model through the `ModelClient` trait. The crate ships
//! an Anthropic Messages API client and a scripted client for tests and demos.

pub mod anthropic;
pub mod auth;
pub mod provider;
pub mod retry;
pub mod scripted;
pub mod types;

pub use anthropic::AnthropicClient;
pub use auth::{auth_provider, AuthConfig, AuthProvider, FnAuthProvider};
pub use provider::{ModelClient, ModelResponse};
pub use retry::RetryPolicy;
pub use scripted::{ScriptStep, ScriptedModelClient};
pub use types::{ContentBlock, MessageRequest, MessageResponse, StopReason, ToolDefinition};
