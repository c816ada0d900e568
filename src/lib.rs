pub mod core;
pub mod conversation;
pub mod tools;

// Model backends
pub mod llm;

// Routing graph and the loop that drives it
pub mod graph;
pub mod agent;

// Prompt screening before a turn reaches the model
pub mod guard;

// MCP tool gateway
pub mod gateway;

// Setup glue
pub mod config;
pub mod logging;

// Useful helpers for agent implementations
pub mod helpers;

pub use agent::{AgentConfig, AgentLoop, TurnOutcome, TurnRequest};
pub use conversation::{Conversation, Message, Role, ToolCallRequest};
pub use core::{AgentError, AgentResult};
pub use graph::{RouteState, RoutingGraph};
pub use guard::{GuardDecision, PromptGuard};
pub use llm::{ModelClient, ModelResponse};
pub use tools::{ArgumentSchema, ToolRegistry, ToolResult, ToolSpec};
