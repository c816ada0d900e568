//! Tool system for the agent
//!
//! This module provides:
//! - `ToolSpec` / `ToolHandler` - A named, schema-checked callable
//! - `ArgumentSchema` - Parameter declarations used for validation and for the model
//! - `ToolResult` - Result type for tool execution
//! - `ToolRegistry` - Explicit name -> tool mapping with register / lookup / invoke
//! - `ToolProvider` trait - Interface for dynamic tool sources (the MCP gateway, etc.)

mod provider;
mod registry;
mod schema;
mod tool;

pub use provider::ToolProvider;
pub use registry::ToolRegistry;
pub use schema::{ArgumentSchema, ParamSpec, ParamType};
pub use tool::{tool_handler, FnToolHandler, ToolHandler, ToolResult, ToolSpec, ToolSummary};
