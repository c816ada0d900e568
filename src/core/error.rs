//! Agent error types

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while running a turn or setting up the agent
#[derive(Error, Debug)]
pub enum AgentError {
    /// A tool name was requested that the registry does not know
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments did not match the tool's schema
    #[error("Invalid arguments for tool '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    /// A tool with the same name is already registered
    #[error("Duplicate tool: {0}")]
    DuplicateTool(String),

    /// Transport, auth or timeout failure talking to the model backend
    #[error("Model unavailable: {reason}")]
    ModelUnavailable { reason: String },

    /// The model backend throttled the request
    #[error("Rate limited by model backend")]
    RateLimited { retry_after: Option<Duration> },

    /// A tool handler failed. Captured into a `ToolResult`, never aborts a turn.
    #[error("Tool '{tool}' failed: {reason}")]
    ToolExecution { tool: String, reason: String },

    /// The turn hit the configured number of tool-call rounds
    #[error("Iteration limit of {max_iterations} tool-call rounds exceeded")]
    IterationLimitExceeded { max_iterations: usize },

    /// A tool message references a tool-call-id no prior assistant message issued
    #[error("Tool result references unknown tool call id: {0}")]
    OrphanToolResult(String),

    /// The routing graph was asked to step from a terminal state
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Tool gateway failure (connection, auth, protocol)
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Create a model-unavailable error
    pub fn model_unavailable(reason: impl Into<String>) -> Self {
        AgentError::ModelUnavailable {
            reason: reason.into(),
        }
    }

    /// Create an invalid-arguments error
    pub fn invalid_arguments(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        AgentError::InvalidArguments {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Create a tool execution error
    pub fn tool_execution(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        AgentError::ToolExecution {
            tool: tool.into(),
            reason: reason.into(),
        }
    }

    /// Create a gateway error
    pub fn gateway(msg: impl Into<String>) -> Self {
        AgentError::Gateway(msg.into())
    }

    /// Whether the caller may retry the failed operation with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::ModelUnavailable { .. } | AgentError::RateLimited { .. }
        )
    }

    /// Server-suggested delay before retrying, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AgentError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for agent operations
pub type AgentResult<T> = Result<T, AgentError>;
