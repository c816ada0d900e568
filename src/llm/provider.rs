//! Model client trait
//!
//! Abstracts the language-model backend so the agent loop works the same
//! against the Anthropic API, a proxy, or a scripted stub.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::conversation::{Conversation, Message, Role, ToolCallRequest};
use crate::core::AgentResult;
use crate::tools::ToolSummary;

/// Reply from the model for one request
///
/// Always an assistant message. It either carries final text or one or more
/// tool call requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub message: Message,
}

impl ModelResponse {
    /// A terminal response with final text
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            message: Message::assistant(text),
        }
    }

    /// A response requesting tool calls
    pub fn tool_calls(text: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self {
            message: Message::assistant_with_tool_calls(text, calls),
        }
    }

    /// Wrap an assistant message
    ///
    /// Messages with any other role are coerced to assistant.
    pub fn from_message(mut message: Message) -> Self {
        if message.role != Role::Assistant {
            tracing::warn!(
                "[ModelResponse] Coercing {} message to assistant",
                message.role
            );
            message.role = Role::Assistant;
        }
        Self { message }
    }

    /// Whether the model requested tools
    pub fn has_tool_calls(&self) -> bool {
        !self.message.tool_calls.is_empty()
    }

    /// Requested tool calls (empty for a terminal response)
    pub fn calls(&self) -> &[ToolCallRequest] {
        &self.message.tool_calls
    }

    /// Text content of the response
    pub fn content(&self) -> &str {
        &self.message.content
    }
}

/// Trait for language-model backends
///
/// Implementations send the full conversation plus tool summaries and map
/// transport, auth and timeout failures to `AgentError::ModelUnavailable`,
/// throttling to `AgentError::RateLimited`.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send the conversation and available tools, returning the model's reply
    async fn complete(
        &self,
        conversation: &Conversation,
        tools: &[ToolSummary],
    ) -> AgentResult<ModelResponse>;

    /// Model identifier for logging
    fn model(&self) -> String;

    /// Provider name (e.g., "anthropic", "scripted")
    fn provider_name(&self) -> &str;
}
