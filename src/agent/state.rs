//! Per-turn mutable state

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conversation::Conversation;
use crate::tools::ToolResult;

/// One executed tool call, in execution order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolTraceEntry {
    pub tool: String,
    pub call_id: String,
    pub arguments: Value,
    pub result: ToolResult,
}

/// State owned by a single `AgentLoop::run` invocation
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    pub conversation: Conversation,
    /// Completed tool-call rounds
    pub iterations: usize,
    pub tool_trace: Vec<ToolTraceEntry>,
}

impl AgentState {
    pub fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            iterations: 0,
            tool_trace: Vec::new(),
        }
    }
}
