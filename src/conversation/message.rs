use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Id the matching `tool` message must reference
    pub id: String,
    /// Registered tool name
    pub name: String,
    /// Concrete arguments (a JSON object)
    pub arguments: Value,
}

impl ToolCallRequest {
    /// Create a tool call with an explicit id
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Create a tool call with a freshly generated id
    ///
    /// Used when a backend omits call ids.
    pub fn with_generated_id(name: impl Into<String>, arguments: Value) -> Self {
        Self::new(generate_call_id(), name, arguments)
    }
}

/// Generate a unique tool call id
pub fn generate_call_id() -> String {
    format!("call_{}", Uuid::new_v4().simple())
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,

    /// Tool calls requested by the model (assistant messages only)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    /// Id of the call this message answers (tool messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Name of the tool that produced this result (tool messages only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Whether the tool call failed (tool messages only)
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_error: bool,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
            is_error: false,
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// Create an assistant message that requests tool calls
    pub fn assistant_with_tool_calls(
        content: impl Into<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Self {
        Self {
            tool_calls,
            ..Self::plain(Role::Assistant, content)
        }
    }

    /// Create a tool result message answering `tool_call_id`
    pub fn tool(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            tool_name: Some(tool_name.into()),
            ..Self::plain(Role::Tool, content)
        }
    }

    /// Mark a tool result as a failed call
    pub fn with_error(mut self, is_error: bool) -> Self {
        self.is_error = is_error;
        self
    }

    /// Whether this is an assistant message carrying tool calls
    pub fn has_tool_calls(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = Message::tool("call_1", "weather", "{\"temp\":72}");
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "tool");
        assert_eq!(value["tool_call_id"], "call_1");
        assert!(value.get("tool_calls").is_none());
        assert!(value.get("is_error").is_none());
    }

    #[test]
    fn test_failed_tool_result_keeps_flag() {
        let msg = Message::tool("call_1", "weather", "upstream timeout").with_error(true);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["is_error"], true);

        let parsed = Message::from_json(&msg.to_json().unwrap()).unwrap();
        assert!(parsed.is_error);
        assert!(!Message::tool("call_2", "weather", "Error: none").is_error);
    }

    #[test]
    fn test_json_round_trip_keeps_tool_calls() {
        let msg = Message::assistant_with_tool_calls(
            "checking",
            vec![ToolCallRequest::new("call_1", "weather", json!({"city": "Austin"}))],
        );
        let parsed = Message::from_json(&msg.to_json().unwrap()).unwrap();
        assert_eq!(parsed, msg);
        assert!(parsed.has_tool_calls());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = ToolCallRequest::with_generated_id("weather", json!({}));
        let b = ToolCallRequest::with_generated_id("weather", json!({}));
        assert!(a.id.starts_with("call_"));
        assert_ne!(a.id, b.id);
    }
}
