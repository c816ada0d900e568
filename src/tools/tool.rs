//! Tool definitions
//!
//! A tool is a name, an argument schema and a handler. Handlers are reached
//! through the `ToolHandler` trait so local closures, RPC clients and gateway
//! calls look the same to the registry.

use std::future::Future;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::schema::ArgumentSchema;

/// Result of executing a tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_name: String,
    pub tool_call_id: String,
    /// Text or structured output
    pub payload: Value,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// Create a successful tool result
    pub fn success(
        tool_name: impl Into<String>,
        tool_call_id: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_call_id: tool_call_id.into(),
            payload,
            success: true,
            error: None,
        }
    }

    /// Create a failed tool result
    pub fn failure(
        tool_name: impl Into<String>,
        tool_call_id: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_call_id: tool_call_id.into(),
            payload: Value::Null,
            success: false,
            error: Some(error.into()),
        }
    }

    /// Text placed in the `tool` message the model sees
    pub fn content_for_model(&self) -> String {
        if !self.success {
            return format!("Error: {}", self.error.as_deref().unwrap_or("tool failed"));
        }
        match &self.payload {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Callable behind a tool
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Run the tool with already-validated arguments
    ///
    /// Errors are captured into a failed `ToolResult` by the registry.
    async fn call(&self, arguments: &Value) -> Result<Value>;
}

/// Wrapper to implement ToolHandler for async closures
pub struct FnToolHandler<F> {
    func: F,
}

#[async_trait]
impl<F, Fut> ToolHandler for FnToolHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    async fn call(&self, arguments: &Value) -> Result<Value> {
        (self.func)(arguments.clone()).await
    }
}

/// Create a tool handler from an async closure
pub fn tool_handler<F, Fut>(func: F) -> FnToolHandler<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    FnToolHandler { func }
}

/// A registered tool. Immutable after registration.
#[derive(Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub schema: ArgumentSchema,
    pub handler: Arc<dyn ToolHandler>,
}

impl ToolSpec {
    /// Create a tool spec from a handler
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: ArgumentSchema,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            handler,
        }
    }

    /// Create a tool spec from an async closure
    ///
    /// ```ignore
    /// let weather = ToolSpec::from_fn(
    ///     "weather",
    ///     "Current temperature for a city",
    ///     ArgumentSchema::new().required("city", ParamType::String),
    ///     |args| async move { Ok(json!({"temp": 72})) },
    /// );
    /// ```
    pub fn from_fn<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: ArgumentSchema,
        func: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self::new(name, description, schema, Arc::new(tool_handler(func)))
    }

    /// Summary sent to the model backend
    pub fn summary(&self) -> ToolSummary {
        ToolSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.schema.to_json_schema(),
        }
    }
}

impl std::fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("schema", &self.schema)
            .finish()
    }
}

/// Name, description and JSON schema of a tool as the model sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSummary {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ParamType;
    use serde_json::json;

    #[test]
    fn test_tool_result_success() {
        let result = ToolResult::success("weather", "call_1", json!({"temp": 72}));
        assert!(result.success);
        assert_eq!(result.content_for_model(), r#"{"temp":72}"#);
    }

    #[test]
    fn test_tool_result_text_payload() {
        let result = ToolResult::success("search_kb", "call_1", json!("Trash pickup is weekly."));
        assert_eq!(result.content_for_model(), "Trash pickup is weekly.");
    }

    #[test]
    fn test_tool_result_failure() {
        let result = ToolResult::failure("weather", "call_1", "upstream timeout");
        assert!(!result.success);
        assert_eq!(result.payload, Value::Null);
        assert_eq!(result.content_for_model(), "Error: upstream timeout");
    }

    #[tokio::test]
    async fn test_closure_handler() {
        let spec = ToolSpec::from_fn(
            "echo",
            "Echo the input",
            ArgumentSchema::new().required("text", ParamType::String),
            |args| async move { Ok(args["text"].clone()) },
        );
        let out = spec.handler.call(&json!({"text": "hi"})).await.unwrap();
        assert_eq!(out, json!("hi"));
        assert_eq!(spec.summary().input_schema["required"], json!(["text"]));
    }
}
