//! Anthropic Messages API client
//!
//! Translates a `Conversation` into a Messages API request:
//! - system messages are joined into the top-level `system` field
//! - assistant tool calls become `tool_use` blocks
//! - tool messages become `tool_result` blocks; consecutive ones are merged
//!   into a single user message, as the API requires

use std::env;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};

use super::auth::{auth_provider, AuthConfig, AuthProvider, AuthSource};
use super::provider::{ModelClient, ModelResponse};
use super::types::{
    ApiError, ContentBlock, MessageRequest, MessageResponse, ToolChoice, ToolDefinition,
    WireMessage,
};
use crate::conversation::{Conversation, Message, Role, ToolCallRequest};
use crate::core::{AgentError, AgentResult};
use crate::tools::ToolSummary;

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-3-7-sonnet-latest";
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Model client for the Anthropic Messages API
#[derive(Clone)]
pub struct AnthropicClient {
    client: Client,
    auth: AuthSource,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
    timeout: Duration,
}

impl AnthropicClient {
    /// Create a client from environment variables
    ///
    /// Reads from:
    /// - `ANTHROPIC_API_KEY` (required)
    /// - `ANTHROPIC_BASE_URL` (optional, full Messages endpoint)
    /// - `MODEL_ID` (optional)
    pub fn from_env() -> AgentResult<Self> {
        tracing::info!("[Anthropic] Creating client from environment");

        let api_key = env::var("ANTHROPIC_API_KEY").map_err(|_| {
            AgentError::InvalidConfig("ANTHROPIC_API_KEY environment variable not set".into())
        })?;

        let auth = match env::var("ANTHROPIC_BASE_URL") {
            Ok(url) if !url.trim().is_empty() => AuthConfig::with_base_url(api_key, url),
            _ => AuthConfig::new(api_key),
        };

        let mut client = Self::from_auth(AuthSource::Static(auth));
        if let Ok(model) = env::var("MODEL_ID") {
            client = client.with_model(model);
        }

        tracing::info!("[Anthropic] Using model: {}", client.model);
        Ok(client)
    }

    /// Create a client with a fixed API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::from_auth(AuthSource::Static(AuthConfig::new(api_key)))
    }

    /// Create a client with fixed credentials
    pub fn with_auth(auth: AuthConfig) -> Self {
        Self::from_auth(AuthSource::Static(auth))
    }

    /// Create a client that fetches credentials before every request
    pub fn with_auth_provider<F, Fut>(provider: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AgentResult<AuthConfig>> + Send + 'static,
    {
        Self::from_auth(AuthSource::Dynamic(Arc::new(auth_provider(provider))))
    }

    /// Create a client from a trait object auth provider
    pub fn with_auth_provider_boxed(provider: Arc<dyn AuthProvider>) -> Self {
        Self::from_auth(AuthSource::Dynamic(provider))
    }

    fn from_auth(auth: AuthSource) -> Self {
        Self {
            client: Client::new(),
            auth,
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: Some(DEFAULT_TEMPERATURE),
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Set the model to use
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the max tokens for responses
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature (`None` leaves it to the API default)
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the wire request for a conversation
    pub fn build_request(&self, conversation: &Conversation, tools: &[ToolSummary]) -> MessageRequest {
        let (system, messages) = to_wire_messages(conversation.messages());

        let tools: Vec<ToolDefinition> = tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name.clone(),
                description: Some(t.description.clone()).filter(|d| !d.is_empty()),
                input_schema: t.input_schema.clone(),
            })
            .collect();

        let (tools, tool_choice) = if tools.is_empty() {
            (None, None)
        } else {
            (Some(tools), Some(ToolChoice::Auto))
        };

        MessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages,
            system,
            tools,
            tool_choice,
            temperature: self.temperature,
        }
    }

    async fn send_request(&self, request: &MessageRequest) -> AgentResult<MessageResponse> {
        let auth = self.auth.get_auth().await?;
        let url = auth.base_url.as_deref().unwrap_or(DEFAULT_API_URL);

        let request_json = serde_json::to_string(request)?;
        tracing::debug!("[Anthropic] Request JSON: {}", request_json);

        let response = self
            .client
            .post(url)
            .timeout(self.timeout)
            .header("Content-Type", "application/json")
            .header("x-api-key", &auth.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .body(request_json)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let response_text = response.text().await.map_err(transport_error)?;

        tracing::debug!("[Anthropic] Response status: {}", status);
        tracing::debug!("[Anthropic] Response body: {}", response_text);

        if !status.is_success() {
            tracing::error!("[Anthropic] API error: {} - {}", status, response_text);
            return Err(status_error(status, retry_after, &response_text));
        }

        serde_json::from_str(&response_text).map_err(|e| {
            AgentError::model_unavailable(format!("malformed Messages API response: {}", e))
        })
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    async fn complete(
        &self,
        conversation: &Conversation,
        tools: &[ToolSummary],
    ) -> AgentResult<ModelResponse> {
        let request = self.build_request(conversation, tools);

        tracing::info!(
            "[Anthropic] Sending {} messages with {} tools to {}",
            request.messages.len(),
            tools.len(),
            self.model
        );

        let response = self.send_request(&request).await?;

        tracing::info!(
            "[Anthropic] Received response {} (stop: {:?}, in: {}, out: {})",
            response.id,
            response.stop_reason,
            response.usage.input_tokens,
            response.usage.output_tokens
        );

        Ok(from_wire_response(&response))
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    fn provider_name(&self) -> &str {
        "anthropic"
    }
}

/// Split a conversation into the `system` field and wire messages
fn to_wire_messages(messages: &[Message]) -> (Option<String>, Vec<WireMessage>) {
    let mut system_parts: Vec<&str> = Vec::new();
    let mut wire: Vec<WireMessage> = Vec::new();

    for msg in messages {
        match msg.role {
            Role::System => system_parts.push(&msg.content),
            Role::User => push_merged(&mut wire, "user", vec![ContentBlock::text(&msg.content)]),
            Role::Assistant => {
                let mut blocks = Vec::new();
                if !msg.content.is_empty() {
                    blocks.push(ContentBlock::text(&msg.content));
                }
                blocks.extend(
                    msg.tool_calls
                        .iter()
                        .map(|c| ContentBlock::tool_use(&c.id, &c.name, c.arguments.clone())),
                );
                if !blocks.is_empty() {
                    push_merged(&mut wire, "assistant", blocks);
                }
            }
            Role::Tool => {
                let id = msg.tool_call_id.as_deref().unwrap_or_default();
                push_merged(
                    &mut wire,
                    "user",
                    vec![ContentBlock::tool_result(id, &msg.content, msg.is_error)],
                );
            }
        }
    }

    let system = if system_parts.is_empty() {
        None
    } else {
        Some(system_parts.join("\n\n"))
    };

    (system, wire)
}

/// The API requires alternating roles, so same-role neighbours are merged
fn push_merged(wire: &mut Vec<WireMessage>, role: &str, blocks: Vec<ContentBlock>) {
    if let Some(last) = wire.last_mut() {
        if last.role == role {
            last.content.extend(blocks);
            return;
        }
    }
    wire.push(match role {
        "assistant" => WireMessage::assistant(blocks),
        _ => WireMessage::user(blocks),
    });
}

fn from_wire_response(response: &MessageResponse) -> ModelResponse {
    let calls: Vec<ToolCallRequest> = response
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } if id.is_empty() => {
                Some(ToolCallRequest::with_generated_id(name, input.clone()))
            }
            ContentBlock::ToolUse { id, name, input } => {
                Some(ToolCallRequest::new(id, name, input.clone()))
            }
            _ => None,
        })
        .collect();

    ModelResponse::tool_calls(response.text(), calls)
}

fn transport_error(e: reqwest::Error) -> AgentError {
    if e.is_timeout() {
        AgentError::model_unavailable(format!("request timed out: {}", e))
    } else {
        AgentError::model_unavailable(format!("transport error: {}", e))
    }
}

fn status_error(status: StatusCode, retry_after: Option<Duration>, body: &str) -> AgentError {
    let detail = serde_json::from_str::<ApiError>(body)
        .map(|e| format!("{}: {}", e.error.error_type, e.error.message))
        .unwrap_or_else(|_| body.to_string());

    match status {
        StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AgentError::model_unavailable(format!("authentication failed ({}): {}", status, detail))
        }
        s if s.is_server_error() => {
            AgentError::model_unavailable(format!("server error ({}): {}", status, detail))
        }
        _ => AgentError::InvalidConfig(format!("model request rejected ({}): {}", status, detail)),
    }
}

/// `Retry-After` in delta-seconds form
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<f64>()
        .ok()
        .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ArgumentSchema, ParamType, ToolSpec};
    use reqwest::header::HeaderValue;
    use serde_json::json;

    fn weather_summary() -> ToolSummary {
        ToolSpec::from_fn(
            "weather",
            "Current temperature for a city",
            ArgumentSchema::new().required("city", ParamType::String),
            |_args| async move { Ok(json!({"temp": 72})) },
        )
        .summary()
    }

    fn conversation_after_two_calls() -> Conversation {
        let mut conversation = Conversation::seeded("You are CityAssist.", "Weather in Austin and Dallas?");
        conversation
            .push(Message::assistant_with_tool_calls(
                "Checking both.",
                vec![
                    ToolCallRequest::new("toolu_1", "weather", json!({"city": "Austin"})),
                    ToolCallRequest::new("toolu_2", "weather", json!({"city": "Dallas"})),
                ],
            ))
            .unwrap();
        conversation
            .push(Message::tool("toolu_1", "weather", "{\"temp\":72}"))
            .unwrap();
        conversation
            .push(Message::tool("toolu_2", "weather", "Error: upstream timeout").with_error(true))
            .unwrap();
        conversation
    }

    #[test]
    fn test_request_translation() {
        let client = AnthropicClient::new("sk-test").with_model("claude-test");
        let request = client.build_request(&conversation_after_two_calls(), &[weather_summary()]);

        assert_eq!(request.model, "claude-test");
        assert_eq!(request.system.as_deref(), Some("You are CityAssist."));
        assert_eq!(request.messages.len(), 3);

        assert_eq!(request.messages[0].role, "user");
        assert_eq!(request.messages[1].role, "assistant");
        assert_eq!(request.messages[1].content.len(), 3);
        assert!(matches!(
            &request.messages[1].content[1],
            ContentBlock::ToolUse { id, .. } if id == "toolu_1"
        ));

        // both results merged into one user message
        assert_eq!(request.messages[2].role, "user");
        assert_eq!(
            request.messages[2].content,
            vec![
                ContentBlock::tool_result("toolu_1", "{\"temp\":72}", false),
                ContentBlock::tool_result("toolu_2", "Error: upstream timeout", true),
            ]
        );

        let tools = request.tools.unwrap();
        assert_eq!(tools[0].name, "weather");
        assert_eq!(tools[0].input_schema["required"], json!(["city"]));
    }

    #[test]
    fn test_tool_result_error_follows_flag() {
        let mut conversation = Conversation::seeded("sys", "Look up ticket 42");
        conversation
            .push(Message::assistant_with_tool_calls(
                "",
                vec![ToolCallRequest::new("toolu_1", "ticket_lookup", json!({"id": "42"}))],
            ))
            .unwrap();
        conversation
            .push(Message::tool("toolu_1", "ticket_lookup", "Error: printer jam reported"))
            .unwrap();

        let request = AnthropicClient::new("sk-test").build_request(&conversation, &[]);
        assert_eq!(
            request.messages[2].content,
            vec![ContentBlock::tool_result("toolu_1", "Error: printer jam reported", false)]
        );
    }

    #[test]
    fn test_no_tools_omits_tool_fields() {
        let client = AnthropicClient::new("sk-test");
        let request = client.build_request(&Conversation::seeded("sys", "2+2?"), &[]);
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("tools").is_none());
        assert!(value.get("tool_choice").is_none());
    }

    #[test]
    fn test_response_with_tool_use() {
        let response: MessageResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "model": "claude-test",
            "content": [
                {"type": "text", "text": "Let me look."},
                {"type": "tool_use", "id": "toolu_9", "name": "weather", "input": {"city": "Austin"}}
            ],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 1, "output_tokens": 1}
        }))
        .unwrap();

        let model_response = from_wire_response(&response);
        assert!(model_response.has_tool_calls());
        assert_eq!(model_response.content(), "Let me look.");
        assert_eq!(model_response.calls()[0].id, "toolu_9");
        assert_eq!(model_response.calls()[0].arguments, json!({"city": "Austin"}));
    }

    #[test]
    fn test_status_mapping() {
        let err = status_error(StatusCode::TOO_MANY_REQUESTS, Some(Duration::from_secs(3)), "");
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));

        let err = status_error(
            StatusCode::SERVICE_UNAVAILABLE,
            None,
            r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#,
        );
        assert!(matches!(&err, AgentError::ModelUnavailable { reason } if reason.contains("Overloaded")));

        let err = status_error(StatusCode::UNAUTHORIZED, None, "bad key");
        assert!(err.is_retryable());

        let err = status_error(StatusCode::BAD_REQUEST, None, "bad request");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(2)));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_unrepresentable_retry_after_is_ignored() {
        let mut headers = HeaderMap::new();
        for value in ["1e300", "-5", "inf", "NaN"] {
            headers.insert(RETRY_AFTER, HeaderValue::from_static(value));
            assert_eq!(parse_retry_after(&headers), None, "{}", value);
        }

        let err = status_error(StatusCode::TOO_MANY_REQUESTS, parse_retry_after(&headers), "");
        assert!(matches!(err, AgentError::RateLimited { retry_after: None }));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unavailable() {
        let client = AnthropicClient::with_auth(AuthConfig::with_base_url(
            "sk-test",
            "http://127.0.0.1:9/v1/messages",
        ))
        .with_timeout(Duration::from_secs(2));

        let err = client
            .complete(&Conversation::seeded("sys", "hi"), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::ModelUnavailable { .. }));
    }
}
