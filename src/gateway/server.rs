//! MCP gateway connection
//!
//! Wraps an rmcp streamable-HTTP client session authenticated with a bearer
//! token from the `TokenCache`. The session is rebuilt whenever the cache
//! hands out a different token, and throttled calls (HTTP 429) are retried
//! with backoff.

use std::sync::Arc;

use rmcp::model::{CallToolRequestParams, CallToolResult, ListToolsResult, RawContent, Tool};
use rmcp::service::RunningService;
use rmcp::transport::{
    streamable_http_client::StreamableHttpClientTransportConfig, StreamableHttpClientTransport,
};
use rmcp::{RoleClient, ServiceExt};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::config::GatewayConfig;
use super::token::TokenCache;
use crate::core::{AgentError, AgentResult};
use crate::llm::RetryPolicy;

/// The concrete transport type we use for HTTP MCP connections
pub type HttpClientTransport = StreamableHttpClientTransport<reqwest::Client>;

struct Session {
    token: String,
    service: RunningService<RoleClient, ()>,
}

/// Client for the MCP tool gateway
pub struct GatewayClient {
    url: String,
    tokens: Arc<TokenCache>,
    retry: RetryPolicy,
    session: RwLock<Option<Session>>,
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("url", &self.url)
            .field("retry", &self.retry)
            .finish()
    }
}

impl GatewayClient {
    /// Create a client. No connection is made until the first call.
    pub fn new(config: &GatewayConfig) -> AgentResult<Self> {
        config.validate()?;
        let tokens = Arc::new(TokenCache::new(
            config.oauth.clone(),
            config.token_refresh_margin,
        ));
        Ok(Self::with_token_cache(&config.url, tokens, config.retry.clone()))
    }

    /// Create a client sharing an existing token cache
    pub fn with_token_cache(url: &str, tokens: Arc<TokenCache>, retry: RetryPolicy) -> Self {
        tracing::info!("[Gateway] Created gateway client for {}", url);
        Self {
            url: url.to_string(),
            tokens,
            retry,
            session: RwLock::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn is_connected(&self) -> bool {
        self.session.read().await.is_some()
    }

    async fn connect(&self, token: &str) -> AgentResult<RunningService<RoleClient, ()>> {
        tracing::info!("[Gateway] Connecting to {}", self.url);

        let transport_config =
            StreamableHttpClientTransportConfig::with_uri(self.url.as_str()).auth_header(token);
        let transport: HttpClientTransport = HttpClientTransport::from_config(transport_config);

        ().serve(transport)
            .await
            .map_err(|e| AgentError::gateway(format!("failed to connect to {}: {}", self.url, e)))
    }

    /// Make sure the session uses the current token, reconnecting if not
    async fn ensure_session(&self) -> AgentResult<()> {
        let token = self.tokens.access_token().await?;

        {
            let guard = self.session.read().await;
            if matches!(guard.as_ref(), Some(session) if session.token == token) {
                return Ok(());
            }
        }

        let mut guard = self.session.write().await;
        if matches!(guard.as_ref(), Some(session) if session.token == token) {
            return Ok(());
        }

        if guard.is_some() {
            tracing::info!("[Gateway] Token changed, refreshing session");
        }
        let service = self.connect(&token).await?;
        *guard = Some(Session { token, service });
        Ok(())
    }

    /// Drop the current session; the next call reconnects
    pub async fn disconnect(&self) {
        if self.session.write().await.take().is_some() {
            tracing::info!("[Gateway] Disconnected from {}", self.url);
        }
    }

    /// List all tools the gateway exposes
    pub async fn list_tools(&self) -> AgentResult<Vec<Tool>> {
        let result: ListToolsResult = self
            .with_retry("list_tools", || async move {
                self.ensure_session().await?;
                let guard = self.session.read().await;
                let session = guard
                    .as_ref()
                    .ok_or_else(|| AgentError::gateway("gateway session not connected"))?;
                session
                    .service
                    .list_tools(Default::default())
                    .await
                    .map_err(|e| AgentError::gateway(format!("list_tools failed: {}", e)))
            })
            .await?;

        tracing::info!("[Gateway] Got {} tools from {}", result.tools.len(), self.url);
        Ok(result.tools)
    }

    /// Call a tool by its gateway name
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> AgentResult<CallToolResult> {
        tracing::info!("[Gateway] Calling tool '{}'", name);
        tracing::debug!("[Gateway] Arguments: {:?}", arguments);

        let arguments = &arguments;
        let result = self
            .with_retry(name, || async move {
                self.ensure_session().await?;
                let guard = self.session.read().await;
                let session = guard
                    .as_ref()
                    .ok_or_else(|| AgentError::gateway("gateway session not connected"))?;
                session
                    .service
                    .call_tool(CallToolRequestParams {
                        meta: None,
                        name: name.to_string().into(),
                        arguments: arguments.clone(),
                        task: None,
                    })
                    .await
                    .map_err(|e| AgentError::gateway(format!("call to '{}' failed: {}", name, e)))
            })
            .await?;

        tracing::debug!("[Gateway] Tool call completed for '{}'", name);
        Ok(result)
    }

    /// Call a tool and return its output as text
    ///
    /// Fails when the gateway flags the result as an error.
    pub async fn call_tool_text(&self, name: &str, arguments: &Value) -> AgentResult<String> {
        let arguments = match arguments {
            Value::Object(map) => Some(map.clone()),
            Value::Null => Some(Map::new()),
            other => {
                return Err(AgentError::invalid_arguments(
                    name,
                    format!("arguments must be an object, got {}", other),
                ))
            }
        };

        let result = self.call_tool(name, arguments).await?;
        result_text(name, result)
    }

    /// Retry throttled gateway calls. Other failures drop the session so the
    /// next call starts from a fresh connection.
    async fn with_retry<T, F, Fut>(&self, label: &str, mut op: F) -> AgentResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = AgentResult<T>>,
    {
        let mut retry = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if is_throttled(&e) && retry < self.retry.max_retries => {
                    let delay = self.retry.delay_for(retry);
                    tracing::warn!(
                        "[Gateway] {} throttled (attempt {}), retrying in {}ms",
                        label,
                        retry + 1,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => {
                    if matches!(e, AgentError::Gateway(_)) && !is_throttled(&e) {
                        self.disconnect().await;
                    }
                    tracing::error!("[Gateway] {} failed: {}", label, e);
                    return Err(e);
                }
            }
        }
    }
}

fn is_throttled(e: &AgentError) -> bool {
    matches!(e, AgentError::Gateway(msg) if msg.contains("429") || msg.contains("Too Many Requests"))
}

/// Flatten a tool result into text
fn result_text(name: &str, result: CallToolResult) -> AgentResult<String> {
    let is_error = result.is_error.unwrap_or(false);

    let mut parts = Vec::new();
    for content in &result.content {
        match &content.raw {
            RawContent::Text(text_content) => parts.push(text_content.text.clone()),
            RawContent::Resource(resource_content) => {
                parts.push(serde_json::to_string(&resource_content.resource)?)
            }
            _ => parts.push(serde_json::to_string(content)?),
        }
    }

    let text = if parts.is_empty() {
        serde_json::to_string(&result)?
    } else {
        parts.join("\n")
    };

    if is_error {
        return Err(AgentError::gateway(format!("tool '{}' reported an error: {}", name, text)));
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::config::OAuthConfig;
    use rmcp::model::Content;

    #[test]
    fn test_result_text_joins_parts() {
        let result = CallToolResult::success(vec![Content::text("line one"), Content::text("line two")]);
        assert_eq!(result_text("kb", result).unwrap(), "line one\nline two");
    }

    #[test]
    fn test_error_result_fails() {
        let result = CallToolResult::error(vec![Content::text("ticket not found")]);
        let err = result_text("tickets", result).unwrap_err();
        assert!(matches!(err, AgentError::Gateway(msg) if msg.contains("ticket not found")));
    }

    #[test]
    fn test_throttle_detection() {
        assert!(is_throttled(&AgentError::gateway("HTTP status 429 Too Many Requests")));
        assert!(!is_throttled(&AgentError::gateway("connection refused")));
        assert!(!is_throttled(&AgentError::UnknownTool("429".into())));
    }

    #[tokio::test]
    async fn test_new_rejects_bad_token_url() {
        let config = GatewayConfig::new(
            "https://gateway.example.com/mcp",
            OAuthConfig {
                token_url: "https://auth.example.com/token".into(),
                client_id: "id".into(),
                client_secret: "secret".into(),
            },
        );
        assert!(GatewayClient::new(&config).is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_calls_retry_then_give_up() {
        let config = GatewayConfig::new(
            "https://gateway.example.com/mcp",
            OAuthConfig {
                token_url: "https://auth.example.com/oauth2/token".into(),
                client_id: "id".into(),
                client_secret: "secret".into(),
            },
        );
        let client = GatewayClient::new(&config).unwrap();
        let counter = std::sync::atomic::AtomicU32::new(0);
        let attempts = &counter;

        let result: AgentResult<()> = client
            .with_retry("search_kb", || async move {
                attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Err(AgentError::gateway("HTTP status client error (429 Too Many Requests)"))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 4);
    }

    #[tokio::test]
    #[ignore] // Requires a reachable gateway and credentials in the environment
    async fn test_gateway_lists_tools() {
        let config = GatewayConfig::from_env().unwrap().unwrap();
        let client = GatewayClient::new(&config).unwrap();
        assert!(!client.list_tools().await.unwrap().is_empty());
    }
}
