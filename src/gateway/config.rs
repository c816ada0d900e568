//! Gateway Configuration
//!
//! Where the MCP gateway lives, how to get a token for it, and which remote
//! tools to expose under which local names.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{AgentError, AgentResult};
use crate::llm::RetryPolicy;
use crate::tools::ArgumentSchema;

const TOKEN_PATH_SUFFIX: &str = "/oauth2/token";

/// A local tool name bound to a remote gateway tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolBinding {
    /// Name the model sees (e.g. "create_ticket_tool")
    pub alias: String,

    /// Name on the gateway (e.g. "target-create-ticket__create_ticket")
    pub remote: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Declared arguments. Without one any object is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<ArgumentSchema>,
}

impl ToolBinding {
    pub fn new(alias: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            remote: remote.into(),
            description: None,
            schema: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_schema(mut self, schema: ArgumentSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Parse `alias=remote,alias2=remote2`
    pub fn parse_list(spec: &str) -> AgentResult<Vec<Self>> {
        spec.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let (alias, remote) = entry.split_once('=').ok_or_else(|| {
                    AgentError::InvalidConfig(format!(
                        "tool binding '{}' must look like alias=remote",
                        entry
                    ))
                })?;
                let (alias, remote) = (alias.trim(), remote.trim());
                if alias.is_empty() || remote.is_empty() {
                    return Err(AgentError::InvalidConfig(format!(
                        "tool binding '{}' has an empty side",
                        entry
                    )));
                }
                Ok(Self::new(alias, remote))
            })
            .collect()
    }
}

/// OAuth2 client-credentials settings
#[derive(Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Configuration for the MCP tool gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Streamable-HTTP MCP endpoint
    pub url: String,

    pub oauth: OAuthConfig,

    /// Static bindings. Empty means discover tools with `list_tools`.
    #[serde(default)]
    pub tools: Vec<ToolBinding>,

    /// Backoff for HTTP 429 from the gateway
    #[serde(default = "default_gateway_retry")]
    pub retry: RetryPolicy,

    /// Refresh the token this long before it expires
    #[serde(default = "default_refresh_margin")]
    pub token_refresh_margin: Duration,
}

fn default_gateway_retry() -> RetryPolicy {
    RetryPolicy::default()
        .with_max_retries(3)
        .with_initial_delay(Duration::from_millis(700))
        .with_multiplier(1.8)
}

fn default_refresh_margin() -> Duration {
    Duration::from_secs(60)
}

impl GatewayConfig {
    pub fn new(url: impl Into<String>, oauth: OAuthConfig) -> Self {
        Self {
            url: url.into(),
            oauth,
            tools: Vec::new(),
            retry: default_gateway_retry(),
            token_refresh_margin: default_refresh_margin(),
        }
    }

    pub fn with_binding(mut self, binding: ToolBinding) -> Self {
        self.tools.push(binding);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Read the gateway block from the environment
    ///
    /// Returns `Ok(None)` when `GATEWAY_URL` is unset. Otherwise reads
    /// `GATEWAY_TOKEN_URL`, `GATEWAY_CLIENT_ID`, `GATEWAY_CLIENT_SECRET` and
    /// the optional `GATEWAY_TOOLS` binding list.
    pub fn from_env() -> AgentResult<Option<Self>> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like `from_env`, reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> AgentResult<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = match lookup("GATEWAY_URL") {
            Some(url) if !url.trim().is_empty() => url,
            _ => return Ok(None),
        };

        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| AgentError::InvalidConfig(format!("{} environment variable not set", key)))
        };

        let oauth = OAuthConfig {
            token_url: required("GATEWAY_TOKEN_URL")?,
            client_id: required("GATEWAY_CLIENT_ID")?,
            client_secret: required("GATEWAY_CLIENT_SECRET")?,
        };

        let mut config = Self::new(url, oauth);
        if let Some(spec) = lookup("GATEWAY_TOOLS") {
            config.tools = ToolBinding::parse_list(&spec)?;
        }

        config.validate()?;
        tracing::info!(
            "[GatewayConfig] Loaded gateway {} ({} static tools)",
            config.url,
            config.tools.len()
        );
        Ok(Some(config))
    }

    pub fn validate(&self) -> AgentResult<()> {
        for (key, value) in [
            ("url", &self.url),
            ("token_url", &self.oauth.token_url),
            ("client_id", &self.oauth.client_id),
            ("client_secret", &self.oauth.client_secret),
        ] {
            if value.trim().is_empty() {
                return Err(AgentError::InvalidConfig(format!(
                    "gateway config missing required key: {}",
                    key
                )));
            }
        }

        if !self.oauth.token_url.trim_end().ends_with(TOKEN_PATH_SUFFIX) {
            return Err(AgentError::InvalidConfig(format!(
                "token_url must end with '{}'",
                TOKEN_PATH_SUFFIX
            )));
        }

        let mut aliases = std::collections::HashSet::new();
        for binding in &self.tools {
            if !aliases.insert(binding.alias.as_str()) {
                return Err(AgentError::DuplicateTool(binding.alias.clone()));
            }
        }

        Ok(())
    }
}
