//! Application configuration
//!
//! Everything the binary needs, read from the environment in one place:
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `ANTHROPIC_API_KEY` | model API key (required) |
//! | `ANTHROPIC_BASE_URL` | alternative Messages endpoint |
//! | `MODEL_ID`, `MODEL_MAX_TOKENS`, `MODEL_TEMPERATURE` | model settings |
//! | `MAX_ITERATIONS`, `MODEL_TIMEOUT_SECS`, `SYSTEM_PROMPT` | loop defaults |
//! | `TRACE_FILE` | JSONL tool trace |
//! | `GATEWAY_*` | see `GatewayConfig::from_env` |

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::agent::{AgentConfig, DEFAULT_MAX_ITERATIONS, DEFAULT_MODEL_TIMEOUT, DEFAULT_SYSTEM_PROMPT};
use crate::core::{AgentError, AgentResult};
use crate::gateway::GatewayConfig;
use crate::llm::anthropic::{DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use crate::llm::{AnthropicClient, AuthConfig};

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub auth: AuthConfig,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub model: ModelSettings,
    pub system_prompt: String,
    pub max_iterations: usize,
    pub model_timeout: Duration,
    pub trace_file: Option<PathBuf>,
    pub gateway: Option<GatewayConfig>,
}

impl AppConfig {
    pub fn from_env() -> AgentResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> AgentResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = non_empty("ANTHROPIC_API_KEY").ok_or_else(|| {
            AgentError::InvalidConfig("ANTHROPIC_API_KEY environment variable not set".into())
        })?;
        let auth = match non_empty("ANTHROPIC_BASE_URL") {
            Some(url) => AuthConfig::with_base_url(api_key, url),
            None => AuthConfig::new(api_key),
        };

        let model = ModelSettings {
            auth,
            model: non_empty("MODEL_ID").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: parse_var(&lookup, "MODEL_MAX_TOKENS")?.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: parse_var(&lookup, "MODEL_TEMPERATURE")?.unwrap_or(DEFAULT_TEMPERATURE),
        };

        let model_timeout = match parse_var::<u64, _>(&lookup, "MODEL_TIMEOUT_SECS")? {
            Some(0) => {
                return Err(AgentError::InvalidConfig(
                    "MODEL_TIMEOUT_SECS must be greater than zero".into(),
                ))
            }
            Some(secs) => Duration::from_secs(secs),
            None => DEFAULT_MODEL_TIMEOUT,
        };

        let config = Self {
            model,
            system_prompt: non_empty("SYSTEM_PROMPT").unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            max_iterations: parse_var(&lookup, "MAX_ITERATIONS")?.unwrap_or(DEFAULT_MAX_ITERATIONS),
            model_timeout,
            trace_file: non_empty("TRACE_FILE").map(PathBuf::from),
            gateway: GatewayConfig::from_lookup(&lookup)?,
        };

        tracing::info!(
            "[Config] model={} max_iterations={} gateway={}",
            config.model.model,
            config.max_iterations,
            config.gateway.as_ref().map(|g| g.url.as_str()).unwrap_or("none")
        );
        Ok(config)
    }

    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig::new(self.system_prompt.clone())
            .with_max_iterations(self.max_iterations)
            .with_model_timeout(self.model_timeout)
    }

    pub fn model_client(&self) -> AnthropicClient {
        AnthropicClient::with_auth(self.model.auth.clone())
            .with_model(self.model.model.clone())
            .with_max_tokens(self.model.max_tokens)
            .with_temperature(Some(self.model.temperature))
            .with_timeout(self.model_timeout)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> AgentResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| AgentError::InvalidConfig(format!("{}={:?}: {}", key, raw, e))),
        None => Ok(None),
    }
}
