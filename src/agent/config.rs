//! Agent Configuration
//!
//! Per-loop defaults. Every turn may override the system prompt and the
//! iteration cap through its `TurnRequest`.

use std::time::Duration;

use crate::core::{AgentError, AgentResult};
use crate::llm::RetryPolicy;

pub const DEFAULT_MAX_ITERATIONS: usize = 10;
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(60);

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a concise, action-oriented assistant. \
When a tool is relevant, call it instead of guessing. \
If a tool call fails, answer with a short helpful message. \
Do not show raw JSON to the user.";

/// Configuration for an AgentLoop
///
/// ```ignore
/// let config = AgentConfig::new("You are CityAssist")
///     .with_max_iterations(5)
///     .with_model_timeout(Duration::from_secs(30))
///     .with_retry_policy(RetryPolicy::none());
/// ```
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// System prompt used when a turn does not supply one
    pub system_prompt: String,

    /// Maximum number of tool-call rounds per turn
    pub max_iterations: usize,

    /// Upper bound for a single model call
    pub model_timeout: Duration,

    /// Backoff for retryable model failures
    pub retry_policy: RetryPolicy,

    /// Run the tool calls of one round concurrently
    pub parallel_tools: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}

impl AgentConfig {
    /// Create a new agent configuration with a system prompt
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
            retry_policy: RetryPolicy::default(),
            parallel_tools: true,
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Run tool calls of a round one after another instead of concurrently
    pub fn with_parallel_tools(mut self, parallel: bool) -> Self {
        self.parallel_tools = parallel;
        self
    }

    /// Reject configurations that can never produce a turn
    pub fn validate(&self) -> AgentResult<()> {
        if self.model_timeout.is_zero() {
            return Err(AgentError::InvalidConfig(
                "model_timeout must be greater than zero".into(),
            ));
        }
        if !(self.retry_policy.multiplier.is_finite() && self.retry_policy.multiplier >= 1.0) {
            return Err(AgentError::InvalidConfig(format!(
                "retry multiplier must be >= 1.0, got {}",
                self.retry_policy.multiplier
            )));
        }
        Ok(())
    }
}
