//! Retry with exponential backoff for model calls
//!
//! Only errors where `AgentError::is_retryable()` holds are retried. A
//! server-provided `retry_after` wins when it is longer than the computed delay,
//! but no single wait exceeds `max_delay`.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{AgentError, AgentResult};

/// Backoff parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 disables retrying)
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Growth factor between retries
    pub multiplier: f64,
    /// Upper bound for a single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Set the number of retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the initial delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the growth factor
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Delay before retry number `retry` (0-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry as i32);
        let millis = self.initial_delay.as_millis() as f64 * factor;
        let max = self.max_delay.as_millis() as f64;
        Duration::from_millis(millis.min(max) as u64)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or
    /// retries are exhausted
    pub async fn retry<T, F, Fut>(&self, label: &str, mut op: F) -> AgentResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AgentResult<T>>,
    {
        let mut retry = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && retry < self.max_retries => {
                    let delay = match e.retry_after() {
                        Some(after) => after.max(self.delay_for(retry)).min(self.max_delay),
                        None => self.delay_for(retry),
                    };
                    tracing::warn!(
                        attempt = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        "[Retry] {} failed: {}. Retrying",
                        label,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        tracing::error!(
                            "[Retry] {} failed after {} retries: {}",
                            label,
                            retry,
                            e
                        );
                    }
                    return Err(exhausted(e));
                }
            }
        }
    }
}

/// Rate limiting that outlasts the retry budget is reported as unavailability
fn exhausted(e: AgentError) -> AgentError {
    match e {
        AgentError::RateLimited { .. } => {
            AgentError::model_unavailable("rate limited and retries exhausted")
        }
        other => other,
    }
}
