//! Scripted model client for tests, demos and offline runs.
//!
//! Replays a fixed queue of responses in order. Once the queue is down to its
//! last entry that entry is repeated forever, so a single-response script
//! behaves like a model that always says the same thing. Every conversation
//! it was shown is recorded for assertions.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::provider::{ModelClient, ModelResponse};
use crate::conversation::{Conversation, ToolCallRequest};
use crate::core::{AgentError, AgentResult};
use crate::tools::ToolSummary;

/// One scripted step: a response or an error
pub type ScriptStep = AgentResult<ModelResponse>;

/// Deterministic model client replaying scripted responses
pub struct ScriptedModelClient {
    script: Mutex<VecDeque<ScriptStep>>,
    seen: Mutex<Vec<Conversation>>,
}

impl ScriptedModelClient {
    /// Create a client replaying `responses` in order
    pub fn new(responses: Vec<ModelResponse>) -> Self {
        Self::with_steps(responses.into_iter().map(Ok).collect())
    }

    /// Create a client replaying responses and errors in order
    pub fn with_steps(steps: Vec<ScriptStep>) -> Self {
        Self {
            script: Mutex::new(steps.into()),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// A model that answers immediately with `text`
    pub fn answering(text: impl Into<String>) -> Self {
        Self::new(vec![ModelResponse::text(text)])
    }

    /// A model that requests `tool` once, then answers with `answer`
    pub fn calling_then_answering(
        tool: &str,
        arguments: serde_json::Value,
        answer: impl Into<String>,
    ) -> Self {
        Self::new(vec![
            ModelResponse::tool_calls(
                "",
                vec![ToolCallRequest::new("call_1", tool, arguments)],
            ),
            ModelResponse::text(answer),
        ])
    }

    /// Conversations passed to `complete`, in call order
    pub fn seen(&self) -> Vec<Conversation> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Number of `complete` calls so far
    pub fn call_count(&self) -> usize {
        self.seen.lock().map(|s| s.len()).unwrap_or_default()
    }

    fn next_step(&self) -> ScriptStep {
        let mut script = self
            .script
            .lock()
            .map_err(|_| AgentError::model_unavailable("scripted model poisoned"))?;

        if script.len() > 1 {
            return script
                .pop_front()
                .unwrap_or_else(|| Err(AgentError::model_unavailable("script exhausted")));
        }

        match script.front() {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(_)) => script
                .pop_front()
                .unwrap_or_else(|| Err(AgentError::model_unavailable("script exhausted"))),
            None => Err(AgentError::model_unavailable("script exhausted")),
        }
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    async fn complete(
        &self,
        conversation: &Conversation,
        _tools: &[ToolSummary],
    ) -> AgentResult<ModelResponse> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(conversation.clone());
        }
        self.next_step()
    }

    fn model(&self) -> String {
        "scripted".to_string()
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}
