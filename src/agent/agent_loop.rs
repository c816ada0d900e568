//! Agent loop
//!
//! Runs one turn: seeds the conversation, steps the routing graph until the
//! model answers without tool calls, and caps the number of tool-call rounds.
//!
//! ```ignore
//! let agent = AgentLoop::new(Arc::new(AnthropicClient::from_env()?), Arc::new(registry))
//!     .with_config(AgentConfig::new("You are CityAssist").with_max_iterations(5))
//!     .with_observer(Arc::new(TraceRecorder::create("trace.jsonl")?));
//!
//! let outcome = agent.run_prompt("Where is my ticket 6e63bbbe?").await?;
//! println!("{}", outcome.final_text);
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use super::config::AgentConfig;
use super::observer::ToolObserver;
use super::state::{AgentState, ToolTraceEntry};
use crate::conversation::{Conversation, Message};
use crate::core::{AgentError, AgentResult};
use crate::graph::{RouteState, RoutingGraph, StepContext};
use crate::guard::{GuardDecision, PromptGuard};
use crate::llm::ModelClient;
use crate::tools::ToolRegistry;

/// Final text of a truncated turn when the model never produced any
pub const TRUNCATED_FALLBACK_TEXT: &str =
    "I could not finish this request within the allowed number of tool calls. Please try again with a more specific question.";

/// Final text when the model concludes with an empty answer
pub const EMPTY_ANSWER_TEXT: &str = "Sorry, I didn't catch that.";

/// Input of one turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnRequest {
    pub prompt: String,
    /// Overrides the configured system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Overrides the configured iteration cap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_iterations: Option<usize>,
}

impl TurnRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    /// Build a request from an invocation payload
    ///
    /// The prompt is read from `prompt`, `inputText` or `message`, in that
    /// order. A missing prompt yields an empty one, which the prompt guard
    /// answers.
    pub fn from_payload(payload: &Value) -> AgentResult<Self> {
        let Value::Object(fields) = payload else {
            return Err(AgentError::InvalidConfig(format!(
                "turn payload must be a JSON object, got {}",
                payload
            )));
        };

        let prompt = ["prompt", "inputText", "message"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();

        let system_prompt = fields
            .get("system_prompt")
            .and_then(Value::as_str)
            .map(str::to_string);

        let max_iterations = match fields.get("max_iterations") {
            None | Some(Value::Null) => None,
            Some(value) => Some(
                value
                    .as_u64()
                    .and_then(|n| usize::try_from(n).ok())
                    .ok_or_else(|| {
                        AgentError::InvalidConfig(format!(
                            "max_iterations must be a non-negative integer, got {}",
                            value
                        ))
                    })?,
            ),
        };

        Ok(Self {
            prompt,
            system_prompt,
            max_iterations,
        })
    }
}

/// Result of one turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub final_text: String,
    /// The turn hit the iteration cap instead of concluding
    pub truncated: bool,
    /// Why the turn was truncated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncation_reason: Option<String>,
    /// Tool-call rounds executed
    pub iterations: usize,
    pub tool_trace: Vec<ToolTraceEntry>,
    pub conversation: Conversation,
}

/// Drives turns against a model client and a tool registry
///
/// Cheap to share: concurrent turns each own their `AgentState`.
#[derive(Clone)]
pub struct AgentLoop {
    model: Arc<dyn ModelClient>,
    registry: Arc<ToolRegistry>,
    config: AgentConfig,
    observers: Vec<Arc<dyn ToolObserver>>,
    guard: Option<PromptGuard>,
    graph: RoutingGraph,
}

impl AgentLoop {
    pub fn new(model: Arc<dyn ModelClient>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            model,
            registry,
            config: AgentConfig::default(),
            observers: Vec::new(),
            guard: None,
            graph: RoutingGraph::new(),
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Add an observer notified of every tool invocation
    pub fn with_observer(mut self, observer: Arc<dyn ToolObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Screen prompts before any model call
    pub fn with_guard(mut self, guard: PromptGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run a turn with the configured defaults
    pub async fn run_prompt(&self, prompt: impl Into<String>) -> AgentResult<TurnOutcome> {
        self.run(TurnRequest::new(prompt)).await
    }

    /// Run one turn
    ///
    /// Returns `Err` only for model failures that outlast the retry policy
    /// and for setup errors. Tool failures are handed back to the model.
    pub async fn run(&self, request: TurnRequest) -> AgentResult<TurnOutcome> {
        let turn_id = Uuid::new_v4();
        let span = tracing::info_span!("turn", %turn_id, model = %self.model.model());
        self.run_turn(request).instrument(span).await
    }

    async fn run_turn(&self, request: TurnRequest) -> AgentResult<TurnOutcome> {
        self.config.validate()?;

        let system_prompt = request
            .system_prompt
            .unwrap_or_else(|| self.config.system_prompt.clone());
        let max_iterations = request.max_iterations.unwrap_or(self.config.max_iterations);

        let prompt = match &self.guard {
            Some(guard) => match guard.check(&request.prompt) {
                GuardDecision::Proceed(prompt) => prompt,
                GuardDecision::Reply(reply) => {
                    return guarded_outcome(&system_prompt, &request.prompt, reply);
                }
            },
            None => request.prompt,
        };

        tracing::info!(
            "[AgentLoop] Starting turn (max {} tool rounds, {} tools)",
            max_iterations,
            self.registry.len()
        );

        let mut agent = AgentState::new(Conversation::seeded(&system_prompt, &prompt));
        let ctx = StepContext {
            model: self.model.as_ref(),
            registry: &self.registry,
            observers: &self.observers,
            config: &self.config,
        };

        let mut state = RouteState::Model;
        loop {
            state = self.graph.step(state, &mut agent, &ctx).await?;

            match &state {
                RouteState::Done { text } => {
                    let final_text = if text.trim().is_empty() {
                        agent
                            .conversation
                            .last_assistant_text()
                            .unwrap_or(EMPTY_ANSWER_TEXT)
                            .to_string()
                    } else {
                        text.clone()
                    };

                    tracing::info!(
                        "[AgentLoop] Turn complete after {} tool round(s)",
                        agent.iterations
                    );
                    return Ok(outcome(agent, final_text, None));
                }
                RouteState::Tool { calls } if agent.iterations >= max_iterations => {
                    let reason = AgentError::IterationLimitExceeded { max_iterations };
                    tracing::warn!(
                        "[AgentLoop] {}; dropping {} requested call(s)",
                        reason,
                        calls.len()
                    );

                    let final_text = agent
                        .conversation
                        .last_assistant_text()
                        .unwrap_or(TRUNCATED_FALLBACK_TEXT)
                        .to_string();
                    return Ok(outcome(agent, final_text, Some(reason.to_string())));
                }
                _ => {}
            }
        }
    }
}

fn outcome(agent: AgentState, final_text: String, truncation: Option<String>) -> TurnOutcome {
    TurnOutcome {
        final_text,
        truncated: truncation.is_some(),
        truncation_reason: truncation,
        iterations: agent.iterations,
        tool_trace: agent.tool_trace,
        conversation: agent.conversation,
    }
}

fn guarded_outcome(system_prompt: &str, prompt: &str, reply: String) -> AgentResult<TurnOutcome> {
    let mut conversation = Conversation::seeded(system_prompt, prompt);
    conversation.push(Message::assistant(reply.clone()))?;
    Ok(TurnOutcome {
        final_text: reply,
        truncated: false,
        truncation_reason: None,
        iterations: 0,
        tool_trace: Vec::new(),
        conversation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::observer::{observer_fn, ToolEvent};
    use crate::conversation::{Role, ToolCallRequest};
    use crate::guard::EMERGENCY_REPLY;
    use crate::llm::{ModelResponse, RetryPolicy, ScriptedModelClient};
    use crate::tools::{ArgumentSchema, ParamType, ToolSpec};
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    fn weather_registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolSpec::from_fn(
                "weather",
                "Current temperature for a city",
                ArgumentSchema::new().required("city", ParamType::String),
                |_args| async move { Ok(json!({"temp": 72})) },
            ))
            .unwrap();
        Arc::new(registry)
    }

    fn always_calling_weather() -> ScriptedModelClient {
        ScriptedModelClient::new(vec![ModelResponse::tool_calls(
            "",
            vec![ToolCallRequest::new("call_1", "weather", json!({"city": "Austin"}))],
        )])
    }

    fn assert_no_orphans(conversation: &Conversation) {
        let mut issued = HashSet::new();
        for message in conversation.messages() {
            match message.role {
                Role::Assistant => issued.extend(message.tool_calls.iter().map(|c| c.id.clone())),
                Role::Tool => {
                    let id = message.tool_call_id.clone().unwrap();
                    assert!(issued.contains(&id), "orphan tool result {}", id);
                }
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let agent = AgentLoop::new(
            Arc::new(ScriptedModelClient::answering("4")),
            Arc::new(ToolRegistry::new()),
        );

        let outcome = agent.run_prompt("How much is 2+2?").await.unwrap();
        assert_eq!(outcome.final_text, "4");
        assert!(!outcome.truncated);
        assert!(outcome.tool_trace.is_empty());
        assert_eq!(outcome.iterations, 0);
        assert_eq!(outcome.conversation.len(), 3);
    }

    #[tokio::test]
    async fn test_weather_tool_round() {
        let model = Arc::new(ScriptedModelClient::calling_then_answering(
            "weather",
            json!({"city": "Austin"}),
            "It is 72F in Austin.",
        ));
        let agent = AgentLoop::new(model.clone(), weather_registry());

        let outcome = agent.run_prompt("Weather in Austin?").await.unwrap();
        assert_eq!(outcome.final_text, "It is 72F in Austin.");
        assert!(!outcome.truncated);
        assert_eq!(outcome.tool_trace.len(), 1);
        assert_eq!(outcome.tool_trace[0].tool, "weather");
        assert_eq!(outcome.tool_trace[0].result.payload, json!({"temp": 72}));

        // the second model call saw the tool result
        let seen = model.seen();
        assert_eq!(seen.len(), 2);
        let last = seen[1].last().unwrap();
        assert_eq!(last.role, Role::Tool);
        assert_eq!(last.content, "{\"temp\":72}");
        assert_no_orphans(&outcome.conversation);
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_abort_turn() {
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolSpec::from_fn(
                "tickets",
                "Ticket lookup",
                ArgumentSchema::new(),
                |_args| async move { Err::<Value, _>(anyhow::anyhow!("ticket store unreachable")) },
            ))
            .unwrap();

        let model = Arc::new(ScriptedModelClient::calling_then_answering(
            "tickets",
            json!({}),
            "The ticket system is down, please try later.",
        ));
        let agent = AgentLoop::new(model.clone(), Arc::new(registry));

        let outcome = agent.run_prompt("status of 6e63bbbe?").await.unwrap();
        assert!(!outcome.truncated);
        assert!(!outcome.tool_trace[0].result.success);
        assert_eq!(outcome.final_text, "The ticket system is down, please try later.");
        assert_eq!(
            model.seen()[1].last().unwrap().content,
            "Error: ticket store unreachable"
        );
    }

    #[tokio::test]
    async fn test_truncates_after_exactly_max_rounds() {
        let model = Arc::new(always_calling_weather());
        let agent = AgentLoop::new(model.clone(), weather_registry());

        let outcome = agent
            .run(TurnRequest::new("weather forever").with_max_iterations(3))
            .await
            .unwrap();

        assert!(outcome.truncated);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.tool_trace.len(), 3);
        assert_eq!(model.call_count(), 4);
        assert_eq!(outcome.final_text, TRUNCATED_FALLBACK_TEXT);
        assert!(outcome.truncation_reason.unwrap().contains("3"));
        assert_no_orphans(&outcome.conversation);
    }

    #[tokio::test]
    async fn test_truncated_keeps_partial_answer() {
        let model = ScriptedModelClient::new(vec![ModelResponse::tool_calls(
            "Still looking...",
            vec![ToolCallRequest::new("call_1", "weather", json!({"city": "Austin"}))],
        )]);
        let agent = AgentLoop::new(Arc::new(model), weather_registry())
            .with_config(AgentConfig::default().with_max_iterations(1));

        let outcome = agent.run_prompt("weather?").await.unwrap();
        assert!(outcome.truncated);
        assert_eq!(outcome.final_text, "Still looking...");
    }

    #[tokio::test]
    async fn test_zero_iterations_never_calls_tools() {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let mut registry = ToolRegistry::new();
        registry
            .register(ToolSpec::from_fn(
                "weather",
                "Current temperature",
                ArgumentSchema::new(),
                move |_args| {
                    *counter.lock().unwrap() += 1;
                    async move { Ok(json!({"temp": 72})) }
                },
            ))
            .unwrap();

        let agent = AgentLoop::new(Arc::new(always_calling_weather()), Arc::new(registry));
        let outcome = agent
            .run(TurnRequest::new("weather?").with_max_iterations(0))
            .await
            .unwrap();

        assert!(outcome.truncated);
        assert_eq!(outcome.iterations, 0);
        assert!(outcome.tool_trace.is_empty());
        assert_eq!(*calls.lock().unwrap(), 0);

        let agent = AgentLoop::new(
            Arc::new(ScriptedModelClient::answering("4")),
            weather_registry(),
        );
        let outcome = agent
            .run(TurnRequest::new("2+2?").with_max_iterations(0))
            .await
            .unwrap();
        assert!(!outcome.truncated);
        assert_eq!(outcome.final_text, "4");
    }

    #[tokio::test]
    async fn test_replay_is_deterministic() {
        let run_once = || async {
            let model = Arc::new(ScriptedModelClient::calling_then_answering(
                "weather",
                json!({"city": "Austin"}),
                "72F",
            ));
            AgentLoop::new(model, weather_registry())
                .run_prompt("weather?")
                .await
                .unwrap()
        };

        let first = run_once().await;
        let second = run_once().await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_request_overrides_system_prompt() {
        let model = Arc::new(ScriptedModelClient::answering("ok"));
        let agent = AgentLoop::new(model.clone(), Arc::new(ToolRegistry::new()));

        agent
            .run(TurnRequest::new("hi").with_system_prompt("You are CityAssist."))
            .await
            .unwrap();
        assert_eq!(model.seen()[0].system_prompt(), Some("You are CityAssist."));
    }

    #[tokio::test]
    async fn test_observer_sees_every_call() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let observer = observer_fn(move |event: ToolEvent<'_>| {
            let label = match event {
                ToolEvent::Start { call, iteration } => format!("start {} {}", call.name, iteration),
                ToolEvent::End { call, result, .. } => format!("end {} {}", call.name, result.success),
            };
            sink.lock().unwrap().push(label);
        });

        let model = Arc::new(ScriptedModelClient::calling_then_answering(
            "weather",
            json!({"city": "Austin"}),
            "72F",
        ));
        let agent = AgentLoop::new(model, weather_registry()).with_observer(Arc::new(observer));
        agent.run_prompt("weather?").await.unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec!["start weather 0".to_string(), "end weather true".to_string()]
        );
    }

    #[tokio::test]
    async fn test_model_failure_surfaces_after_retries() {
        let model = ScriptedModelClient::with_steps(vec![
            Err(AgentError::model_unavailable("connection refused")),
            Err(AgentError::model_unavailable("connection refused")),
            Ok(ModelResponse::text("never reached")),
        ]);
        let agent = AgentLoop::new(Arc::new(model), Arc::new(ToolRegistry::new())).with_config(
            AgentConfig::default().with_retry_policy(RetryPolicy::default().with_max_retries(1)),
        );

        let err = tokio::time::timeout(Duration::from_secs(10), agent.run_prompt("hi"))
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, AgentError::ModelUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_guard_short_circuits() {
        let model = Arc::new(ScriptedModelClient::answering("unused"));
        let agent = AgentLoop::new(model.clone(), Arc::new(ToolRegistry::new()))
            .with_guard(PromptGuard::new().unwrap());

        let outcome = agent.run_prompt("shots fired on 5th street").await.unwrap();
        assert_eq!(outcome.final_text, EMERGENCY_REPLY);
        assert_eq!(model.call_count(), 0);
    }

    #[test]
    fn test_request_from_payload() {
        let request = TurnRequest::from_payload(&json!({
            "inputText": "Where is my ticket?",
            "system_prompt": "You are CityAssist",
            "max_iterations": 2
        }))
        .unwrap();
        assert_eq!(
            request,
            TurnRequest::new("Where is my ticket?")
                .with_system_prompt("You are CityAssist")
                .with_max_iterations(2)
        );

        let request = TurnRequest::from_payload(&json!({"message": "hi", "prompt": "hello"})).unwrap();
        assert_eq!(request.prompt, "hello");

        let request = TurnRequest::from_payload(&json!({})).unwrap();
        assert_eq!(request.prompt, "");

        assert!(TurnRequest::from_payload(&json!("hello")).is_err());
        assert!(TurnRequest::from_payload(&json!({"prompt": "x", "max_iterations": -1})).is_err());
    }
}
