//! The MODEL / TOOL / DONE state machine
//!
//! ```text
//!            tool calls
//!   MODEL ───────────────► TOOL
//!     │  ◄─────────────────┘
//!     │ final text
//!     ▼
//!   DONE
//! ```
//!
//! `step` is a pure transition function over an `AgentState`; the graph
//! itself holds nothing mutable. TOOL always returns to MODEL, so a turn can
//! only finish on a model response without tool calls (or be cut off by the
//! agent loop's iteration cap).

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;

use super::router::{route, Route};
use crate::agent::{AgentConfig, AgentState, ToolObserver, ToolTraceEntry};
use crate::conversation::{generate_call_id, Message, ToolCallRequest};
use crate::core::{AgentError, AgentResult};
use crate::llm::{ModelClient, ModelResponse};
use crate::tools::{ToolRegistry, ToolResult};

/// Current node of the routing graph
#[derive(Debug, Clone, PartialEq)]
pub enum RouteState {
    /// Call the model with the current history (initial state)
    Model,
    /// Execute the calls requested by the last assistant message
    Tool { calls: Vec<ToolCallRequest> },
    /// The model produced its final answer
    Done { text: String },
}

impl RouteState {
    pub fn name(&self) -> &'static str {
        match self {
            RouteState::Model => "MODEL",
            RouteState::Tool { .. } => "TOOL",
            RouteState::Done { .. } => "DONE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RouteState::Done { .. })
    }
}

/// Everything a step may use besides the turn state
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    pub model: &'a dyn ModelClient,
    pub registry: &'a ToolRegistry,
    pub observers: &'a [Arc<dyn ToolObserver>],
    pub config: &'a AgentConfig,
}

/// Stateless transition function of the agent loop
#[derive(Debug, Clone, Copy, Default)]
pub struct RoutingGraph;

impl RoutingGraph {
    pub fn new() -> Self {
        Self
    }

    /// Apply one transition
    ///
    /// - `Model` calls the model and appends its reply, then moves to `Tool`
    ///   or `Done`
    /// - `Tool` executes every call, appends one tool message per call in
    ///   request order, counts the round and moves back to `Model`
    /// - `Done` is terminal; stepping it fails with `InvalidTransition`
    pub async fn step(
        &self,
        state: RouteState,
        agent: &mut AgentState,
        ctx: &StepContext<'_>,
    ) -> AgentResult<RouteState> {
        tracing::debug!(
            "[RoutingGraph] Step from {} (iteration {}, {} messages)",
            state.name(),
            agent.iterations,
            agent.conversation.len()
        );

        match state {
            RouteState::Model => self.model_node(agent, ctx).await,
            RouteState::Tool { calls } => self.tool_node(calls, agent, ctx).await,
            RouteState::Done { .. } => Err(AgentError::InvalidTransition(
                "DONE is terminal".to_string(),
            )),
        }
    }

    async fn model_node(
        &self,
        agent: &mut AgentState,
        ctx: &StepContext<'_>,
    ) -> AgentResult<RouteState> {
        let summaries = ctx.registry.summaries();
        let tools = summaries.as_slice();
        let conversation = &agent.conversation;
        let model = ctx.model;
        let timeout = ctx.config.model_timeout;

        let result = ctx
            .config
            .retry_policy
            .retry("model call", || async move {
                match tokio::time::timeout(timeout, model.complete(conversation, tools)).await {
                    Ok(response) => response,
                    Err(_) => Err(AgentError::model_unavailable(format!(
                        "model call timed out after {}s",
                        timeout.as_secs_f64()
                    ))),
                }
            })
            .await;

        let response = match result {
            Ok(response) => with_unique_call_ids(response),
            Err(e) => {
                tracing::error!(
                    "[RoutingGraph] Model call failed at iteration {} (last message index {}): {}",
                    agent.iterations,
                    agent.conversation.len().saturating_sub(1),
                    e
                );
                return Err(e);
            }
        };

        let next = match route(&response) {
            Route::Tools => RouteState::Tool {
                calls: response.calls().to_vec(),
            },
            Route::Finish => RouteState::Done {
                text: response.content().to_string(),
            },
        };

        agent.conversation.push(response.message)?;

        tracing::debug!("[RoutingGraph] MODEL -> {}", next.name());
        Ok(next)
    }

    async fn tool_node(
        &self,
        calls: Vec<ToolCallRequest>,
        agent: &mut AgentState,
        ctx: &StepContext<'_>,
    ) -> AgentResult<RouteState> {
        let iteration = agent.iterations;

        tracing::info!(
            "[RoutingGraph] Executing {} tool call(s) in round {}",
            calls.len(),
            iteration + 1
        );

        let outcomes: Vec<(ToolCallRequest, ToolResult)> = if ctx.config.parallel_tools {
            join_all(calls.into_iter().map(|call| execute_call(call, iteration, ctx))).await
        } else {
            let mut outcomes = Vec::with_capacity(calls.len());
            for call in calls {
                outcomes.push(execute_call(call, iteration, ctx).await);
            }
            outcomes
        };

        for (call, result) in outcomes {
            agent.conversation.push(
                Message::tool(&call.id, &call.name, result.content_for_model())
                    .with_error(!result.success),
            )?;
            agent.tool_trace.push(ToolTraceEntry {
                tool: call.name,
                call_id: call.id,
                arguments: call.arguments,
                result,
            });
        }

        agent.iterations += 1;

        tracing::debug!("[RoutingGraph] TOOL -> MODEL");
        Ok(RouteState::Model)
    }
}

/// Run one call, turning registry errors into failed results
async fn execute_call(
    call: ToolCallRequest,
    iteration: usize,
    ctx: &StepContext<'_>,
) -> (ToolCallRequest, ToolResult) {
    for observer in ctx.observers {
        observer.on_tool_start(&call, iteration);
    }

    let result = match ctx.registry.invoke(&call).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(
                "[RoutingGraph] Tool call {} ({}) rejected: {}",
                call.id,
                call.name,
                e
            );
            ToolResult::failure(&call.name, &call.id, e.to_string())
        }
    };

    for observer in ctx.observers {
        observer.on_tool_end(&call, &result, iteration);
    }

    (call, result)
}

/// Replace missing or repeated call ids so every tool message has one answer slot
fn with_unique_call_ids(mut response: ModelResponse) -> ModelResponse {
    let mut seen = HashSet::new();
    for call in response.message.tool_calls.iter_mut() {
        if call.id.is_empty() || seen.contains(&call.id) {
            let fresh = generate_call_id();
            tracing::warn!(
                "[RoutingGraph] Reassigning call id '{}' for {} to {}",
                call.id,
                call.name,
                fresh
            );
            call.id = fresh;
        }
        seen.insert(call.id.clone());
    }
    response
}
