//! Tool invocation notifications
//!
//! Observers see every tool call a turn makes, successful or not. They are
//! called from concurrently running tool futures and must not block.

use crate::conversation::ToolCallRequest;
use crate::tools::ToolResult;

/// A tool lifecycle event
#[derive(Debug, Clone, Copy)]
pub enum ToolEvent<'a> {
    Start {
        call: &'a ToolCallRequest,
        iteration: usize,
    },
    End {
        call: &'a ToolCallRequest,
        result: &'a ToolResult,
        iteration: usize,
    },
}

impl ToolEvent<'_> {
    pub fn call(&self) -> &ToolCallRequest {
        match self {
            ToolEvent::Start { call, .. } | ToolEvent::End { call, .. } => call,
        }
    }
}

/// Receives tool start and end notifications
pub trait ToolObserver: Send + Sync {
    fn on_tool_start(&self, _call: &ToolCallRequest, _iteration: usize) {}

    fn on_tool_end(&self, _call: &ToolCallRequest, _result: &ToolResult, _iteration: usize) {}
}

/// Observer that ignores everything
pub struct NoopObserver;

impl ToolObserver for NoopObserver {}

/// Wrapper to implement ToolObserver for closures
pub struct FnObserver<F> {
    func: F,
}

impl<F> ToolObserver for FnObserver<F>
where
    F: Fn(ToolEvent<'_>) + Send + Sync,
{
    fn on_tool_start(&self, call: &ToolCallRequest, iteration: usize) {
        (self.func)(ToolEvent::Start { call, iteration });
    }

    fn on_tool_end(&self, call: &ToolCallRequest, result: &ToolResult, iteration: usize) {
        (self.func)(ToolEvent::End {
            call,
            result,
            iteration,
        });
    }
}

/// Create an observer from a closure
///
/// ```ignore
/// let observer = observer_fn(|event| {
///     if let ToolEvent::End { call, result, .. } = event {
///         println!("{} -> {}", call.name, result.success);
///     }
/// });
/// ```
pub fn observer_fn<F>(func: F) -> FnObserver<F>
where
    F: Fn(ToolEvent<'_>) + Send + Sync,
{
    FnObserver { func }
}
