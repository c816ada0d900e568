//! Agent loop and per-turn types

pub mod agent_loop;
pub mod config;
pub mod observer;
pub mod state;

pub use agent_loop::{AgentLoop, TurnOutcome, TurnRequest, EMPTY_ANSWER_TEXT, TRUNCATED_FALLBACK_TEXT};
pub use config::{AgentConfig, DEFAULT_MAX_ITERATIONS, DEFAULT_MODEL_TIMEOUT, DEFAULT_SYSTEM_PROMPT};
pub use observer::{observer_fn, FnObserver, NoopObserver, ToolEvent, ToolObserver};
pub use state::{AgentState, ToolTraceEntry};
