//! Helpers around the agent loop

pub mod trace;

pub use trace::{EventType, TraceEvent, TraceRecorder};
