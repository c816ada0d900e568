//! Core types for the agent
//!
//! - `AgentError` - Error taxonomy shared by every component
//! - `AgentResult` - Result alias

pub mod error;

pub use error::{AgentError, AgentResult};
