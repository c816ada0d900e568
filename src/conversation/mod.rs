//! Conversation history
//!
//! - `Message` / `Role` - One entry of the history
//! - `ToolCallRequest` - A tool invocation requested by the model
//! - `Conversation` - Append-only history that rejects orphaned tool results

mod conversation;
mod message;

pub use conversation::Conversation;
pub use message::{generate_call_id, Message, Role, ToolCallRequest};
