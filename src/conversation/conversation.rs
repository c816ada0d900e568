use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::message::{Message, Role};
use crate::core::{AgentError, AgentResult};

/// Ordered, append-only message history for one turn
///
/// Every `tool` message must answer a tool-call-id issued by a preceding
/// assistant message, and each id is answered at most once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Create an empty conversation
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a conversation with a system prompt and a user prompt
    pub fn seeded(system_prompt: &str, prompt: &str) -> Self {
        Self {
            messages: vec![Message::system(system_prompt), Message::user(prompt)],
        }
    }

    /// Rebuild a conversation from stored messages, validating the invariant
    pub fn from_messages(messages: Vec<Message>) -> AgentResult<Self> {
        let mut conversation = Self::new();
        for message in messages {
            conversation.push(message)?;
        }
        Ok(conversation)
    }

    /// Append a message
    ///
    /// Fails with `OrphanToolResult` when a tool message does not reference an
    /// outstanding tool call.
    pub fn push(&mut self, message: Message) -> AgentResult<()> {
        if message.role == Role::Tool {
            let id = message
                .tool_call_id
                .as_deref()
                .ok_or_else(|| AgentError::OrphanToolResult("<missing>".to_string()))?;

            if !self.pending_call_ids().contains(id) {
                return Err(AgentError::OrphanToolResult(id.to_string()));
            }
        }

        tracing::trace!(
            "[Conversation] Appending {} message (index {})",
            message.role,
            self.messages.len()
        );
        self.messages.push(message);
        Ok(())
    }

    /// Tool-call ids issued by assistant messages that have no result yet
    pub fn pending_call_ids(&self) -> HashSet<&str> {
        let mut pending = HashSet::new();
        for message in &self.messages {
            match message.role {
                Role::Assistant => {
                    pending.extend(message.tool_calls.iter().map(|c| c.id.as_str()));
                }
                Role::Tool => {
                    if let Some(id) = message.tool_call_id.as_deref() {
                        pending.remove(id);
                    }
                }
                _ => {}
            }
        }
        pending
    }

    /// All messages in order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The most recent message
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Text of the most recent assistant message with non-empty content
    pub fn last_assistant_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
            .find(|text| !text.trim().is_empty())
    }

    /// The system prompt, if the conversation starts with one
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    /// Number of messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the conversation has no messages
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Consume the conversation and return its messages
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ToolCallRequest;
    use serde_json::json;

    fn with_weather_call() -> Conversation {
        let mut conversation = Conversation::seeded("sys", "weather in Austin?");
        conversation
            .push(Message::assistant_with_tool_calls(
                "",
                vec![ToolCallRequest::new("call_1", "weather", json!({"city": "Austin"}))],
            ))
            .unwrap();
        conversation
    }

    #[test]
    fn test_seeded_conversation() {
        let conversation = Conversation::seeded("be brief", "hi");
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.system_prompt(), Some("be brief"));
        assert_eq!(conversation.messages()[1].role, Role::User);
    }

    #[test]
    fn test_tool_message_must_reference_prior_call() {
        let mut conversation = Conversation::seeded("sys", "hi");
        let err = conversation
            .push(Message::tool("call_9", "weather", "72"))
            .unwrap_err();
        assert!(matches!(err, AgentError::OrphanToolResult(id) if id == "call_9"));
        assert_eq!(conversation.len(), 2);
    }

    #[test]
    fn test_tool_message_answers_call_once() {
        let mut conversation = with_weather_call();
        conversation
            .push(Message::tool("call_1", "weather", "72"))
            .unwrap();
        assert!(conversation.pending_call_ids().is_empty());

        let err = conversation
            .push(Message::tool("call_1", "weather", "72"))
            .unwrap_err();
        assert!(matches!(err, AgentError::OrphanToolResult(_)));
    }

    #[test]
    fn test_from_messages_validates() {
        let messages = vec![Message::user("hi"), Message::tool("call_1", "weather", "72")];
        assert!(Conversation::from_messages(messages).is_err());

        let valid = with_weather_call().into_messages();
        assert_eq!(Conversation::from_messages(valid).unwrap().len(), 3);
    }

    #[test]
    fn test_last_assistant_text_skips_empty() {
        let mut conversation = with_weather_call();
        assert_eq!(conversation.last_assistant_text(), None);
        conversation.push(Message::tool("call_1", "weather", "72")).unwrap();
        conversation.push(Message::assistant("It is 72F.")).unwrap();
        assert_eq!(conversation.last_assistant_text(), Some("It is 72F."));
    }
}
