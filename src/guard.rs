//! Pre-turn prompt guard
//!
//! Short-circuits a turn before any model or tool call when the prompt is
//! empty or describes an emergency. Emergencies get a fixed reply directing
//! the user to emergency services.

use regex::{Regex, RegexBuilder};

use crate::core::{AgentError, AgentResult};

pub const EMPTY_PROMPT_REPLY: &str = "Please provide a message.";
pub const EMERGENCY_REPLY: &str = "Call 911 now.";

pub const EMERGENCY_PATTERN: &str = r"(heart attack|gun|shots fired|fire in (my|the)|unconscious|not breathing|domestic violence|break[- ]?in|armed|stabbed|car crash with injuries)";

/// What to do with an incoming prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Run the turn with the trimmed prompt
    Proceed(String),
    /// Answer immediately with this text
    Reply(String),
}

#[derive(Debug, Clone)]
pub struct PromptGuard {
    emergency: Regex,
    empty_reply: String,
    emergency_reply: String,
}

impl PromptGuard {
    /// Guard with the built-in emergency pattern
    pub fn new() -> AgentResult<Self> {
        Self::with_pattern(EMERGENCY_PATTERN)
    }

    /// Guard with a custom case-insensitive emergency pattern
    pub fn with_pattern(pattern: &str) -> AgentResult<Self> {
        let emergency = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| AgentError::InvalidConfig(format!("invalid emergency pattern: {}", e)))?;

        Ok(Self {
            emergency,
            empty_reply: EMPTY_PROMPT_REPLY.to_string(),
            emergency_reply: EMERGENCY_REPLY.to_string(),
        })
    }

    pub fn with_empty_reply(mut self, reply: impl Into<String>) -> Self {
        self.empty_reply = reply.into();
        self
    }

    pub fn with_emergency_reply(mut self, reply: impl Into<String>) -> Self {
        self.emergency_reply = reply.into();
        self
    }

    pub fn is_emergency(&self, text: &str) -> bool {
        self.emergency.is_match(text)
    }

    pub fn check(&self, prompt: &str) -> GuardDecision {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            tracing::info!("[PromptGuard] Empty prompt");
            return GuardDecision::Reply(self.empty_reply.clone());
        }
        if self.is_emergency(prompt) {
            tracing::warn!("[PromptGuard] Emergency detected, skipping model");
            return GuardDecision::Reply(self.emergency_reply.clone());
        }
        GuardDecision::Proceed(prompt.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_prompt() {
        let guard = PromptGuard::new().unwrap();
        assert_eq!(guard.check("   "), GuardDecision::Reply(EMPTY_PROMPT_REPLY.into()));
    }

    #[test]
    fn test_emergencies() {
        let guard = PromptGuard::new().unwrap();
        for prompt in [
            "I think my dad is having a HEART ATTACK",
            "there is a fire in my kitchen",
            "someone attempted a break-in next door",
            "my neighbour is not breathing",
        ] {
            assert_eq!(
                guard.check(prompt),
                GuardDecision::Reply(EMERGENCY_REPLY.into()),
                "{}",
                prompt
            );
        }
    }

    #[test]
    fn test_ordinary_prompt_proceeds_trimmed() {
        let guard = PromptGuard::new().unwrap();
        assert_eq!(
            guard.check("  pothole on Main St  "),
            GuardDecision::Proceed("pothole on Main St".into())
        );
    }

    #[test]
    fn test_custom_pattern_and_reply() {
        let guard = PromptGuard::with_pattern("flood")
            .unwrap()
            .with_emergency_reply("Call 112.");
        assert_eq!(guard.check("Flood in the basement"), GuardDecision::Reply("Call 112.".into()));
        assert!(PromptGuard::with_pattern("(unclosed").is_err());
    }
}
