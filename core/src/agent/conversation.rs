use crate::traits::ChatMessage;
use serde::{Deserialize, Serialize};
use std::ops::AddAssign;
use uuid::Uuid;

/// Token counts summed over every LLM call of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageTally {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl UsageTally {
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    pub fn is_empty(&self) -> bool {
        self.total_tokens() == 0
    }

    /// Tokens spent after `earlier` was taken from the same tally.
    pub fn since(&self, earlier: &UsageTally) -> UsageTally {
        UsageTally::new(
            self.prompt_tokens.saturating_sub(earlier.prompt_tokens),
            self.completion_tokens.saturating_sub(earlier.completion_tokens),
        )
    }
}

impl AddAssign for UsageTally {
    fn add_assign(&mut self, other: Self) {
        self.prompt_tokens = self.prompt_tokens.saturating_add(other.prompt_tokens);
        self.completion_tokens = self
            .completion_tokens
            .saturating_add(other.completion_tokens);
    }
}

/// Message history and token tally for one logical session. History is
/// append-only; the only way to drop messages is [`ConversationState::reset`].
#[derive(Debug, Clone)]
pub struct ConversationState {
    session_id: Uuid,
    messages: Vec<ChatMessage>,
    usage: UsageTally,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationState {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            messages: Vec::new(),
            usage: UsageTally::default(),
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn snapshot(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn record_usage(&mut self, prompt_tokens: u64, completion_tokens: u64) {
        self.usage += UsageTally::new(prompt_tokens, completion_tokens);
    }

    pub fn usage(&self) -> UsageTally {
        self.usage
    }

    pub fn reset(&mut self) {
        self.messages.clear();
        self.usage = UsageTally::default();
        self.session_id = Uuid::new_v4();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_order() {
        let mut conversation = ConversationState::new();
        conversation.append(ChatMessage::system("sys"));
        conversation.append(ChatMessage::user("¿Cuántos estudios hay?"));
        conversation.append(ChatMessage::assistant("Hay 21."));

        let roles: Vec<&str> = conversation
            .snapshot()
            .iter()
            .map(|m| m.role.as_str())
            .collect();
        assert_eq!(roles, vec!["system", "user", "assistant"]);
    }

    #[test]
    fn usage_accumulates_additively() {
        let mut conversation = ConversationState::new();
        conversation.record_usage(100, 20);
        conversation.record_usage(250, 5);
        assert_eq!(conversation.usage(), UsageTally::new(350, 25));
        assert_eq!(conversation.usage().total_tokens(), 375);
    }

    #[test]
    fn since_is_the_turn_delta() {
        let before = UsageTally::new(100, 10);
        let after = UsageTally::new(250, 14);
        assert_eq!(after.since(&before), UsageTally::new(150, 4));
        assert_eq!(before.since(&after), UsageTally::default());
    }

    #[test]
    fn reset_clears_history_tally_and_session() {
        let mut conversation = ConversationState::new();
        let before = conversation.session_id();
        conversation.append(ChatMessage::user("hola"));
        conversation.record_usage(10, 10);

        conversation.reset();

        assert!(conversation.is_empty());
        assert!(conversation.usage().is_empty());
        assert_ne!(conversation.session_id(), before);
    }
}
