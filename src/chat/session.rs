//! Bounded conversation history for one subject.

use std::collections::VecDeque;

use uuid::Uuid;

use crate::types::ConversationMessage;

/// User/assistant history with FIFO eviction.
///
/// Only complete exchanges are ever stored, and eviction always removes the
/// oldest pair, so the history never starts with an orphaned assistant reply.
/// The system prompt is never stored here.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    session_id: String,
    history: VecDeque<ConversationMessage>,
    max_history: usize,
}

impl ConversationSession {
    /// Create an empty session holding at most `max_history` messages.
    ///
    /// An odd cap is rounded down so that pairs are never split.
    pub fn new(max_history: usize) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            history: VecDeque::new(),
            max_history: max_history - max_history % 2,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn history(&self) -> impl Iterator<Item = &ConversationMessage> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Completed user/assistant exchanges currently held.
    pub fn exchange_count(&self) -> usize {
        self.history.len() / 2
    }

    /// Rough token count: serialized history length divided by four.
    pub fn estimated_tokens(&self) -> usize {
        match serde_json::to_string(&self.history) {
            Ok(json) => json.len() / 4,
            Err(e) => {
                log::warn!("Could not serialize history for token estimate: {}", e);
                0
            }
        }
    }

    /// The model input for a new turn: system prompt, history, new message.
    pub fn build_messages(&self, system_prompt: &str, message: &str) -> Vec<ConversationMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ConversationMessage::system(system_prompt));
        messages.extend(self.history.iter().cloned());
        messages.push(ConversationMessage::user(message));
        messages
    }

    /// Append one exchange and evict the oldest pairs beyond the cap.
    pub fn record_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.history.push_back(ConversationMessage::user(user));
        self.history.push_back(ConversationMessage::assistant(assistant));

        while self.history.len() > self.max_history {
            self.history.pop_front();
            self.history.pop_front();
        }
    }

    /// Drop all history and start a new session identifier.
    pub fn clear(&mut self) {
        self.history.clear();
        self.session_id = Uuid::new_v4().to_string();
        log::info!("Conversation cleared. New session id: {}", self.session_id);
    }
}
