use std::collections::VecDeque;

use crate::llm_client::ChatMessage;

/// Maximum number of messages replayed to the model (five exchanges).
pub const MAX_HISTORY_MESSAGES: usize = 10;

/// Rolling record of completed user/assistant exchanges.
///
/// Messages only enter in (user, assistant) pairs and leave from the front
/// in pairs, so the length is always even and never above the capacity.
#[derive(Debug, Clone)]
pub struct History {
    messages: VecDeque<ChatMessage>,
    capacity: usize,
}

impl History {
    pub fn new() -> Self {
        Self::with_capacity(MAX_HISTORY_MESSAGES)
    }

    /// `capacity` is rounded down to an even number of messages, minimum one exchange.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = (capacity - capacity % 2).max(2);
        Self {
            messages: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push_exchange(&mut self, user: &str, assistant: &str) {
        while self.messages.len() + 2 > self.capacity {
            self.messages.pop_front();
            self.messages.pop_front();
        }
        self.messages.push_back(ChatMessage::user(user));
        self.messages.push_back(ChatMessage::assistant(assistant));
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    #[cfg(test)]
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}
