//! Append-only conversation log.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// Ordered user/assistant turns of one session. Entries are only ever
/// appended.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationLog(Vec<ChatMessage>);

impl ConversationLog {
    pub fn push(&mut self, message: ChatMessage) {
        self.0.push(message);
    }

    /// The last `k` entries in original order; the whole log when it is
    /// shorter than `k`.
    pub fn tail(&self, k: usize) -> &[ChatMessage] {
        let start = self.0.len().saturating_sub(k);
        &self.0[start..]
    }

    pub fn entries(&self) -> &[ChatMessage] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.0.last()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn log_of(n: usize) -> ConversationLog {
        let mut log = ConversationLog::default();
        for i in 0..n {
            log.push(ChatMessage::user(format!("m{i}")));
        }
        log
    }

    #[test]
    fn tail_returns_last_k_in_order() {
        let log = log_of(10);
        let tail: Vec<&str> = log.tail(3).iter().map(|m| m.content.as_str()).collect();
        assert_eq!(tail, vec!["m7", "m8", "m9"]);
    }

    #[test]
    fn tail_of_short_log_is_whole_log() {
        let log = log_of(2);
        assert_eq!(log.tail(6).len(), 2);
        assert!(ConversationLog::default().tail(6).is_empty());
    }

    #[test]
    fn serializes_as_plain_array() {
        let mut log = ConversationLog::default();
        log.push(ChatMessage::assistant("hi"));
        let v = serde_json::to_value(&log).unwrap();
        assert_eq!(v, serde_json::json!([{ "role": "assistant", "content": "hi" }]));
    }
}
