//! Ordered chat transcript shared by the onboarding flow and the reasoning
//! sub-session.

use jobtrack_protocol::{new_id, ChatMessage, Sender};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message and return its id.
    pub fn push(&mut self, sender: Sender, text: impl Into<String>, now: &str) -> String {
        let id = new_id();
        self.messages.push(ChatMessage {
            id: id.clone(),
            sender,
            text: text.into(),
            timestamp: now.to_string(),
        });
        id
    }

    /// Rewrite the text of the newest message matching `predicate`.
    ///
    /// Entries are otherwise immutable; this exists for the reasoning
    /// placeholder that streams intermediate steps.
    pub fn update_last_where<F>(&mut self, predicate: F, text: impl Into<String>) -> bool
    where
        F: Fn(&ChatMessage) -> bool,
    {
        match self.messages.iter_mut().rev().find(|m| predicate(m)) {
            Some(message) => {
                message.text = text.into();
                true
            }
            None => false,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_preserves_order_and_assigns_unique_ids() {
        let mut transcript = Transcript::new();
        let first = transcript.push(Sender::Ai, "hello", "1Z");
        let second = transcript.push(Sender::User, "hi", "2Z");

        assert_ne!(first, second);
        let texts: Vec<_> = transcript.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["hello", "hi"]);
        assert_eq!(transcript.messages()[1].timestamp, "2Z");
    }

    #[test]
    fn update_last_where_touches_only_newest_match() {
        let mut transcript = Transcript::new();
        transcript.push(Sender::System, "thinking A", "1Z");
        transcript.push(Sender::System, "thinking B", "2Z");
        transcript.push(Sender::Ai, "answer", "3Z");

        let updated =
            transcript.update_last_where(|m| m.text.starts_with("thinking"), "step 1");

        assert!(updated);
        assert_eq!(transcript.messages()[0].text, "thinking A");
        assert_eq!(transcript.messages()[1].text, "step 1");
        assert_eq!(transcript.len(), 3);
    }

    #[test]
    fn update_without_match_is_a_no_op() {
        let mut transcript = Transcript::new();
        transcript.push(Sender::Ai, "hello", "1Z");
        assert!(!transcript.update_last_where(|m| m.sender == Sender::System, "x"));
        assert_eq!(transcript.messages()[0].text, "hello");
    }
}
