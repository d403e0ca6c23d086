//! Topic abstraction for tidepool.
//!
//! A topic is a named, append-only log of messages. Appends and full reads
//! take the same per-topic lock, so a reader never observes a half-finished
//! append and two appends never interleave.

use crate::message::Message;
use parking_lot::Mutex;
use tracing::trace;

/// A topic identifier.
pub type TopicName = String;

/// An append-only, ordered message log.
#[derive(Debug)]
pub struct Topic {
    /// Topic name.
    name: TopicName,
    /// Messages in arrival order.
    messages: Mutex<Vec<Message>>,
}

impl Topic {
    /// Create a new, empty topic.
    #[must_use]
    pub fn new(name: impl Into<TopicName>) -> Self {
        Self {
            name: name.into(),
            messages: Mutex::new(Vec::new()),
        }
    }

    /// Get the topic name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a message to the end of the log.
    ///
    /// Returns the zero-based position of the appended message.
    pub fn append(&self, message: Message) -> usize {
        let mut messages = self.messages.lock();
        messages.push(message);
        let position = messages.len() - 1;
        trace!(topic = %self.name, position, "Appended message");
        position
    }

    /// Copy out every stored message in arrival order.
    ///
    /// Nothing is consumed: repeated calls return the same, possibly
    /// longer, history.
    #[must_use]
    pub fn snapshot_all(&self) -> Vec<Message> {
        self.messages.lock().clone()
    }

    /// Get the number of stored messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    /// Check if the topic holds no messages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_topic_creation() {
        let topic = Topic::new("orders");
        assert_eq!(topic.name(), "orders");
        assert!(topic.is_empty());
        assert!(topic.snapshot_all().is_empty());
    }

    #[test]
    fn test_append_preserves_order() {
        let topic = Topic::new("orders");
        assert_eq!(topic.append(Message::new("m1")), 0);
        assert_eq!(topic.append(Message::new("m2")), 1);
        assert_eq!(topic.append(Message::new("m1")), 2);

        let contents: Vec<_> = topic
            .snapshot_all()
            .into_iter()
            .map(Message::into_content)
            .collect();
        assert_eq!(contents, vec!["m1", "m2", "m1"]);
    }

    #[test]
    fn test_snapshot_is_repeatable() {
        let topic = Topic::new("orders");
        topic.append(Message::new("urgent"));

        let first = topic.snapshot_all();
        let second = topic.snapshot_all();
        assert_eq!(first, second);

        topic.append(Message::new("rush"));
        let third = topic.snapshot_all();
        assert_eq!(third.len(), 2);
        assert_eq!(&third[..1], &first[..]);
    }

    #[test]
    fn test_concurrent_appends_are_not_lost() {
        let topic = Arc::new(Topic::new("load"));
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let topic = Arc::clone(&topic);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        topic.append(Message::new(format!("{t}-{i}")));
                    }
                })
            })
            .collect();
        for handle in threads {
            handle.join().unwrap();
        }

        let snapshot = topic.snapshot_all();
        assert_eq!(snapshot.len(), 2000);

        // Per-writer order survives interleaving.
        for t in 0..8 {
            let prefix = format!("{t}-");
            let own: Vec<_> = snapshot
                .iter()
                .filter(|m| m.content().starts_with(&prefix))
                .map(|m| m.content().to_string())
                .collect();
            let expected: Vec<_> = (0..250).map(|i| format!("{t}-{i}")).collect();
            assert_eq!(own, expected);
        }
    }
}
