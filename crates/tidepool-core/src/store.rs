//! Topic registry.
//!
//! The store maps topic names to shared [`Topic`] handles. Topics are created
//! lazily on first publish and live for the rest of the process.

use crate::topic::{Topic, TopicName};
use dashmap::DashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Store errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Topic name is empty or whitespace only.
    #[error("Invalid topic name")]
    InvalidTopicName,

    /// Topic has never been published to.
    #[error("Topic not found: {0}")]
    TopicNotFound(String),
}

/// Validate a topic name.
///
/// # Errors
///
/// Returns [`StoreError::InvalidTopicName`] if the name is empty or consists
/// only of whitespace.
pub fn validate_topic_name(name: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::InvalidTopicName);
    }
    Ok(())
}

/// The topic registry.
///
/// Lookups and get-or-create go through the map's entry API, so concurrent
/// creators of the same unseen name all receive the one topic that was
/// inserted. The map is never exposed to callers.
#[derive(Debug, Default)]
pub struct TopicStore {
    /// Topics indexed by name.
    topics: DashMap<TopicName, Arc<Topic>>,
}

impl TopicStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        info!("Creating topic store");
        Self {
            topics: DashMap::new(),
        }
    }

    /// Look up a topic, creating it if absent.
    ///
    /// The name is used verbatim as the key; it is not trimmed.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic name is invalid.
    pub fn get_or_create(&self, name: &str) -> Result<Arc<Topic>, StoreError> {
        validate_topic_name(name)?;

        if let Some(topic) = self.topics.get(name) {
            return Ok(Arc::clone(topic.value()));
        }

        let topic = self
            .topics
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(topic = %name, "Creating new topic");
                Arc::new(Topic::new(name))
            })
            .value()
            .clone();

        Ok(topic)
    }

    /// Look up a topic without creating it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TopicNotFound`] if the topic does not exist.
    pub fn get(&self, name: &str) -> Result<Arc<Topic>, StoreError> {
        self.topics
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| StoreError::TopicNotFound(name.to_string()))
    }

    /// Check if a topic exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.topics.contains_key(name)
    }

    /// Get the number of topics.
    #[must_use]
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Get all topic names, in no particular order.
    #[must_use]
    pub fn topic_names(&self) -> Vec<TopicName> {
        self.topics.iter().map(|e| e.key().clone()).collect()
    }

    /// Get store statistics.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            topic_count: self.topics.len(),
            message_count: self.topics.iter().map(|e| e.value().len()).sum(),
        }
    }
}

/// Store statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    /// Number of topics.
    pub topic_count: usize,
    /// Total number of stored messages across all topics.
    pub message_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn test_get_or_create_returns_same_topic() {
        let store = TopicStore::new();

        let first = store.get_or_create("orders").unwrap();
        let second = store.get_or_create("orders").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.topic_count(), 1);
    }

    #[test]
    fn test_concurrent_get_or_create_creates_once() {
        let store = Arc::new(TopicStore::new());
        let barrier = Arc::new(std::sync::Barrier::new(16));

        let threads: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    store.get_or_create("contended").unwrap()
                })
            })
            .collect();

        let topics: Vec<_> = threads.into_iter().map(|h| h.join().unwrap()).collect();
        for topic in &topics[1..] {
            assert!(Arc::ptr_eq(&topics[0], topic));
        }
        assert_eq!(store.topic_count(), 1);
    }

    #[test]
    fn test_get_missing_topic() {
        let store = TopicStore::new();
        assert_eq!(
            store.get("invoices").unwrap_err(),
            StoreError::TopicNotFound("invoices".to_string())
        );
    }

    #[test]
    fn test_failed_lookup_does_not_create() {
        let store = TopicStore::new();
        assert!(store.get("ghost").is_err());
        assert!(!store.contains("ghost"));
        assert_eq!(store.topic_count(), 0);

        let topic = store.get_or_create("ghost").unwrap();
        assert!(topic.is_empty());
    }

    #[test]
    fn test_invalid_names_rejected() {
        let store = TopicStore::new();
        assert_eq!(
            store.get_or_create("").unwrap_err(),
            StoreError::InvalidTopicName
        );
        assert_eq!(
            store.get_or_create("   ").unwrap_err(),
            StoreError::InvalidTopicName
        );
        assert_eq!(
            store.get_or_create("\t").unwrap_err(),
            StoreError::InvalidTopicName
        );
        assert_eq!(store.topic_count(), 0);
    }

    #[test]
    fn test_names_are_not_trimmed() {
        let store = TopicStore::new();
        store.get_or_create(" orders").unwrap();
        assert!(store.contains(" orders"));
        assert!(!store.contains("orders"));
    }

    #[test]
    fn test_store_stats() {
        let store = TopicStore::new();
        store
            .get_or_create("orders")
            .unwrap()
            .append(Message::new("urgent"));
        let invoices = store.get_or_create("invoices").unwrap();
        invoices.append(Message::new("a"));
        invoices.append(Message::new("b"));

        let stats = store.stats();
        assert_eq!(stats.topic_count, 2);
        assert_eq!(stats.message_count, 3);

        let mut names = store.topic_names();
        names.sort();
        assert_eq!(names, vec!["invoices", "orders"]);
    }
}
