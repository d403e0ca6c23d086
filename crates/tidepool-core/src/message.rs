//! Message type stored in topics.

use std::fmt;

/// An immutable message.
///
/// Created by a publish and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Message {
    content: String,
}

impl Message {
    /// Create a new message.
    #[must_use]
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// Get the message content.
    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Get the content size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Check whether the content is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Consume the message, returning its content.
    #[must_use]
    pub fn into_content(self) -> String {
        self.content
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content)
    }
}

impl From<String> for Message {
    fn from(content: String) -> Self {
        Self { content }
    }
}

impl From<&str> for Message {
    fn from(content: &str) -> Self {
        Self::new(content)
    }
}
