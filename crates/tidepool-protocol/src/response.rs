//! Server responses.
//!
//! Every response is one or more lines; [`Response::encode_into`] writes the
//! exact bytes a client sees.

use bytes::BytesMut;

use crate::codec::encode_line;

/// Prompt asking for the topic name.
pub const TOPIC_PROMPT: &str = "Enter topic name:";

/// Prompt asking for the message content.
pub const CONTENT_PROMPT: &str = "Enter message content:";

/// Reply to a PUBLISH with an empty or blank topic name.
pub const INVALID_TOPIC_NAME: &str = "Invalid topic name.";

/// Reply to a successful PUBLISH.
pub const PUBLISHED: &str = "Message published successfully.";

/// Reply to a CONSUME on a topic that was never published to.
pub const TOPIC_NOT_FOUND: &str = "Topic not found.";

/// Prefix of the reply to an unrecognized command.
pub const UNKNOWN_COMMAND_PREFIX: &str = "Unknown command:";

/// Sentinel line closing a CONSUME listing.
pub const END_OF_MESSAGES: &str = "END_OF_MESSAGES";

/// A response written by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `Enter topic name:`
    TopicPrompt,
    /// `Enter message content:`
    ContentPrompt,
    /// `Invalid topic name.`
    InvalidTopicName,
    /// `Message published successfully.`
    Published,
    /// `Topic not found.`
    TopicNotFound,
    /// `Unknown command: <token>`
    UnknownCommand(String),
    /// One line per message, a blank line, then `END_OF_MESSAGES`.
    Messages(Vec<String>),
}

impl Response {
    /// Encode this response into a buffer.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            Response::TopicPrompt => encode_line(TOPIC_PROMPT, buf),
            Response::ContentPrompt => encode_line(CONTENT_PROMPT, buf),
            Response::InvalidTopicName => encode_line(INVALID_TOPIC_NAME, buf),
            Response::Published => encode_line(PUBLISHED, buf),
            Response::TopicNotFound => encode_line(TOPIC_NOT_FOUND, buf),
            Response::UnknownCommand(token) => {
                encode_line(&format!("{UNKNOWN_COMMAND_PREFIX} {token}"), buf);
            }
            Response::Messages(messages) => {
                for message in messages {
                    encode_line(message, buf);
                }
                encode_line("", buf);
                encode_line(END_OF_MESSAGES, buf);
            }
        }
    }

    /// Encode this response into a fresh buffer.
    #[must_use]
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_line_responses() {
        assert_eq!(&Response::TopicPrompt.to_bytes()[..], b"Enter topic name:\n");
        assert_eq!(
            &Response::ContentPrompt.to_bytes()[..],
            b"Enter message content:\n"
        );
        assert_eq!(
            &Response::Published.to_bytes()[..],
            b"Message published successfully.\n"
        );
        assert_eq!(&Response::TopicNotFound.to_bytes()[..], b"Topic not found.\n");
        assert_eq!(
            &Response::InvalidTopicName.to_bytes()[..],
            b"Invalid topic name.\n"
        );
    }

    #[test]
    fn test_unknown_command_echoes_token() {
        let response = Response::UnknownCommand("SUBSCRIBE".to_string());
        assert_eq!(&response.to_bytes()[..], b"Unknown command: SUBSCRIBE\n");
    }

    #[test]
    fn test_messages_listing() {
        let response = Response::Messages(vec!["urgent".into(), "".into(), "rush".into()]);
        assert_eq!(
            &response.to_bytes()[..],
            b"urgent\n\nrush\n\nEND_OF_MESSAGES\n"
        );
    }

    #[test]
    fn test_empty_listing_still_terminates() {
        let response = Response::Messages(Vec::new());
        assert_eq!(&response.to_bytes()[..], b"\nEND_OF_MESSAGES\n");
    }
}
