//! Protocol client.
//!
//! The client walks the server's prompt sequence for each command and turns
//! the reply lines into typed outcomes.

use bytes::BytesMut;
use thiserror::Error;
use tidepool_protocol::command::{CONSUME, PUBLISH};
use tidepool_protocol::response::{
    CONTENT_PROMPT, INVALID_TOPIC_NAME, PUBLISHED, TOPIC_NOT_FOUND, TOPIC_PROMPT,
};
use tidepool_protocol::{encode_line, END_OF_MESSAGES, MAX_LINE_LENGTH};
use tidepool_transport::{Connection, LineConnection, TransportError};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, trace};

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Could not reach the server.
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        /// Server address.
        addr: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The server closed the connection.
    #[error("Connection closed by server")]
    ConnectionClosed,

    /// The server replied with something outside the protocol.
    #[error("Unexpected response: expected {expected:?}, got {got:?}")]
    UnexpectedResponse {
        /// What the protocol calls for at this point.
        expected: &'static str,
        /// What arrived.
        got: String,
    },

    /// A value cannot be sent as a single line.
    #[error("Invalid input: {0}")]
    InvalidInput(&'static str),

    /// Transport failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result of a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The message was stored.
    Published,
    /// The server rejected the topic name.
    InvalidTopicName,
}

/// Result of a consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// Every message stored under the topic, oldest first.
    Messages(Vec<String>),
    /// The topic has never been published to.
    TopicNotFound,
}

/// A connection to a tidepool server.
pub struct Client<S = TcpStream> {
    conn: LineConnection<S>,
}

impl Client<TcpStream> {
    /// Connect to a server.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        let peer = stream.peer_addr().ok();
        debug!("Connected to {}", addr);

        Ok(Self {
            conn: LineConnection::new(stream, peer, MAX_LINE_LENGTH),
        })
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + Sync,
{
    /// Use an already connected stream.
    #[must_use]
    pub fn from_stream(stream: S) -> Self {
        Self {
            conn: LineConnection::new(stream, None, MAX_LINE_LENGTH),
        }
    }

    /// Publish one message.
    ///
    /// # Errors
    ///
    /// Returns an error if a value contains a line break, the connection
    /// fails, or the server strays from the protocol.
    pub async fn publish(
        &mut self,
        topic: &str,
        content: &str,
    ) -> Result<PublishOutcome, ClientError> {
        ensure_single_line(topic)?;
        ensure_single_line(content)?;

        self.send_line(PUBLISH).await?;
        self.expect(TOPIC_PROMPT).await?;
        self.send_line(topic).await?;

        let reply = self.read_line().await?;
        if reply == INVALID_TOPIC_NAME {
            return Ok(PublishOutcome::InvalidTopicName);
        }
        if reply != CONTENT_PROMPT {
            return Err(ClientError::UnexpectedResponse {
                expected: CONTENT_PROMPT,
                got: reply,
            });
        }

        self.send_line(content).await?;
        self.expect(PUBLISHED).await?;
        Ok(PublishOutcome::Published)
    }

    /// Fetch every message stored under a topic.
    ///
    /// A topic whose first message is literally `Topic not found.` cannot be
    /// told apart from a missing topic; the protocol has no escape for it.
    ///
    /// # Errors
    ///
    /// Returns an error if the topic contains a line break, the connection
    /// fails, or the listing is malformed.
    pub async fn consume(&mut self, topic: &str) -> Result<ConsumeOutcome, ClientError> {
        ensure_single_line(topic)?;

        self.send_line(CONSUME).await?;
        self.expect(TOPIC_PROMPT).await?;
        self.send_line(topic).await?;

        let first = self.read_line().await?;
        if first == TOPIC_NOT_FOUND {
            return Ok(ConsumeOutcome::TopicNotFound);
        }

        let mut lines = vec![first];
        loop {
            let line = self.read_line().await?;
            if line == END_OF_MESSAGES && lines.last().is_some_and(String::is_empty) {
                break;
            }
            lines.push(line);
        }

        // Drop the blank separator before the sentinel.
        lines.pop();
        Ok(ConsumeOutcome::Messages(lines))
    }

    /// Send a raw command token and return the first reply line.
    ///
    /// # Errors
    ///
    /// Returns an error if the token contains a line break or the connection
    /// fails.
    pub async fn send_command(&mut self, token: &str) -> Result<String, ClientError> {
        ensure_single_line(token)?;
        self.send_line(token).await?;
        self.read_line().await
    }

    /// Close the connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the shutdown fails.
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.conn.close().await?;
        Ok(())
    }

    async fn send_line(&mut self, line: &str) -> Result<(), ClientError> {
        let mut buf = BytesMut::with_capacity(line.len() + 1);
        encode_line(line, &mut buf);
        trace!(line = %line, "Sending line");
        self.conn.send_raw(buf.freeze()).await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String, ClientError> {
        self.conn
            .recv_line()
            .await?
            .ok_or(ClientError::ConnectionClosed)
    }

    async fn expect(&mut self, expected: &'static str) -> Result<(), ClientError> {
        let got = self.read_line().await?;
        if got != expected {
            return Err(ClientError::UnexpectedResponse { expected, got });
        }
        Ok(())
    }
}

fn ensure_single_line(value: &str) -> Result<(), ClientError> {
    if value.contains('\n') || value.contains('\r') {
        return Err(ClientError::InvalidInput("value must not contain line breaks"));
    }
    Ok(())
}
