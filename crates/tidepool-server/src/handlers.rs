//! Connection handlers for the tidepool server.
//!
//! Each connection runs the protocol state machine:
//!
//! ```text
//! AwaitingCommand ──PUBLISH──▶ Publishing ──┐
//!        ▲        ──CONSUME──▶ Consuming  ──┤
//!        └──────────────────────────────────┘
//! ```
//!
//! The loop ends when the peer closes the stream, a read or write fails,
//! shutdown is observed before dispatching a command, or force-close
//! interrupts a blocked read or write.

use crate::broker::Broker;
use crate::metrics::{self, ConnectionMetricsGuard};
use std::sync::Arc;
use std::time::Instant;
use tidepool_core::{validate_topic_name, Message, ShutdownCoordinator, StoreError, TopicStore};
use tidepool_protocol::{Command, Response};
use tidepool_transport::{Connection, TransportError};
use tracing::{debug, warn};

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer closed the stream.
    PeerClosed,
    /// Shutdown was observed while awaiting a command.
    ShutdownRequested,
    /// The drain grace period elapsed while blocked on socket I/O.
    ForceClosed,
}

/// Outcome of one read.
enum Input {
    Line(String),
    Eof,
    ForceClosed,
}

impl Input {
    fn end(&self) -> SessionEnd {
        match self {
            Input::ForceClosed => SessionEnd::ForceClosed,
            Input::Eof | Input::Line(_) => SessionEnd::PeerClosed,
        }
    }
}

/// Outcome of one command.
enum Step {
    Continue,
    Stop(SessionEnd),
}

/// Handle an accepted connection until it closes.
pub async fn handle_connection(mut conn: Box<dyn Connection>, broker: Arc<Broker>) {
    let _metrics_guard = ConnectionMetricsGuard::new();
    let connection_id = conn.id().clone();

    debug!(connection = %connection_id, remote = ?conn.remote_addr(), "Connection opened");

    match run_session(conn.as_mut(), broker.store(), broker.shutdown_coordinator()).await {
        Ok(end) => {
            debug!(connection = %connection_id, reason = ?end, "Session ended");
        }
        Err(e) => {
            // The peer is gone or misbehaving; nothing can be sent back.
            warn!(connection = %connection_id, error = %e, "Connection error");
            metrics::record_error(error_kind(&e));
        }
    }

    if let Err(e) = conn.close().await {
        debug!(connection = %connection_id, error = %e, "Close failed");
    }

    debug!(connection = %connection_id, "Connection closed");
}

/// Drive the protocol state machine over one connection.
///
/// # Errors
///
/// Returns an error if reading or writing fails, or the peer sends a
/// malformed line. Client mistakes (bad topic name, unknown topic, unknown
/// command) are answered on the wire and are not errors.
pub async fn run_session(
    conn: &mut dyn Connection,
    store: &TopicStore,
    shutdown: &ShutdownCoordinator,
) -> Result<SessionEnd, TransportError> {
    loop {
        let line = match next_input(conn, shutdown).await? {
            Input::Line(line) => line,
            other => return Ok(other.end()),
        };

        if shutdown.is_shutdown_requested() {
            debug!(connection = %conn.id(), "Shutdown requested, not dispatching");
            return Ok(SessionEnd::ShutdownRequested);
        }

        let command = Command::parse(&line);
        metrics::record_command(command.kind());
        let start = Instant::now();

        // Force-close also interrupts a write blocked on a peer that stopped
        // reading.
        let step = tokio::select! {
            biased;

            () = shutdown.force_closed() => Step::Stop(SessionEnd::ForceClosed),

            step = execute(conn, store, shutdown, command) => step?,
        };

        metrics::record_latency(start.elapsed().as_secs_f64());

        if let Step::Stop(end) = step {
            return Ok(end);
        }
    }
}

async fn execute(
    conn: &mut dyn Connection,
    store: &TopicStore,
    shutdown: &ShutdownCoordinator,
    command: Command,
) -> Result<Step, TransportError> {
    match command {
        Command::Publish => publish(conn, store, shutdown).await,
        Command::Consume => consume(conn, store, shutdown).await,
        Command::Unknown(token) => {
            debug!(connection = %conn.id(), token = %token, "Unknown command");
            conn.send(&Response::UnknownCommand(token)).await?;
            Ok(Step::Continue)
        }
    }
}

async fn publish(
    conn: &mut dyn Connection,
    store: &TopicStore,
    shutdown: &ShutdownCoordinator,
) -> Result<Step, TransportError> {
    conn.send(&Response::TopicPrompt).await?;
    let topic_name = match next_input(conn, shutdown).await? {
        Input::Line(line) => line,
        other => return Ok(Step::Stop(other.end())),
    };

    if validate_topic_name(&topic_name).is_err() {
        debug!(connection = %conn.id(), "Rejected invalid topic name");
        conn.send(&Response::InvalidTopicName).await?;
        return Ok(Step::Continue);
    }

    conn.send(&Response::ContentPrompt).await?;
    // Nothing is stored until both lines have arrived.
    let content = match next_input(conn, shutdown).await? {
        Input::Line(line) => line,
        other => return Ok(Step::Stop(other.end())),
    };

    let topic = match store.get_or_create(&topic_name) {
        Ok(topic) => topic,
        Err(e) => {
            conn.send(&store_error_response(&e)).await?;
            return Ok(Step::Continue);
        }
    };

    metrics::set_active_topics(store.topic_count());

    let bytes = content.len();
    let position = topic.append(Message::new(content));
    metrics::record_published(bytes);
    debug!(connection = %conn.id(), topic = %topic_name, position, "Published");

    conn.send(&Response::Published).await?;
    Ok(Step::Continue)
}

async fn consume(
    conn: &mut dyn Connection,
    store: &TopicStore,
    shutdown: &ShutdownCoordinator,
) -> Result<Step, TransportError> {
    conn.send(&Response::TopicPrompt).await?;
    let topic_name = match next_input(conn, shutdown).await? {
        Input::Line(line) => line,
        other => return Ok(Step::Stop(other.end())),
    };

    let topic = match store.get(&topic_name) {
        Ok(topic) => topic,
        Err(e) => {
            debug!(connection = %conn.id(), topic = %topic_name, "Consume from unknown topic");
            conn.send(&store_error_response(&e)).await?;
            return Ok(Step::Continue);
        }
    };

    // Snapshot under the topic lock; the write happens after it is released.
    let messages: Vec<String> = topic
        .snapshot_all()
        .into_iter()
        .map(Message::into_content)
        .collect();
    let count = messages.len();

    conn.send(&Response::Messages(messages)).await?;
    metrics::record_delivered(count);
    debug!(connection = %conn.id(), topic = %topic_name, count, "Consumed");

    Ok(Step::Continue)
}

/// Read one line, giving up early if force-close is raised.
async fn next_input(
    conn: &mut dyn Connection,
    shutdown: &ShutdownCoordinator,
) -> Result<Input, TransportError> {
    tokio::select! {
        biased;

        () = shutdown.force_closed() => Ok(Input::ForceClosed),

        line = conn.recv_line() => Ok(match line? {
            Some(line) => Input::Line(line),
            None => Input::Eof,
        }),
    }
}

fn store_error_response(error: &StoreError) -> Response {
    match error {
        StoreError::InvalidTopicName => Response::InvalidTopicName,
        StoreError::TopicNotFound(_) => Response::TopicNotFound,
    }
}

fn error_kind(error: &TransportError) -> &'static str {
    match error {
        TransportError::Protocol(_) => "protocol",
        TransportError::ConnectionClosed => "closed",
        _ => "io",
    }
}
