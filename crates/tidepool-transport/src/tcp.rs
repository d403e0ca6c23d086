//! TCP transport implementation.
//!
//! [`LineConnection`] frames any byte stream with the line codec;
//! [`TcpTransport`] produces them from accepted sockets.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tidepool_protocol::{LineCodec, Response, MAX_LINE_LENGTH};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::codec::Framed;
use tracing::{debug, info, trace, warn};

use crate::traits::{Connection, ConnectionId, Transport, TransportError};

/// Initial read buffer capacity.
const READ_CHUNK: usize = 4096;

/// TCP transport configuration.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Maximum accepted line length in bytes.
    pub max_line_length: usize,
    /// Disable Nagle's algorithm on accepted sockets.
    pub nodelay: bool,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            max_line_length: MAX_LINE_LENGTH,
            nodelay: true,
        }
    }
}

/// TCP transport.
pub struct TcpTransport {
    listener: TcpListener,
    config: TcpConfig,
}

impl TcpTransport {
    /// Bind a TCP transport.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Bind`] if the address cannot be bound.
    pub async fn new(addr: &str, config: TcpConfig) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: addr.to_string(),
                source,
            })?;

        info!(
            "TCP transport listening on {}",
            listener
                .local_addr()
                .map_or_else(|_| addr.to_string(), |a| a.to_string())
        );

        Ok(Self { listener, config })
    }

    /// Bind a TCP transport with default config.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::new(addr, TcpConfig::default()).await
    }

    /// Get the local address this transport is bound to.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn accept(&self) -> Result<Box<dyn Connection>, TransportError> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::Accept)?;

        if self.config.nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                warn!("Failed to set TCP_NODELAY for {}: {}", addr, e);
            }
        }

        debug!("Accepted TCP connection from {}", addr);

        let conn = LineConnection::new(stream, Some(addr), self.config.max_line_length);
        Ok(Box::new(conn))
    }

    fn name(&self) -> &'static str {
        "tcp"
    }
}

/// A line-oriented connection over any byte stream.
pub struct LineConnection<S> {
    id: ConnectionId,
    framed: Framed<S, LineCodec>,
    remote_addr: Option<SocketAddr>,
    is_open: bool,
}

impl<S> LineConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + Sync,
{
    /// Wrap a stream.
    #[must_use]
    pub fn new(stream: S, remote_addr: Option<SocketAddr>, max_line_length: usize) -> Self {
        Self {
            id: ConnectionId::generate(),
            framed: Framed::with_capacity(
                stream,
                LineCodec::with_max_length(max_line_length),
                READ_CHUNK,
            ),
            remote_addr,
            is_open: true,
        }
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.is_open {
            Ok(())
        } else {
            Err(TransportError::ConnectionClosed)
        }
    }
}

#[async_trait]
impl<S> Connection for LineConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + Sync,
{
    fn id(&self) -> &ConnectionId {
        &self.id
    }

    async fn recv_line(&mut self) -> Result<Option<String>, TransportError> {
        match self.framed.next().await {
            Some(Ok(line)) => {
                trace!(connection = %self.id, line = %line, "Received line");
                Ok(Some(line))
            }
            Some(Err(e)) => Err(e.into()),
            None => {
                debug!(connection = %self.id, "Stream ended");
                Ok(None)
            }
        }
    }

    async fn send(&mut self, response: &Response) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.framed.send(response).await?;
        trace!(connection = %self.id, "Sent response");
        Ok(())
    }

    async fn send_raw(&mut self, data: Bytes) -> Result<(), TransportError> {
        self.ensure_open()?;
        let len = data.len();
        self.framed.send(data).await?;
        trace!(connection = %self.id, bytes = len, "Sent raw bytes");
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if !self.is_open {
            return Ok(());
        }
        self.is_open = false;
        // Unflushed output is discarded.
        self.framed.get_mut().shutdown().await?;
        Ok(())
    }

    fn remote_addr(&self) -> Option<String> {
        self.remote_addr.map(|a| a.to_string())
    }

    fn is_open(&self) -> bool {
        self.is_open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{duplex, AsyncReadExt};
    use tokio::net::TcpStream;

    #[test]
    fn test_tcp_config_default() {
        let config = TcpConfig::default();
        assert_eq!(config.max_line_length, 64 * 1024);
        assert!(config.nodelay);
    }

    #[tokio::test]
    async fn test_recv_lines_across_reads() {
        let (mut client, server) = duplex(64);
        let mut conn = LineConnection::new(server, None, MAX_LINE_LENGTH);

        client.write_all(b"PUBL").await.unwrap();
        client.write_all(b"ISH\norders\n").await.unwrap();

        assert_eq!(conn.recv_line().await.unwrap().as_deref(), Some("PUBLISH"));
        assert_eq!(conn.recv_line().await.unwrap().as_deref(), Some("orders"));
    }

    #[tokio::test]
    async fn test_eof_yields_tail_then_none() {
        let (mut client, server) = duplex(64);
        let mut conn = LineConnection::new(server, None, MAX_LINE_LENGTH);

        client.write_all(b"CONSUME\ninvoices").await.unwrap();
        drop(client);

        assert_eq!(conn.recv_line().await.unwrap().as_deref(), Some("CONSUME"));
        assert_eq!(conn.recv_line().await.unwrap().as_deref(), Some("invoices"));
        assert_eq!(conn.recv_line().await.unwrap(), None);
        assert_eq!(conn.recv_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_line_too_long_is_an_error() {
        let (mut client, server) = duplex(64);
        let mut conn = LineConnection::new(server, None, 8);

        client.write_all(b"0123456789abcdef\n").await.unwrap();
        assert!(matches!(
            conn.recv_line().await,
            Err(TransportError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_send_writes_response_bytes() {
        let (mut client, server) = duplex(256);
        let mut conn = LineConnection::new(server, None, MAX_LINE_LENGTH);

        conn.send(&Response::Messages(vec!["urgent".into()]))
            .await
            .unwrap();
        conn.close().await.unwrap();
        assert!(!conn.is_open());
        assert!(matches!(
            conn.send(&Response::Published).await,
            Err(TransportError::ConnectionClosed)
        ));

        let mut received = Vec::new();
        client.read_to_end(&mut received).await.unwrap();
        assert_eq!(received, b"urgent\n\nEND_OF_MESSAGES\n");
    }

    #[tokio::test]
    async fn test_tcp_transport_accepts() {
        let transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr().unwrap();
        assert_eq!(transport.name(), "tcp");

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"PUBLISH\n").await.unwrap();
            stream
        });

        let mut conn = transport.accept().await.unwrap();
        assert!(conn.remote_addr().is_some());
        assert_eq!(conn.recv_line().await.unwrap().as_deref(), Some("PUBLISH"));
        drop(client.await.unwrap());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let first = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = first.local_addr().unwrap().to_string();

        match TcpTransport::bind(&addr).await {
            Err(TransportError::Bind { addr: reported, .. }) => assert_eq!(reported, addr),
            Err(other) => panic!("Expected Bind error, got {other:?}"),
            Ok(_) => panic!("Expected Bind error, got a listener"),
        }
    }
}
