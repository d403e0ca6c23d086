//! The broker: accept loop, connection registry and shutdown.
//!
//! The broker owns the topic store, the set of live connections and the
//! shutdown coordinator. Every accepted connection is registered, counted
//! and handed to its own handler task.

use crate::config::Config;
use crate::handlers;
use crate::metrics;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tidepool_core::{DrainOutcome, ShutdownCoordinator, TopicStore};
use tidepool_transport::{
    Connection, ConnectionId, TcpConfig, TcpTransport, Transport, TransportError,
};
use tracing::{debug, info, warn};

/// Pause after a failed accept so a persistent error does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// Details kept for each live connection.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Peer address, if known.
    pub remote_addr: Option<String>,
    /// When the connection was accepted.
    pub connected_at: Instant,
}

/// Shared broker state.
pub struct Broker {
    /// All topics.
    store: TopicStore,
    /// Live connections.
    connections: DashMap<ConnectionId, ConnectionInfo>,
    /// Stop signal and handler drain.
    shutdown: ShutdownCoordinator,
    /// Server configuration.
    config: Config,
}

impl Broker {
    /// Create a new broker.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            store: TopicStore::new(),
            connections: DashMap::new(),
            shutdown: ShutdownCoordinator::new(),
            config,
        }
    }

    /// Get the topic store.
    #[must_use]
    pub fn store(&self) -> &TopicStore {
        &self.store
    }

    /// Get the shutdown coordinator.
    #[must_use]
    pub fn shutdown_coordinator(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Get the server configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the number of registered connections.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.connections.len()
    }

    /// Get a snapshot of the registered connections.
    #[must_use]
    pub fn connections(&self) -> Vec<(ConnectionId, ConnectionInfo)> {
        self.connections
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Bind a TCP transport using the configured limits.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Bind`] if the address cannot be bound.
    pub async fn bind(&self, addr: &str) -> Result<TcpTransport, TransportError> {
        let tcp_config = TcpConfig {
            max_line_length: self.config.limits.max_line_length,
            ..TcpConfig::default()
        };
        TcpTransport::new(addr, tcp_config).await
    }

    /// Bind `addr` and serve connections until shutdown is requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound. Accept errors are
    /// logged and never end the loop.
    pub async fn listen(self: Arc<Self>, addr: &str) -> Result<(), TransportError> {
        let transport = self.bind(addr).await?;
        self.serve(transport).await;
        Ok(())
    }

    /// Accept connections from `transport` until shutdown is requested.
    ///
    /// Connections already accepted keep running; use [`Broker::shutdown`]
    /// to wait for them.
    pub async fn serve<T>(self: Arc<Self>, transport: T)
    where
        T: Transport + 'static,
    {
        info!(transport = transport.name(), "Accepting connections");

        loop {
            let accepted = tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break,

                result = transport.accept() => result,
            };

            match accepted {
                Ok(conn) => self.spawn_handler(conn),
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    metrics::record_error("accept");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }

        info!(
            outstanding = self.shutdown.outstanding(),
            "Accept loop stopped"
        );
    }

    /// Request shutdown: stop accepting and tell handlers to finish.
    ///
    /// Returns `true` if this call initiated the shutdown.
    pub fn request_shutdown(&self) -> bool {
        self.shutdown.request_shutdown()
    }

    /// Request shutdown and wait for every handler to finish, force-closing
    /// stragglers after the configured drain timeout.
    pub async fn shutdown(&self) -> DrainOutcome {
        self.request_shutdown();

        let waiting = self.connections();
        info!(connections = waiting.len(), "Draining connections");
        for (id, info) in &waiting {
            debug!(
                connection = %id,
                remote = ?info.remote_addr,
                age_ms = info.connected_at.elapsed().as_millis() as u64,
                "Waiting for connection"
            );
        }

        let grace = self.config.shutdown.drain_grace();
        let outcome = self.shutdown.await_drain_with_grace(grace).await;

        let stats = self.store.stats();
        info!(
            topics = stats.topic_count,
            messages = stats.message_count,
            ?outcome,
            "Broker stopped"
        );
        outcome
    }

    fn spawn_handler(self: &Arc<Self>, conn: Box<dyn Connection>) {
        let registration = self.register(conn.as_ref());
        let broker = Arc::clone(self);

        self.shutdown.track(async move {
            let _registration = registration;
            handlers::handle_connection(conn, broker).await;
        });
    }

    fn register(self: &Arc<Self>, conn: &dyn Connection) -> Registration {
        let id = conn.id().clone();
        let info = ConnectionInfo {
            remote_addr: conn.remote_addr(),
            connected_at: Instant::now(),
        };

        debug!(connection = %id, remote = ?info.remote_addr, "Registered connection");
        self.connections.insert(id.clone(), info);

        Registration {
            broker: Arc::clone(self),
            id,
        }
    }
}

/// Removes a connection from the registry when dropped, on every exit path.
struct Registration {
    broker: Arc<Broker>,
    id: ConnectionId,
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some((id, info)) = self.broker.connections.remove(&self.id) {
            debug!(
                connection = %id,
                duration_ms = info.connected_at.elapsed().as_millis() as u64,
                "Deregistered connection"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.host = "127.0.0.1".to_string();
        config.port = 0;
        config
    }

    #[tokio::test]
    async fn test_new_broker_is_empty() {
        let broker = Broker::new(test_config());
        assert_eq!(broker.active_connections(), 0);
        assert_eq!(broker.store().topic_count(), 0);
        assert!(!broker.shutdown_coordinator().is_shutdown_requested());
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let broker = Arc::new(Broker::new(test_config()));
        let transport = broker.bind("127.0.0.1:0").await.unwrap();

        let server = tokio::spawn(Arc::clone(&broker).serve(transport));
        assert!(broker.request_shutdown());

        tokio::time::timeout(Duration::from_secs(1), server)
            .await
            .expect("accept loop exits")
            .unwrap();
        assert_eq!(broker.shutdown().await, DrainOutcome::Drained);
    }

    #[tokio::test]
    async fn test_listen_reports_bind_failure() {
        let broker = Arc::new(Broker::new(test_config()));
        let taken = broker.bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();

        let result = Arc::clone(&broker).listen(&addr).await;
        assert!(matches!(result, Err(TransportError::Bind { .. })));
    }
}
