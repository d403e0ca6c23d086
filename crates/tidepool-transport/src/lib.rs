//! # tidepool-transport
//!
//! Transport abstraction layer for the tidepool broker.
//!
//! A [`Transport`] accepts connections; a [`Connection`] exchanges
//! newline-delimited lines with one client. The server only talks to these
//! traits, so tests can drive a handler over an in-memory stream.
//!
//! ```rust,ignore
//! use tidepool_transport::{Connection, Transport};
//!
//! async fn handle_connection(mut conn: Box<dyn Connection>) {
//!     while let Ok(Some(line)) = conn.recv_line().await {
//!         // Dispatch command
//!     }
//! }
//! ```

pub mod tcp;
pub mod traits;

pub use tcp::{LineConnection, TcpConfig, TcpTransport};
pub use traits::{Connection, ConnectionId, Transport, TransportError};
