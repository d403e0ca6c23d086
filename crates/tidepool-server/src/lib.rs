//! # tidepool-server
//!
//! Line-protocol message broker.
//!
//! [`Broker`] accepts TCP connections and runs one handler task per
//! connection; handlers publish into and read from the shared topic store.

pub mod broker;
pub mod config;
pub mod handlers;
pub mod metrics;

pub use broker::{Broker, ConnectionInfo};
pub use config::Config;
pub use handlers::{run_session, SessionEnd};
