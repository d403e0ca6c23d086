//! # tidepool-client
//!
//! Client for the tidepool line protocol.
//!
//! ```rust,no_run
//! use tidepool_client::{Client, ConsumeOutcome};
//!
//! # async fn example() -> Result<(), tidepool_client::ClientError> {
//! let mut client = Client::connect("localhost:8080").await?;
//! client.publish("orders", "urgent").await?;
//!
//! if let ConsumeOutcome::Messages(messages) = client.consume("orders").await? {
//!     assert_eq!(messages.last().map(String::as_str), Some("urgent"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;

pub use client::{Client, ClientError, ConsumeOutcome, PublishOutcome};
