//! # tidepool-core
//!
//! Core state of the tidepool broker.
//!
//! - **Message** - Immutable unit of content
//! - **Topic** - Named, append-only message log guarded by its own lock
//! - **TopicStore** - Registry of topics with atomic get-or-create
//! - **ShutdownCoordinator** - One-shot stop signal plus handler drain
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Handler    │────▶│ TopicStore  │────▶│   Topic     │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        │
//!        ▼
//! ┌─────────────────────┐
//! │ ShutdownCoordinator │
//! └─────────────────────┘
//! ```
//!
//! Locks are per topic: operations on different topics never contend.

pub mod message;
pub mod shutdown;
pub mod store;
pub mod topic;

pub use message::Message;
pub use shutdown::{DrainOutcome, ShutdownCoordinator};
pub use store::{validate_topic_name, StoreError, StoreStats, TopicStore};
pub use topic::{Topic, TopicName};
