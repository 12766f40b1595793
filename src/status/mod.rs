//! Status Channel — asynchronous one-to-many agent activity broadcast
//!
//! Every agent publishes `(agent_id, text)` records to one shared hub
//! endpoint; any number of subscribers connect and filter by agent identity.
//! Publishing is fire-and-forget: no acknowledgement, no durability, and a
//! subscriber that connects late misses prior messages. Ordering holds
//! per-publisher only.

pub mod hub;
pub mod message;
pub mod publisher;
pub mod subscriber;

pub use hub::StatusHub;
pub use message::{StatusFrame, StatusMessage};
pub use publisher::StatusPublisher;
pub use subscriber::StatusSubscriber;
