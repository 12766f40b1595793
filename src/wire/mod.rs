//! Command Channel — synchronous one-request-one-reply transport
//!
//! Every exchange is one length-delimited frame out, one frame back, over a
//! localhost TCP connection. The dispatcher channel carries JSON envelopes;
//! the per-agent channel (bound at `base_command_port + agent_id`) carries
//! bare UTF-8 command text.

pub mod client;
pub mod envelope;
pub mod server;

pub use client::CommandClient;
pub use envelope::{Envelope, ReplyEnvelope};
pub use server::{CommandServer, Exchange};
