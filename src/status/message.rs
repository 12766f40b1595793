//! Status channel wire types

use serde::{Deserialize, Serialize};

/// One agent activity record: `(agent_id, text)`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusMessage {
    /// Publishing agent's identity
    pub agent_id: String,

    /// Human-readable activity text
    pub text: String,
}

impl StatusMessage {
    /// Create a status message
    pub fn new(agent_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            text: text.into(),
        }
    }
}

/// Frames exchanged with the status hub
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusFrame {
    /// A publisher emitting one record
    Publish(StatusMessage),

    /// A connection declaring itself a subscriber, optionally filtered to
    /// one agent's records
    Subscribe { agent_id: Option<String> },
}
