//! Agent-side status publisher
//!
//! Fire-and-forget: the runtime never blocks on, or learns about, the
//! presence of subscribers. If the hub is unreachable the publisher degrades
//! to a logged no-op so an agent can still run standalone.

use crate::status::message::{StatusFrame, StatusMessage};

use bytes::Bytes;
use futures::SinkExt;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Publishes one agent's activity records to the status hub
pub struct StatusPublisher {
    agent_id: String,
    framed: Option<Framed<TcpStream, LengthDelimitedCodec>>,
}

impl StatusPublisher {
    /// Connect to the status hub.
    ///
    /// A failed connect is not fatal: the publisher is returned in degraded
    /// mode and every `publish` becomes a no-op.
    pub async fn connect(addr: &str, agent_id: impl Into<String>) -> Self {
        let agent_id = agent_id.into();
        let framed = match TcpStream::connect(addr).await {
            Ok(stream) => Some(Framed::new(stream, LengthDelimitedCodec::new())),
            Err(e) => {
                tracing::warn!(
                    agent_id = %agent_id,
                    "Status hub unreachable at {}, running without status channel: {}",
                    addr,
                    e
                );
                None
            }
        };

        Self { agent_id, framed }
    }

    /// The publishing agent's identity
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Publish one record. Errors are logged, never surfaced.
    pub async fn publish(&mut self, text: impl Into<String>) {
        let message = StatusMessage::new(self.agent_id.clone(), text);
        tracing::debug!(agent_id = %message.agent_id, text = %message.text, "Status sent");

        let Some(framed) = self.framed.as_mut() else {
            return;
        };

        let payload = match serde_json::to_vec(&StatusFrame::Publish(message)) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(agent_id = %self.agent_id, "Failed to encode status: {}", e);
                return;
            }
        };

        if let Err(e) = framed.send(Bytes::from(payload)).await {
            tracing::warn!(
                agent_id = %self.agent_id,
                "Status hub connection lost, dropping further status output: {}",
                e
            );
            self.framed = None;
        }
    }

    /// Close the hub connection
    pub async fn close(mut self) {
        if let Some(mut framed) = self.framed.take() {
            let _ = framed.close().await;
        }
    }
}
