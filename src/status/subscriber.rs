//! Observer-side status subscription

use crate::error::{Error, Result};
use crate::status::message::{StatusFrame, StatusMessage};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// A connected status-channel subscriber
pub struct StatusSubscriber {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
}

impl StatusSubscriber {
    /// Connect to the hub and subscribe, optionally filtered to one agent
    pub async fn connect(addr: &str, agent_id: Option<&str>) -> Result<Self> {
        let stream = TcpStream::connect(addr).await.map_err(|e| {
            Error::Transport(format!("Failed to connect to status hub {}: {}", addr, e))
        })?;
        let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

        let subscribe = StatusFrame::Subscribe {
            agent_id: agent_id.map(str::to_string),
        };
        let payload = serde_json::to_vec(&subscribe)?;
        framed.send(Bytes::from(payload)).await.map_err(|e| {
            Error::Transport(format!("Failed to send subscribe frame: {}", e))
        })?;

        Ok(Self { framed })
    }

    /// Receive the next matching record; `None` when the hub goes away
    pub async fn recv(&mut self) -> Result<Option<StatusMessage>> {
        loop {
            let frame = match self.framed.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(e)) => {
                    return Err(Error::Transport(format!("Status read failed: {}", e)));
                }
                None => return Ok(None),
            };

            match serde_json::from_slice::<StatusFrame>(&frame)? {
                StatusFrame::Publish(message) => return Ok(Some(message)),
                StatusFrame::Subscribe { .. } => continue,
            }
        }
    }

    /// Receive with a bound; `None` when nothing arrives within `wait`
    pub async fn recv_timeout(&mut self, wait: Duration) -> Result<Option<StatusMessage>> {
        match timeout(wait, self.recv()).await {
            Ok(result) => result,
            Err(_) => Ok(None),
        }
    }

    /// Drain whatever is immediately available
    pub async fn drain(&mut self, settle: Duration) -> Result<Vec<StatusMessage>> {
        let mut messages = Vec::new();
        while let Some(message) = self.recv_timeout(settle).await? {
            messages.push(message);
        }
        Ok(messages)
    }
}
