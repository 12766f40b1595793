//! Command-channel client
//!
//! One `CommandClient` wraps one framed TCP connection. `request_*` sends a
//! single frame and blocks up to the configured timeout for the single reply
//! frame. A timeout is surfaced as [`Error::Timeout`] and means the outcome
//! is unknown — the request is never retried here; the caller decides.

use crate::error::{Error, Result};
use crate::wire::envelope::{Envelope, ReplyEnvelope};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Client side of the Command Channel
pub struct CommandClient {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    addr: String,
    request_timeout: Duration,
    open: bool,
    /// Stable id for log correlation across the socket's lifetime
    client_id: String,
}

impl CommandClient {
    /// Open a client connection to a command server
    pub async fn connect(addr: &str, request_timeout: Duration) -> Result<Self> {
        let stream = TcpStream::connect(addr).await.map_err(|e| {
            Error::Transport(format!("Failed to connect to {}: {}", addr, e))
        })?;
        let client_id = format!("cmd-client-{}", uuid::Uuid::new_v4());
        tracing::debug!(client_id = %client_id, addr = addr, "Command client connected");

        Ok(Self {
            framed: Framed::new(stream, LengthDelimitedCodec::new()),
            addr: addr.to_string(),
            request_timeout,
            open: true,
            client_id,
        })
    }

    /// Whether the connection is still usable
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// The address this client is connected to
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Stable log-correlation id
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// One raw exchange: send a frame, await the reply frame
    async fn request_raw(&mut self, payload: Bytes) -> Result<Bytes> {
        if !self.open {
            return Err(Error::Transport(format!(
                "Connection to {} is closed",
                self.addr
            )));
        }

        if let Err(e) = self.framed.send(payload).await {
            self.open = false;
            return Err(Error::Transport(format!(
                "Failed to send to {}: {}",
                self.addr, e
            )));
        }

        match timeout(self.request_timeout, self.framed.next()).await {
            Ok(Some(Ok(frame))) => Ok(frame.freeze()),
            Ok(Some(Err(e))) => {
                self.open = false;
                Err(Error::Transport(format!(
                    "Failed to read reply from {}: {}",
                    self.addr, e
                )))
            }
            Ok(None) => {
                self.open = false;
                Err(Error::Transport(format!(
                    "Connection to {} closed before a reply arrived",
                    self.addr
                )))
            }
            Err(_) => Err(Error::Timeout(format!(
                "No response from {} within {:?}",
                self.addr, self.request_timeout
            ))),
        }
    }

    /// Agent-channel exchange: bare command text out, bare reply text back
    pub async fn send_command(&mut self, command: &str) -> Result<String> {
        let reply = self
            .request_raw(Bytes::copy_from_slice(command.as_bytes()))
            .await?;
        String::from_utf8(reply.to_vec())
            .map_err(|e| Error::Transport(format!("Reply from {} is not UTF-8: {}", self.addr, e)))
    }

    /// Dispatcher-channel exchange: JSON envelope out, JSON reply back
    pub async fn request(&mut self, envelope: &Envelope) -> Result<ReplyEnvelope> {
        let payload = serde_json::to_vec(envelope)?;
        let reply = self.request_raw(Bytes::from(payload)).await?;
        serde_json::from_slice(&reply).map_err(|e| {
            Error::Transport(format!("Invalid reply envelope from {}: {}", self.addr, e))
        })
    }

    /// Close the connection
    pub async fn close(mut self) {
        self.open = false;
        let _ = self.framed.close().await;
        tracing::debug!(client_id = %self.client_id, "Command client closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::server::CommandServer;

    #[tokio::test]
    async fn test_connect_refused() {
        // Port 1 is never listening
        let result = CommandClient::connect("127.0.0.1:1", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn test_text_exchange() {
        let mut server = CommandServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().to_string();

        let client = tokio::spawn(async move {
            let mut client = CommandClient::connect(&addr, Duration::from_secs(2))
                .await
                .unwrap();
            client.send_command("test").await
        });

        let exchange = server
            .poll(Duration::from_secs(2))
            .await
            .unwrap()
            .expect("expected a request");
        assert_eq!(exchange.text(), "test");
        exchange.respond("Test received").await.unwrap();

        assert_eq!(client.await.unwrap().unwrap(), "Test received");
    }

    #[tokio::test]
    async fn test_timeout_is_distinguishable() {
        let mut server = CommandServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().to_string();

        let client = tokio::spawn(async move {
            let mut client = CommandClient::connect(&addr, Duration::from_millis(200))
                .await
                .unwrap();
            client.send_command("test").await
        });

        // Accept the request but never answer it
        let _exchange = server.poll(Duration::from_secs(2)).await.unwrap();

        match client.await.unwrap() {
            Err(Error::Timeout(msg)) => assert!(msg.contains("No response")),
            other => panic!("expected timeout, got {:?}", other.map(|_| ())),
        }
    }
}
