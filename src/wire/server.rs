//! Command-channel server used by agent runtimes
//!
//! Binds once at process start. `poll` waits a bounded slice for an incoming
//! request so the owning loop can interleave periodic work (status emission)
//! with command handling. One exchange is in flight at a time: the next
//! request is not accepted until the current one has been answered.

use crate::error::{Error, Result};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Server side of the Command Channel
pub struct CommandServer {
    listener: TcpListener,
    local_addr: SocketAddr,
}

/// One received request, holding the connection open until answered
pub struct Exchange {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    payload: String,
    peer: SocketAddr,
}

impl CommandServer {
    /// Bind the command server
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            Error::Transport(format!("Failed to bind command server on {}: {}", addr, e))
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::Transport(format!("No local address: {}", e)))?;
        tracing::debug!(addr = %local_addr, "Command server bound");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// The bound address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait up to `wait` for a request.
    ///
    /// Returns `Ok(None)` when the slice elapses without a request — a
    /// normal event that lets the caller run periodic work. A connection
    /// that opens but sends nothing within the slice is dropped.
    pub async fn poll(&mut self, wait: Duration) -> Result<Option<Exchange>> {
        let (stream, peer) = match timeout(wait, self.listener.accept()).await {
            Ok(Ok(accepted)) => accepted,
            Ok(Err(e)) => {
                return Err(Error::Transport(format!("Accept failed: {}", e)));
            }
            Err(_) => return Ok(None),
        };

        let mut framed = Framed::new(stream, LengthDelimitedCodec::new());
        let frame = match timeout(wait, framed.next()).await {
            Ok(Some(Ok(frame))) => frame,
            Ok(Some(Err(e))) => {
                return Err(Error::Transport(format!(
                    "Failed to read request from {}: {}",
                    peer, e
                )));
            }
            Ok(None) | Err(_) => {
                // Connected but sent nothing; drop it and report an idle slice
                return Ok(None);
            }
        };

        let payload = String::from_utf8(frame.to_vec()).map_err(|e| {
            Error::Transport(format!("Request from {} is not UTF-8: {}", peer, e))
        })?;

        tracing::debug!(peer = %peer, command = %payload, "Command received");

        Ok(Some(Exchange {
            framed,
            payload,
            peer,
        }))
    }
}

impl Exchange {
    /// The received command text
    pub fn text(&self) -> &str {
        &self.payload
    }

    /// The requesting peer
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Send the reply and complete the exchange
    pub async fn respond(mut self, reply: &str) -> Result<()> {
        self.framed
            .send(Bytes::copy_from_slice(reply.as_bytes()))
            .await
            .map_err(|e| {
                Error::Transport(format!("Failed to reply to {}: {}", self.peer, e))
            })?;
        self.framed.flush().await.map_err(|e| {
            Error::Transport(format!("Failed to flush reply to {}: {}", self.peer, e))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::client::CommandClient;

    #[tokio::test]
    async fn test_poll_empty_slice() {
        let mut server = CommandServer::bind("127.0.0.1:0").await.unwrap();
        let polled = server.poll(Duration::from_millis(50)).await.unwrap();
        assert!(polled.is_none());
    }

    #[tokio::test]
    async fn test_second_request_waits_for_first_reply() {
        let mut server = CommandServer::bind("127.0.0.1:0").await.unwrap();
        let addr = server.local_addr().to_string();

        let addr_a = addr.clone();
        let first = tokio::spawn(async move {
            let mut c = CommandClient::connect(&addr_a, Duration::from_secs(3))
                .await
                .unwrap();
            c.send_command("crawl").await
        });

        let exchange = server
            .poll(Duration::from_secs(2))
            .await
            .unwrap()
            .expect("first request");

        // A second client connects while the first is unanswered; its
        // exchange is only surfaced by a later poll.
        let addr_b = addr.clone();
        let second = tokio::spawn(async move {
            let mut c = CommandClient::connect(&addr_b, Duration::from_secs(3))
                .await
                .unwrap();
            c.send_command("test").await
        });

        exchange.respond("Crawling").await.unwrap();
        assert_eq!(first.await.unwrap().unwrap(), "Crawling");

        let exchange = server
            .poll(Duration::from_secs(2))
            .await
            .unwrap()
            .expect("second request");
        assert_eq!(exchange.text(), "test");
        exchange.respond("Test received").await.unwrap();
        assert_eq!(second.await.unwrap().unwrap(), "Test received");
    }
}
