//! Shared status endpoint
//!
//! The hub binds the status port once and fans every published record out to
//! all connected subscribers. Slow subscribers lag and lose messages rather
//! than back-pressuring publishers.

use crate::error::{Error, Result};
use crate::status::message::{StatusFrame, StatusMessage};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Fan-out buffer depth per subscriber before lagging drops messages
const FANOUT_BUFFER: usize = 256;

/// The shared status endpoint every agent publishes to
pub struct StatusHub {
    local_addr: SocketAddr,
    tx: broadcast::Sender<StatusMessage>,
    accept_task: JoinHandle<()>,
}

impl StatusHub {
    /// Bind the hub and start accepting publishers and subscribers
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            Error::Transport(format!("Failed to bind status hub on {}: {}", addr, e))
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::Transport(format!("No local address: {}", e)))?;

        let (tx, _) = broadcast::channel(FANOUT_BUFFER);
        let fanout = tx.clone();

        let accept_task = tokio::spawn(async move {
            let mut incoming = TcpListenerStream::new(listener);
            while let Some(stream) = incoming.next().await {
                match stream {
                    Ok(stream) => {
                        let fanout = fanout.clone();
                        tokio::spawn(async move {
                            handle_connection(stream, fanout).await;
                        });
                    }
                    Err(e) => {
                        tracing::warn!("Status hub accept error: {}", e);
                    }
                }
            }
        });

        tracing::info!(addr = %local_addr, "Status hub bound");

        Ok(Self {
            local_addr,
            tx,
            accept_task,
        })
    }

    /// The bound address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// In-process subscription, bypassing the socket layer
    pub fn subscribe(&self) -> broadcast::Receiver<StatusMessage> {
        self.tx.subscribe()
    }

    /// Stop accepting connections and release the port
    pub fn shutdown(&self) {
        self.accept_task.abort();
    }
}

impl Drop for StatusHub {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

/// Serve one hub connection.
///
/// The first frame decides the role: a `Subscribe` frame turns the
/// connection into a forward loop; `Publish` frames are fanned out as they
/// arrive.
async fn handle_connection(stream: TcpStream, fanout: broadcast::Sender<StatusMessage>) {
    let peer = stream.peer_addr().ok();
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    while let Some(frame) = framed.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(peer = ?peer, "Status connection read error: {}", e);
                return;
            }
        };

        match serde_json::from_slice::<StatusFrame>(&frame) {
            Ok(StatusFrame::Publish(message)) => {
                // send only fails with zero receivers; that is fine
                let _ = fanout.send(message);
            }
            Ok(StatusFrame::Subscribe { agent_id }) => {
                forward_to_subscriber(framed, fanout.subscribe(), agent_id).await;
                return;
            }
            Err(e) => {
                tracing::debug!(peer = ?peer, "Dropping malformed status frame: {}", e);
            }
        }
    }
}

/// Forward matching records to one subscriber until it disconnects
async fn forward_to_subscriber(
    mut framed: Framed<TcpStream, LengthDelimitedCodec>,
    mut rx: broadcast::Receiver<StatusMessage>,
    filter: Option<String>,
) {
    loop {
        tokio::select! {
            received = rx.recv() => {
                let message = match received {
                    Ok(message) => message,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::debug!(missed = missed, "Subscriber lagged; messages dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                };

                if let Some(ref wanted) = filter {
                    if &message.agent_id != wanted {
                        continue;
                    }
                }

                let payload = match serde_json::to_vec(&StatusFrame::Publish(message)) {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!("Failed to encode status frame: {}", e);
                        continue;
                    }
                };
                if framed.send(Bytes::from(payload)).await.is_err() {
                    return;
                }
            }
            end = framed.next() => {
                // Subscribers do not send after the subscribe frame; any
                // read result other than a frame means the peer went away.
                if end.is_none() {
                    return;
                }
            }
        }
    }
}
