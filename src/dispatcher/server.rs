//! Dispatcher serve loop
//!
//! Connections are accepted concurrently, but their requests funnel through
//! one exchange queue with a single consumer: one request is answered before
//! the next is taken, matching the reply-per-request transport. An empty
//! receive slice is a normal event — the loop uses it to reap exited agent
//! processes — and a malformed envelope gets a structured error reply
//! without dropping the connection.

use crate::config::CrawlHiveConfig;
use crate::dispatcher::handler::{decode_error_reply, CommandHandlers};
use crate::dispatcher::request::Request;
use crate::error::{Error, Result};
use crate::status::StatusHub;
use crate::store::Store;
use crate::supervisor::Supervisor;
use crate::wire::{Envelope, ReplyEnvelope};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Exchange queue depth; senders wait when the consumer falls behind
const EXCHANGE_QUEUE: usize = 64;

/// One queued exchange: the decoded-or-not envelope and the reply slot
type QueuedExchange = (Envelope, oneshot::Sender<ReplyEnvelope>);

/// The backend command dispatcher
pub struct Dispatcher {
    listener: TcpListener,
    local_addr: SocketAddr,
    hub: StatusHub,
    handlers: CommandHandlers,
    recv_slice: Duration,
}

impl Dispatcher {
    /// Bind the command endpoint and the status hub
    pub async fn bind(
        config: &CrawlHiveConfig,
        store: Arc<dyn Store>,
        supervisor: Arc<Supervisor>,
    ) -> Result<Self> {
        let addr = config.dispatcher.addr();
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            Error::Transport(format!("Failed to bind dispatcher on {}: {}", addr, e))
        })?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::Transport(format!("No local address: {}", e)))?;

        let hub = StatusHub::bind(&config.agents.status_addr()).await?;

        tracing::info!(addr = %local_addr, "Dispatcher bound");

        Ok(Self {
            listener,
            local_addr,
            hub,
            handlers: CommandHandlers::new(store, supervisor),
            recv_slice: Duration::from_millis(config.dispatcher.recv_timeout_ms),
        })
    }

    /// The bound command address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The bound status hub address
    pub fn status_addr(&self) -> SocketAddr {
        self.hub.local_addr()
    }

    /// Serve until an `exit` command arrives
    pub async fn run(self) -> Result<()> {
        let (queue_tx, mut queue_rx) = mpsc::channel::<QueuedExchange>(EXCHANGE_QUEUE);

        let accept_task = tokio::spawn(accept_loop(self.listener, queue_tx));

        loop {
            match timeout(self.recv_slice, queue_rx.recv()).await {
                Err(_) => {
                    // Nothing arrived this slice; reconcile process handles
                    tracing::trace!("Receive slice empty, continuing");
                    self.handlers.supervisor().cleanup_processes().await;
                }
                Ok(None) => {
                    tracing::warn!("Exchange queue closed");
                    break;
                }
                Ok(Some((envelope, reply_tx))) => {
                    let request = Request::decode(&envelope);
                    let is_exit = matches!(request, Ok(Request::Exit));

                    let reply = match request {
                        Ok(request) => self.handlers.handle(request).await,
                        Err(e) => {
                            tracing::warn!(command = %envelope.command, "Rejected request: {}", e);
                            decode_error_reply(&e)
                        }
                    };
                    let _ = reply_tx.send(reply);

                    if is_exit {
                        tracing::info!("Exit command received, shutting down");
                        break;
                    }
                }
            }
        }

        accept_task.abort();
        self.hub.shutdown();
        Ok(())
    }
}

/// Accept connections and pump their frames into the exchange queue
async fn accept_loop(listener: TcpListener, queue_tx: mpsc::Sender<QueuedExchange>) {
    let mut incoming = TcpListenerStream::new(listener);
    while let Some(stream) = incoming.next().await {
        match stream {
            Ok(stream) => {
                let queue_tx = queue_tx.clone();
                tokio::spawn(async move {
                    serve_connection(stream, queue_tx).await;
                });
            }
            Err(e) => {
                tracing::warn!("Dispatcher accept error: {}", e);
            }
        }
    }
}

/// Serve one (possibly pooled, long-lived) client connection
async fn serve_connection(stream: TcpStream, queue_tx: mpsc::Sender<QueuedExchange>) {
    let peer = stream.peer_addr().ok();
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    while let Some(frame) = framed.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(peer = ?peer, "Connection read error: {}", e);
                return;
            }
        };

        // A malformed envelope gets an error reply, not a dropped socket
        let reply = match serde_json::from_slice::<Envelope>(&frame) {
            Ok(envelope) => {
                let (reply_tx, reply_rx) = oneshot::channel();
                if queue_tx.send((envelope, reply_tx)).await.is_err() {
                    // Dispatcher is shutting down
                    return;
                }
                match reply_rx.await {
                    Ok(reply) => reply,
                    Err(_) => return,
                }
            }
            Err(e) => {
                tracing::warn!(peer = ?peer, "Invalid request envelope: {}", e);
                ReplyEnvelope::error(format!("Invalid request: {}", e), 400)
            }
        };

        let payload = match serde_json::to_vec(&reply) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to encode reply: {}", e);
                return;
            }
        };
        if framed.send(Bytes::from(payload)).await.is_err() {
            return;
        }
    }
}
