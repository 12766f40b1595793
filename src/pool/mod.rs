//! Client-side connection pool for the dispatcher channel
//!
//! Bounds the number of concurrent command-channel sockets a front end holds
//! against the dispatcher. Sockets are handed out exclusively between
//! `acquire` and `release`; `acquire` suspends cooperatively on an empty
//! pool, a socket found closed is replaced with a fresh one, and `shutdown`
//! tears everything down while leaving the pool able to lazily reconstruct
//! itself on next use.
//!
//! A socket can also go stale in a subtler way: it was created under an
//! async runtime that has since shut down, so its IO fails with a
//! reactor-gone error even though the peer is fine. That failure triggers a
//! full pool re-initialization instead of silently poisoning callers.

use crate::config::PoolConfig;
use crate::error::{Error, Result};
use crate::wire::{CommandClient, Envelope, ReplyEnvelope};

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

/// Idle sockets plus the count currently handed out
struct PoolState {
    idle: VecDeque<CommandClient>,
    in_use: usize,
}

/// Bounded pool of dispatcher-channel clients
pub struct ConnectionPool {
    server_addr: String,
    capacity: usize,
    request_timeout: Duration,
    state: Mutex<Option<PoolState>>,
    available: Notify,
}

impl ConnectionPool {
    /// Create the pool and pre-populate it with `capacity` open sockets
    pub async fn connect(server_addr: &str, config: &PoolConfig) -> Result<Self> {
        let pool = Self {
            server_addr: server_addr.to_string(),
            capacity: config.capacity,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            state: Mutex::new(None),
            available: Notify::new(),
        };

        {
            let mut state = pool.state.lock().await;
            *state = Some(pool.build_state().await?);
        }

        tracing::info!(
            server = %pool.server_addr,
            capacity = pool.capacity,
            "Connection pool initialized"
        );
        Ok(pool)
    }

    /// Pool capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    async fn build_state(&self) -> Result<PoolState> {
        let mut idle = VecDeque::with_capacity(self.capacity);
        for _ in 0..self.capacity {
            idle.push_back(CommandClient::connect(&self.server_addr, self.request_timeout).await?);
        }
        Ok(PoolState {
            idle,
            in_use: 0,
        })
    }

    /// Take a socket, waiting until one is available.
    ///
    /// After a `shutdown` the pool reconstructs itself here. A pooled socket
    /// found closed is replaced by a freshly opened one rather than handed
    /// out dead.
    pub async fn acquire(&self) -> Result<CommandClient> {
        loop {
            let mut guard = self.state.lock().await;

            if guard.is_none() {
                tracing::debug!("Pool is down, reconstructing");
                *guard = Some(self.build_state().await?);
            }
            let state = guard.as_mut().expect("pool state just ensured");

            if let Some(client) = state.idle.pop_front() {
                state.in_use += 1;
                drop(guard);

                if client.is_open() {
                    return Ok(client);
                }
                tracing::debug!("Pooled socket was closed, substituting a fresh one");
                client.close().await;
                return self.fresh_connection().await;
            }

            if state.idle.len() + state.in_use < self.capacity {
                // Capacity freed up by sockets discarded on release
                state.in_use += 1;
                drop(guard);
                return self.fresh_connection().await;
            }

            drop(guard);
            self.available.notified().await;
        }
    }

    /// Open a replacement socket; on failure the reserved slot is returned
    async fn fresh_connection(&self) -> Result<CommandClient> {
        match CommandClient::connect(&self.server_addr, self.request_timeout).await {
            Ok(client) => Ok(client),
            Err(e) => {
                let mut guard = self.state.lock().await;
                if let Some(state) = guard.as_mut() {
                    state.in_use = state.in_use.saturating_sub(1);
                }
                self.available.notify_one();
                Err(e)
            }
        }
    }

    /// Return a socket to the pool; a closed socket is discarded
    pub async fn release(&self, client: CommandClient) {
        let mut guard = self.state.lock().await;
        match guard.as_mut() {
            Some(state) => {
                state.in_use = state.in_use.saturating_sub(1);
                if client.is_open() {
                    state.idle.push_back(client);
                } else {
                    tracing::debug!("Discarding closed socket on release");
                }
                self.available.notify_one();
            }
            None => {
                // Pool was shut down while this socket was out
                drop(guard);
                client.close().await;
            }
        }
    }

    /// One pooled exchange with the dispatcher.
    ///
    /// A transport failure that points at a defunct runtime context rebuilds
    /// the whole pool; the error is still returned — a timed-out or failed
    /// request is never retried here.
    pub async fn request(&self, envelope: &Envelope) -> Result<ReplyEnvelope> {
        let mut client = self.acquire().await?;
        let result = client.request(envelope).await;

        match &result {
            Err(Error::Transport(message)) if is_runtime_mismatch(message) => {
                tracing::warn!("Pooled socket bound to a defunct runtime, reinitializing pool");
                client.close().await;
                if let Err(e) = self.reinitialize().await {
                    tracing::error!("Pool reinitialization failed: {}", e);
                }
            }
            _ => self.release(client).await,
        }

        result
    }

    /// Throw away every socket and rebuild the pool at full capacity
    pub async fn reinitialize(&self) -> Result<()> {
        let mut guard = self.state.lock().await;
        if let Some(state) = guard.take() {
            for client in state.idle {
                client.close().await;
            }
        }
        *guard = Some(self.build_state().await?);
        drop(guard);
        self.available.notify_waiters();
        Ok(())
    }

    /// Drain and close every pooled socket. The next use reconstructs the
    /// pool lazily.
    pub async fn shutdown(&self) {
        let mut guard = self.state.lock().await;
        if let Some(state) = guard.take() {
            for client in state.idle {
                client.close().await;
            }
        }
        drop(guard);
        self.available.notify_waiters();
        tracing::info!("Connection pool shut down");
    }
}

/// Does this transport failure smell like a socket whose creating runtime is
/// gone?
fn is_runtime_mismatch(message: &str) -> bool {
    message.contains("reactor") || message.contains("runtime")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::{SinkExt, StreamExt};
    use serde_json::json;
    use tokio::net::TcpListener;
    use tokio_util::codec::{Framed, LengthDelimitedCodec};

    /// Minimal dispatcher stand-in: answers every envelope with 200
    async fn echo_server() -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        // Connections are served one at a time so aborting the task tears
        // the whole server down, live connection included
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let mut framed = Framed::new(stream, LengthDelimitedCodec::new());
                while let Some(Ok(frame)) = framed.next().await {
                    let envelope: Envelope = match serde_json::from_slice(&frame) {
                        Ok(envelope) => envelope,
                        Err(_) => break,
                    };
                    let reply = ReplyEnvelope::ok(json!({ "echo": envelope.command }));
                    let payload = serde_json::to_vec(&reply).unwrap();
                    if framed.send(Bytes::from(payload)).await.is_err() {
                        break;
                    }
                }
            }
        });
        (addr, handle)
    }

    fn small_config(capacity: usize) -> PoolConfig {
        PoolConfig {
            capacity,
            request_timeout_secs: 2,
        }
    }

    #[tokio::test]
    async fn test_pooled_request() {
        let (addr, server) = echo_server().await;
        let pool = ConnectionPool::connect(&addr, &small_config(2)).await.unwrap();

        let reply = pool.request(&Envelope::bare("status")).await.unwrap();
        assert_eq!(reply.data["echo"], "status");

        server.abort();
    }

    #[tokio::test]
    async fn test_never_more_than_capacity_outstanding() {
        let (addr, server) = echo_server().await;
        let pool = std::sync::Arc::new(
            ConnectionPool::connect(&addr, &small_config(2)).await.unwrap(),
        );

        let first = pool.acquire().await.unwrap();
        let second = pool.acquire().await.unwrap();

        // Third acquire must suspend until a release
        let waiter = {
            let pool = std::sync::Arc::clone(&pool);
            tokio::spawn(async move { pool.acquire().await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!waiter.is_finished());

        pool.release(first).await;
        let third = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        pool.release(second).await;
        pool.release(third).await;
        server.abort();
    }

    #[tokio::test]
    async fn test_shutdown_then_lazy_reconstruction() {
        let (addr, server) = echo_server().await;
        let pool = ConnectionPool::connect(&addr, &small_config(2)).await.unwrap();

        pool.shutdown().await;

        // Next use reconstructs transparently
        let reply = pool.request(&Envelope::bare("status")).await.unwrap();
        assert_eq!(reply.data["echo"], "status");

        server.abort();
    }

    #[tokio::test]
    async fn test_closed_socket_substituted_on_acquire() {
        let (addr, server) = echo_server().await;
        let pool = ConnectionPool::connect(&addr, &small_config(1)).await.unwrap();

        // Poison the pooled socket by killing the server between requests
        let client = pool.acquire().await.unwrap();
        pool.release(client).await;
        server.abort();

        // The socket is still "open" from our side; a request on it fails as
        // a transport error (not a runtime mismatch), and the pool keeps
        // working once a server is back. What must not happen is a dead
        // socket being handed out after it was *detected* closed.
        let mut client = pool.acquire().await.unwrap();
        let result = client.request(&Envelope::bare("status")).await;
        assert!(result.is_err());
        assert!(!client.is_open());
        pool.release(client).await;

        // Dead socket was discarded; the pool replaces it with a fresh
        // connection to a revived server on the same address
        let listener = TcpListener::bind(&addr).await.unwrap();
        let revived = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, LengthDelimitedCodec::new());
            if let Some(Ok(_frame)) = framed.next().await {
                let reply = ReplyEnvelope::ok(json!({ "echo": "back" }));
                let payload = serde_json::to_vec(&reply).unwrap();
                let _ = framed.send(Bytes::from(payload)).await;
            }
        });

        let reply = pool.request(&Envelope::bare("status")).await.unwrap();
        assert_eq!(reply.data["echo"], "back");
        revived.await.unwrap();
    }

    #[tokio::test]
    async fn test_reinitialize_restores_full_capacity() {
        let (addr, server) = echo_server().await;
        let pool = ConnectionPool::connect(&addr, &small_config(3)).await.unwrap();

        let client = pool.acquire().await.unwrap();
        drop(client); // lose a socket without releasing

        pool.reinitialize().await.unwrap();

        // All three slots usable again
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        let c = pool.acquire().await.unwrap();
        pool.release(a).await;
        pool.release(b).await;
        pool.release(c).await;

        server.abort();
    }
}
