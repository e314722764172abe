//! Network Client
//!
//! TCP client for request/response RPCs with bounded connect and
//! request times. Idle connections are pooled per address and reused.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;

use super::{read_message, write_message};
use super::protocol::Message;
use crate::error::{Error, Result};

/// Idle connections kept per peer
const MAX_IDLE_PER_PEER: usize = 4;

/// Pooled connections idle longer than this are dropped instead of reused
const MAX_IDLE_TIME: Duration = Duration::from_secs(60);

/// Idle pooled connection
struct PoolEntry {
    stream: TcpStream,
    last_used: Instant,
}

/// Network client for talking to metadata and data nodes
pub struct NetworkClient {
    /// Idle connections: address -> streams
    pool: Mutex<HashMap<String, Vec<PoolEntry>>>,
    /// Connection timeout
    connect_timeout: Duration,
    /// Request timeout
    request_timeout: Duration,
}

impl NetworkClient {
    /// Create a new network client
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            pool: Mutex::new(HashMap::new()),
            connect_timeout,
            request_timeout,
        }
    }

    /// Send a message to a peer and wait for the response.
    /// The whole exchange is bounded by the request timeout.
    pub async fn send(&self, address: &str, message: Message) -> Result<Message> {
        match timeout(self.request_timeout, self.send_inner(address, message)).await {
            Ok(inner_result) => inner_result,
            Err(_) => Err(Error::ConnectionTimeout(address.to_string())),
        }
    }

    /// Send without timeout wrapper
    async fn send_inner(&self, address: &str, message: Message) -> Result<Message> {
        // A pooled stream may have been closed by the peer; retry once on a fresh one
        if let Some(mut entry) = self.checkout(address).await {
            match exchange(&mut entry.stream, &message).await {
                Ok(response) => {
                    self.checkin(address, entry.stream).await;
                    return Ok(response);
                }
                Err(e) => {
                    tracing::debug!("Pooled connection to {} failed ({}), reconnecting", address, e);
                }
            }
        }

        let mut stream = self.connect(address).await?;
        let response = exchange(&mut stream, &message).await?;
        self.checkin(address, stream).await;
        Ok(response)
    }

    /// Connect to an address
    async fn connect(&self, address: &str) -> Result<TcpStream> {
        let result = timeout(self.connect_timeout, TcpStream::connect(address)).await;

        match result {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true)?;
                Ok(stream)
            }
            Ok(Err(e)) => Err(Error::ConnectionFailed {
                address: address.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(Error::ConnectionTimeout(address.to_string())),
        }
    }

    /// Take an idle connection from the pool, dropping stale ones
    async fn checkout(&self, address: &str) -> Option<PoolEntry> {
        let mut pool = self.pool.lock().await;
        let idle = pool.get_mut(address)?;

        let before = idle.len();
        idle.retain(|e| e.last_used.elapsed() <= MAX_IDLE_TIME);
        if idle.len() != before {
            tracing::debug!("Removed {} stale connections to {}", before - idle.len(), address);
        }
        idle.pop()
    }

    /// Return a connection to the pool
    async fn checkin(&self, address: &str, stream: TcpStream) {
        let mut pool = self.pool.lock().await;
        let idle = pool.entry(address.to_string()).or_default();
        if idle.len() < MAX_IDLE_PER_PEER {
            idle.push(PoolEntry {
                stream,
                last_used: Instant::now(),
            });
        }
    }

    /// Number of idle pooled connections
    pub async fn connection_count(&self) -> usize {
        self.pool.lock().await.values().map(Vec::len).sum()
    }
}

/// One request/response exchange on an open stream
async fn exchange(stream: &mut TcpStream, message: &Message) -> Result<Message> {
    let (mut reader, mut writer) = stream.split();
    write_message(&mut writer, message).await?;
    read_message(&mut reader).await
}
