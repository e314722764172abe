//! Network Server
//!
//! TCP server answering framed request messages. Every connection is
//! served on its own task; requests on one connection are answered in
//! order. After `stop`, `drain` waits for those tasks so no request is
//! still being handled when the caller tears down.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;

use super::{read_message, write_message};
use super::protocol::Message;
use crate::error::{Error, Result};

/// Request handler implemented by the metadata and data node services
#[async_trait::async_trait]
pub trait RequestHandler: Send + Sync + 'static {
    /// Produce the response for one request
    async fn handle(&self, peer: &str, message: Message) -> Message;
}

/// Network server for RPC traffic
pub struct NetworkServer {
    /// Bound listener
    listener: TcpListener,
    /// Actual bound address (resolves port 0)
    local_addr: SocketAddr,
    /// Request handler
    handler: Arc<dyn RequestHandler>,
    /// Shutdown signal
    shutdown: watch::Sender<bool>,
    /// Connection tasks
    connections: Mutex<JoinSet<()>>,
}

impl NetworkServer {
    /// Bind the listener
    pub async fn bind(bind_address: &str, handler: Arc<dyn RequestHandler>) -> Result<Self> {
        let listener = TcpListener::bind(bind_address).await.map_err(|e| {
            Error::Network(format!("Failed to bind {}: {}", bind_address, e))
        })?;
        let local_addr = listener.local_addr()?;
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            listener,
            local_addr,
            handler,
            shutdown,
            connections: Mutex::new(JoinSet::new()),
        })
    }

    fn connections(&self) -> MutexGuard<'_, JoinSet<()>> {
        self.connections.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Address the server is listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until `stop` is called
    pub async fn run(&self) -> Result<()> {
        tracing::info!("Network server listening on {}", self.local_addr);

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((socket, addr)) => {
                            let peer_addr = addr.to_string();
                            let handler = Arc::clone(&self.handler);
                            let conn_shutdown = self.shutdown.subscribe();

                            let mut connections = self.connections();
                            while connections.try_join_next().is_some() {}
                            connections.spawn(async move {
                                if let Err(e) = handle_connection(socket, peer_addr.clone(), handler, conn_shutdown).await {
                                    tracing::warn!("Connection error from {}: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Network server on {} stopped", self.local_addr);
        Ok(())
    }

    /// Stop accepting connections and close idle ones
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Wait until every connection task has finished its current request
    /// and exited. Only meaningful after `stop`.
    pub async fn drain(&self) {
        let mut connections = std::mem::take(&mut *self.connections());
        if connections.is_empty() {
            return;
        }

        tracing::info!("Waiting for {} connections on {} to finish", connections.len(), self.local_addr);
        while let Some(result) = connections.join_next().await {
            if let Err(e) = result {
                tracing::warn!("Connection task failed: {}", e);
            }
        }
    }
}

/// Serve one connection until the peer hangs up or the server stops
async fn handle_connection(
    socket: TcpStream,
    peer_addr: String,
    handler: Arc<dyn RequestHandler>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    socket.set_nodelay(true)?;
    let (mut reader, mut writer) = socket.into_split();

    loop {
        // Requests already buffered are answered with ShuttingDown below
        let message = tokio::select! {
            biased;
            result = read_message(&mut reader) => result,
            _ = shutdown.changed() => break,
        };

        match message {
            Ok(request) => {
                tracing::trace!("Received {} from {}", request.type_name(), peer_addr);
                let response = if *shutdown.borrow() {
                    Message::error(&Error::ShuttingDown)
                } else {
                    handler.handle(&peer_addr, request).await
                };
                write_message(&mut writer, &response).await?;
            }
            Err(Error::Io(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                // Connection closed
                break;
            }
            Err(e) => {
                tracing::warn!("Error reading message from {}: {}", peer_addr, e);
                break;
            }
        }
    }

    Ok(())
}
