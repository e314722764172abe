//! Chunk transport
//!
//! The seam between the placement engine and the data nodes. The
//! production implementation speaks the wire protocol through a
//! `NetworkClient`.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::namespace::ChunkId;
use crate::network::{Message, NetworkClient};

/// Chunk operations against one data node address
#[async_trait::async_trait]
pub trait ChunkTransport: Send + Sync {
    /// Store `data` under `chunk_id` on `node`
    async fn write_chunk(&self, node: &str, chunk_id: &ChunkId, data: Vec<u8>) -> Result<()>;

    /// Fetch the bytes stored under `chunk_id` on `node`
    async fn read_chunk(&self, node: &str, chunk_id: &ChunkId) -> Result<Vec<u8>>;

    /// Remove `chunk_id` from `node`
    async fn delete_chunk(&self, node: &str, chunk_id: &ChunkId) -> Result<()>;

    /// Liveness probe
    async fn heartbeat(&self, node: &str) -> Result<()>;
}

/// Transport over the TCP wire protocol
pub struct RemoteChunkTransport {
    client: Arc<NetworkClient>,
}

impl RemoteChunkTransport {
    pub fn new(client: Arc<NetworkClient>) -> Self {
        Self { client }
    }
}

/// Interpret a response that should be a bare `Ack`
fn expect_ack(node: &str, response: Message) -> Result<()> {
    match response {
        Message::Ack => Ok(()),
        Message::Error { code, message } => Err(Error::from_remote(code, message)),
        other => Err(Error::Network(format!(
            "unexpected {} from {}",
            other.type_name(),
            node
        ))),
    }
}

#[async_trait::async_trait]
impl ChunkTransport for RemoteChunkTransport {
    async fn write_chunk(&self, node: &str, chunk_id: &ChunkId, data: Vec<u8>) -> Result<()> {
        let request = Message::WriteChunk {
            chunk_id: chunk_id.to_string(),
            data,
        };
        expect_ack(node, self.client.send(node, request).await?)
    }

    async fn read_chunk(&self, node: &str, chunk_id: &ChunkId) -> Result<Vec<u8>> {
        let request = Message::ReadChunk {
            chunk_id: chunk_id.to_string(),
        };
        match self.client.send(node, request).await? {
            Message::ChunkData { data } => Ok(data),
            Message::Error { code, message } => Err(Error::from_remote(code, message)),
            other => Err(Error::Network(format!(
                "unexpected {} from {}",
                other.type_name(),
                node
            ))),
        }
    }

    async fn delete_chunk(&self, node: &str, chunk_id: &ChunkId) -> Result<()> {
        let request = Message::DeleteChunk {
            chunk_id: chunk_id.to_string(),
        };
        expect_ack(node, self.client.send(node, request).await?)
    }

    async fn heartbeat(&self, node: &str) -> Result<()> {
        expect_ack(node, self.client.send(node, Message::Heartbeat).await?)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory transport that records which node every call went to

    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Write(String, String),
        Read(String, String),
        Delete(String, String),
        Heartbeat(String),
    }

    #[derive(Default)]
    pub struct MemoryTransport {
        /// node -> chunk id -> bytes
        pub blobs: Mutex<HashMap<String, HashMap<String, Vec<u8>>>>,
        pub calls: Mutex<Vec<Call>>,
        /// Nodes that fail every call
        pub down: Mutex<HashSet<String>>,
    }

    impl MemoryTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn take_down(&self, node: &str) {
            self.down.lock().unwrap().insert(node.to_string());
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn clear_calls(&self) {
            self.calls.lock().unwrap().clear();
        }

        pub fn stored_on(&self, node: &str) -> Vec<String> {
            let mut ids: Vec<String> = self
                .blobs
                .lock()
                .unwrap()
                .get(node)
                .map(|m| m.keys().cloned().collect())
                .unwrap_or_default();
            ids.sort();
            ids
        }

        fn check(&self, node: &str) -> Result<()> {
            if self.down.lock().unwrap().contains(node) {
                return Err(Error::ConnectionFailed {
                    address: node.to_string(),
                    reason: "node down".into(),
                });
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl ChunkTransport for MemoryTransport {
        async fn write_chunk(&self, node: &str, chunk_id: &ChunkId, data: Vec<u8>) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Write(node.to_string(), chunk_id.to_string()));
            self.check(node)?;
            self.blobs
                .lock()
                .unwrap()
                .entry(node.to_string())
                .or_default()
                .insert(chunk_id.to_string(), data);
            Ok(())
        }

        async fn read_chunk(&self, node: &str, chunk_id: &ChunkId) -> Result<Vec<u8>> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Read(node.to_string(), chunk_id.to_string()));
            self.check(node)?;
            self.blobs
                .lock()
                .unwrap()
                .get(node)
                .and_then(|m| m.get(chunk_id.as_str()).cloned())
                .ok_or_else(|| Error::ChunkNotFound(chunk_id.to_string()))
        }

        async fn delete_chunk(&self, node: &str, chunk_id: &ChunkId) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Delete(node.to_string(), chunk_id.to_string()));
            self.check(node)?;
            self.blobs
                .lock()
                .unwrap()
                .get_mut(node)
                .and_then(|m| m.remove(chunk_id.as_str()))
                .map(|_| ())
                .ok_or_else(|| Error::ChunkNotFound(chunk_id.to_string()))
        }

        async fn heartbeat(&self, node: &str) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::Heartbeat(node.to_string()));
            self.check(node)
        }
    }
}
