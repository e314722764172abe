//! Data Node Service
//!
//! Answers chunk RPCs from the metadata authority against a local
//! `ChunkStore`.

use std::sync::Arc;

use super::store::ChunkStore;
use crate::config::WolfDfsConfig;
use crate::error::{Error, Result};
use crate::network::{Message, RequestHandler};

pub struct DataNodeService {
    node_id: String,
    store: Arc<ChunkStore>,
}

impl DataNodeService {
    pub fn new(node_id: impl Into<String>, store: Arc<ChunkStore>) -> Self {
        Self {
            node_id: node_id.into(),
            store,
        }
    }

    /// Open the chunk directory named by the configuration
    pub fn from_config(config: &WolfDfsConfig) -> Result<Self> {
        let store = ChunkStore::new(config.chunk_dir(), config.data_node.cache_capacity)?;
        Ok(Self::new(config.node.id.clone(), Arc::new(store)))
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    /// Run blocking blob I/O off the async workers
    async fn with_store<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&ChunkStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| Error::Internal(format!("chunk task failed: {}", e)))?
    }

    async fn dispatch(&self, message: Message) -> Result<Message> {
        match message {
            Message::WriteChunk { chunk_id, data } => {
                self.with_store(move |s| s.write(&chunk_id, &data)).await?;
                Ok(Message::Ack)
            }

            Message::ReadChunk { chunk_id } => {
                let data = self.with_store(move |s| s.read(&chunk_id)).await?;
                Ok(Message::ChunkData { data })
            }

            Message::DeleteChunk { chunk_id } => {
                self.with_store(move |s| s.delete(&chunk_id)).await?;
                Ok(Message::Ack)
            }

            Message::Heartbeat => Ok(Message::Ack),

            other => Err(Error::InvalidArgument(format!(
                "{} is not a data node request",
                other.type_name()
            ))),
        }
    }
}

#[async_trait::async_trait]
impl RequestHandler for DataNodeService {
    async fn handle(&self, peer: &str, message: Message) -> Message {
        let request = message.type_name();
        match self.dispatch(message).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("{} from {} failed on {}: {}", request, peer, self.node_id, e);
                Message::error(&e)
            }
        }
    }
}
