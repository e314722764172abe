//! Metadata Service
//!
//! Owns the inode table and the placement engine and answers the
//! namespace and file RPCs. The table sits behind one reader/writer
//! lock; file content operations only hold it to resolve and to commit,
//! and serialize per file through the content gates instead.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use super::gate::FileGates;
use super::monitor::{HealthRegistry, LivenessMonitor, MonitorHandle};
use super::snapshot;
use crate::config::WolfDfsConfig;
use crate::error::{Error, Result};
use crate::namespace::{DirEntry, DirectoryRef, Inode, InodeId, InodeInfo, InodeTable};
use crate::network::{Message, RequestHandler};
use crate::placement::{ChunkTransport, PlacementEngine};

/// Where and how the inode table is persisted
#[derive(Debug, Clone)]
pub struct SnapshotSettings {
    pub path: PathBuf,
    pub compress: bool,
}

/// The metadata authority
pub struct MetadataService {
    node_id: String,
    table: RwLock<InodeTable>,
    engine: PlacementEngine,
    gates: FileGates,
    health: HealthRegistry,
    snapshot: SnapshotSettings,
    /// Serializes snapshot writers so an older table never lands last
    snapshot_writer: Mutex<()>,
}

impl MetadataService {
    pub fn new(
        node_id: impl Into<String>,
        table: InodeTable,
        engine: PlacementEngine,
        snapshot: SnapshotSettings,
    ) -> Self {
        let health = HealthRegistry::new(engine.data_nodes());
        Self {
            node_id: node_id.into(),
            table: RwLock::new(table),
            engine,
            gates: FileGates::new(),
            health,
            snapshot,
            snapshot_writer: Mutex::new(()),
        }
    }

    /// Build from configuration, restoring the last snapshot if there is one
    pub fn from_config(config: &WolfDfsConfig, transport: Arc<dyn ChunkTransport>) -> Result<Self> {
        config.validate_metadata()?;

        let engine = PlacementEngine::new(
            config.metadata.data_nodes.clone(),
            config.metadata.chunk_size,
            transport,
        )?;
        let snapshot = SnapshotSettings {
            path: config.snapshot_path(),
            compress: config.metadata.snapshot_compression,
        };
        let table = snapshot::load_or_default(&snapshot.path);

        Ok(Self::new(config.node.id.clone(), table, engine, snapshot))
    }

    /// Start heartbeating the data nodes
    pub fn spawn_monitor(&self, interval: Duration) -> MonitorHandle {
        LivenessMonitor::new(self.engine.transport(), self.health.clone(), interval).spawn()
    }

    pub fn health(&self) -> &HealthRegistry {
        &self.health
    }

    pub fn chunk_size(&self) -> usize {
        self.engine.chunk_size()
    }

    /// Create a file or directory under `parent_id` (root when absent)
    pub async fn create_file(&self, parent_id: Option<&str>, name: &str, is_dir: bool) -> Result<DirEntry> {
        let parent = InodeId::or_root(parent_id);
        self.table.write().await.create_entry(&parent, name, is_dir)
    }

    pub async fn list_dir(&self, target: &DirectoryRef) -> Result<Vec<DirEntry>> {
        self.table.read().await.list_directory(target)
    }

    pub async fn change_dir(&self, current: &str, target: &str) -> Result<DirEntry> {
        let current = InodeId::or_root(Some(current));
        self.table.read().await.change_directory(&current, target)
    }

    pub async fn get_inode(&self, id: &str) -> Result<InodeInfo> {
        self.table
            .read()
            .await
            .resolve(&InodeId::new(id))
            .map(Inode::info)
    }

    async fn resolve_file(&self, directory_id: Option<&str>, file_name: &str) -> Result<InodeId> {
        let dir = InodeId::or_root(directory_id);
        let table = self.table.read().await;
        Ok(table.lookup_file(&dir, file_name)?.id.clone())
    }

    /// Replace the content of an existing file
    pub async fn write_file(&self, directory_id: Option<&str>, file_name: &str, data: &[u8]) -> Result<()> {
        let file_id = self.resolve_file(directory_id, file_name).await?;
        let _gate = self.gates.write(&file_id).await;

        let chunk_ids = self.engine.place(&file_id, data).await?;
        let chunk_count = chunk_ids.len();

        let previous = self
            .table
            .write()
            .await
            .commit_content(&file_id, chunk_ids, data.len() as u64)?;

        // Still under the gate so a concurrent writer cannot lose chunks
        self.engine.retire(&previous, chunk_count).await;

        tracing::debug!("Wrote {} bytes to '{}' ({})", data.len(), file_name, file_id);
        Ok(())
    }

    /// Read the full content of a file
    pub async fn read_file(&self, directory_id: Option<&str>, file_name: &str) -> Result<Vec<u8>> {
        let file_id = self.resolve_file(directory_id, file_name).await?;
        let _gate = self.gates.read(&file_id).await;

        let chunk_ids = self.table.read().await.resolve(&file_id)?.chunk_ids().to_vec();
        let data = self.engine.reassemble(&chunk_ids).await?;

        self.table.write().await.mark_accessed(&file_id)?;
        Ok(data)
    }

    pub async fn inode_count(&self) -> usize {
        self.table.read().await.len()
    }

    /// Persist the inode table. The table is encoded under the read lock;
    /// the file is written on the blocking pool after the lock is released.
    pub async fn save_snapshot(&self) -> Result<usize> {
        let _writer = self.snapshot_writer.lock().await;

        let (bytes, inodes) = {
            let table = self.table.read().await;
            (snapshot::encode(&table, self.snapshot.compress)?, table.len())
        };

        let path = self.snapshot.path.clone();
        let written = bytes.len();
        tokio::task::spawn_blocking(move || snapshot::write_encoded(&path, &bytes))
            .await
            .map_err(|e| Error::Internal(format!("snapshot task failed: {}", e)))??;

        tracing::debug!(
            "Saved snapshot of {} inodes to {:?} ({} bytes)",
            inodes,
            self.snapshot.path,
            written
        );
        Ok(written)
    }

    async fn dispatch(&self, message: Message) -> Result<Message> {
        match message {
            Message::CreateFile { parent_id, name, is_dir } => {
                let entry = self.create_file(parent_id.as_deref(), &name, is_dir).await?;
                Ok(Message::CreateFileResponse {
                    id: entry.id.to_string(),
                    name: entry.name,
                })
            }

            Message::ListDir { directory_id, parent_id, directory_name } => {
                let target = DirectoryRef::from_request(
                    directory_id.as_deref(),
                    parent_id.as_deref(),
                    directory_name.as_deref(),
                )?;
                let entries = self.list_dir(&target).await?;
                Ok(Message::ListDirResponse { entries })
            }

            Message::ChangeDir { current_directory_id, target } => {
                let entry = self.change_dir(&current_directory_id, &target).await?;
                Ok(Message::ChangeDirResponse {
                    directory_id: entry.id.to_string(),
                    directory_name: entry.name,
                })
            }

            Message::GetInode { id } => Ok(Message::InodeResponse {
                inode: self.get_inode(&id).await?,
            }),

            Message::WriteFile { current_directory_id, file_name, data } => {
                self.write_file(current_directory_id.as_deref(), &file_name, &data).await?;
                Ok(Message::WriteFileResponse { file_name })
            }

            Message::ReadFile { current_directory_id, file_name } => {
                let data = self.read_file(current_directory_id.as_deref(), &file_name).await?;
                Ok(Message::ReadFileResponse { data })
            }

            Message::StatusRequest => Ok(Message::StatusResponse {
                node_id: self.node_id.clone(),
                inode_count: self.inode_count().await,
                chunk_size: self.chunk_size(),
                data_nodes: self.health.statuses().await,
            }),

            Message::SnapshotRequest => {
                self.save_snapshot().await?;
                Ok(Message::Ack)
            }

            other => Err(Error::InvalidArgument(format!(
                "{} is not a metadata request",
                other.type_name()
            ))),
        }
    }
}

#[async_trait::async_trait]
impl RequestHandler for MetadataService {
    async fn handle(&self, peer: &str, message: Message) -> Message {
        let request = message.type_name();
        match self.dispatch(message).await {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!("{} from {} failed: {}", request, peer, e);
                Message::error(&e)
            }
        }
    }
}
