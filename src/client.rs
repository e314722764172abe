//! Metadata Client
//!
//! Client-side handle on the metadata authority. Keeps track of a
//! current directory the way a shell does, so names passed to the file
//! operations are resolved relative to it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::namespace::{DirEntry, InodeId, InodeInfo};
use crate::network::{DataNodeStatus, Message, NetworkClient};

/// Status reported by the metadata authority
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataStatus {
    pub node_id: String,
    pub inode_count: usize,
    pub chunk_size: usize,
    pub data_nodes: Vec<DataNodeStatus>,
}

pub struct MetadataClient {
    network: NetworkClient,
    address: String,
    current: DirEntry,
}

impl MetadataClient {
    /// Client for the metadata authority at `address`, starting at the root
    pub fn new(address: impl Into<String>, connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            network: NetworkClient::new(connect_timeout, request_timeout),
            address: address.into(),
            current: DirEntry {
                name: "/".to_string(),
                id: InodeId::root(),
                is_dir: true,
            },
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Current directory
    pub fn pwd(&self) -> &DirEntry {
        &self.current
    }

    async fn call(&self, request: Message) -> Result<Message> {
        match self.network.send(&self.address, request).await? {
            Message::Error { code, message } => Err(Error::from_remote(code, message)),
            response => Ok(response),
        }
    }

    fn unexpected(response: Message) -> Error {
        Error::Network(format!("unexpected response: {}", response.type_name()))
    }

    /// Create a file or directory inside `parent` (current directory when `None`)
    pub async fn create_in(&self, parent: Option<&InodeId>, name: &str, is_dir: bool) -> Result<DirEntry> {
        let parent = parent.unwrap_or(&self.current.id);
        let request = Message::CreateFile {
            parent_id: Some(parent.to_string()),
            name: name.to_string(),
            is_dir,
        };

        match self.call(request).await? {
            Message::CreateFileResponse { id, name } => Ok(DirEntry {
                name,
                id: InodeId::new(id),
                is_dir,
            }),
            other => Err(Self::unexpected(other)),
        }
    }

    /// Create an empty file in the current directory
    pub async fn create_file(&self, name: &str) -> Result<DirEntry> {
        self.create_in(None, name, false).await
    }

    /// Create a directory in the current directory
    pub async fn mkdir(&self, name: &str) -> Result<DirEntry> {
        self.create_in(None, name, true).await
    }

    async fn list(&self, request: Message) -> Result<Vec<DirEntry>> {
        match self.call(request).await? {
            Message::ListDirResponse { mut entries } => {
                entries.sort_by(|a, b| a.name.cmp(&b.name));
                Ok(entries)
            }
            other => Err(Self::unexpected(other)),
        }
    }

    /// List a directory by id (current directory when `None`), sorted by name
    pub async fn list_dir(&self, directory: Option<&InodeId>) -> Result<Vec<DirEntry>> {
        let directory = directory.unwrap_or(&self.current.id);
        self.list(Message::ListDir {
            directory_id: Some(directory.to_string()),
            parent_id: None,
            directory_name: None,
        })
        .await
    }

    /// List the directory called `name` inside `parent`
    pub async fn list_child(&self, parent: &InodeId, name: &str) -> Result<Vec<DirEntry>> {
        self.list(Message::ListDir {
            directory_id: None,
            parent_id: Some(parent.to_string()),
            directory_name: Some(name.to_string()),
        })
        .await
    }

    /// One `cd` step: `..`, `.`, empty for root, or a child name
    pub async fn change_dir(&mut self, target: &str) -> Result<DirEntry> {
        let request = Message::ChangeDir {
            current_directory_id: self.current.id.to_string(),
            target: target.to_string(),
        };

        match self.call(request).await? {
            Message::ChangeDirResponse { directory_id, directory_name } => {
                self.current = DirEntry {
                    name: directory_name,
                    id: InodeId::new(directory_id),
                    is_dir: true,
                };
                Ok(self.current.clone())
            }
            other => Err(Self::unexpected(other)),
        }
    }

    /// Walk a slash-separated path one `cd` at a time. A leading slash
    /// starts from the root. On failure the current directory is restored.
    pub async fn change_path(&mut self, path: &str) -> Result<DirEntry> {
        let start = self.current.clone();

        let result: Result<DirEntry> = async {
            if path.starts_with('/') {
                self.change_dir("").await?;
            }
            for component in path.split('/').filter(|c| !c.is_empty()) {
                self.change_dir(component).await?;
            }
            Ok(self.current.clone())
        }
        .await;

        if result.is_err() {
            self.current = start;
        }
        result
    }

    /// Replace the content of `name` in the current directory
    pub async fn write_file(&self, name: &str, data: Vec<u8>) -> Result<()> {
        let request = Message::WriteFile {
            current_directory_id: Some(self.current.id.to_string()),
            file_name: name.to_string(),
            data,
        };

        match self.call(request).await? {
            Message::WriteFileResponse { .. } => Ok(()),
            other => Err(Self::unexpected(other)),
        }
    }

    /// Read the content of `name` in the current directory
    pub async fn read_file(&self, name: &str) -> Result<Vec<u8>> {
        let request = Message::ReadFile {
            current_directory_id: Some(self.current.id.to_string()),
            file_name: name.to_string(),
        };

        match self.call(request).await? {
            Message::ReadFileResponse { data } => Ok(data),
            other => Err(Self::unexpected(other)),
        }
    }

    pub async fn get_inode(&self, id: &InodeId) -> Result<InodeInfo> {
        match self.call(Message::GetInode { id: id.to_string() }).await? {
            Message::InodeResponse { inode } => Ok(inode),
            other => Err(Self::unexpected(other)),
        }
    }

    pub async fn status(&self) -> Result<MetadataStatus> {
        match self.call(Message::StatusRequest).await? {
            Message::StatusResponse { node_id, inode_count, chunk_size, data_nodes } => {
                Ok(MetadataStatus {
                    node_id,
                    inode_count,
                    chunk_size,
                    data_nodes,
                })
            }
            other => Err(Self::unexpected(other)),
        }
    }

    /// Ask the authority to write its snapshot now
    pub async fn snapshot(&self) -> Result<()> {
        match self.call(Message::SnapshotRequest).await? {
            Message::Ack => Ok(()),
            other => Err(Self::unexpected(other)),
        }
    }
}
