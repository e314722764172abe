//! Wire Protocol
//!
//! Defines the messages exchanged between clients, the metadata
//! authority and the data nodes.

use serde::{Deserialize, Serialize};

use crate::namespace::{DirEntry, InodeInfo};

/// Protocol messages. Requests and responses share one enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    // ========== Namespace ==========
    /// Create a file or directory
    CreateFile {
        parent_id: Option<String>,
        name: String,
        is_dir: bool,
    },

    /// Created entry
    CreateFileResponse { id: String, name: String },

    /// List a directory by id, or by parent id + name
    ListDir {
        directory_id: Option<String>,
        parent_id: Option<String>,
        directory_name: Option<String>,
    },

    /// Directory listing
    ListDirResponse { entries: Vec<DirEntry> },

    /// Resolve a `cd` target relative to the current directory
    ChangeDir {
        current_directory_id: String,
        target: String,
    },

    /// Resulting directory
    ChangeDirResponse {
        directory_id: String,
        directory_name: String,
    },

    /// Fetch an inode's attributes
    GetInode { id: String },

    /// Inode attributes
    InodeResponse { inode: InodeInfo },

    // ========== File content ==========
    /// Replace the content of a file
    WriteFile {
        current_directory_id: Option<String>,
        file_name: String,
        data: Vec<u8>,
    },

    /// Write acknowledgement
    WriteFileResponse { file_name: String },

    /// Read the content of a file
    ReadFile {
        current_directory_id: Option<String>,
        file_name: String,
    },

    /// File content
    ReadFileResponse { data: Vec<u8> },

    // ========== Administration ==========
    /// Status request
    StatusRequest,

    /// Status response
    StatusResponse {
        node_id: String,
        inode_count: usize,
        chunk_size: usize,
        data_nodes: Vec<DataNodeStatus>,
    },

    /// Write the inode table snapshot now
    SnapshotRequest,

    // ========== Data node ==========
    /// Store a chunk
    WriteChunk { chunk_id: String, data: Vec<u8> },

    /// Fetch a chunk
    ReadChunk { chunk_id: String },

    /// Chunk content
    ChunkData { data: Vec<u8> },

    /// Remove a chunk
    DeleteChunk { chunk_id: String },

    /// Liveness probe
    Heartbeat,

    // ========== Generic ==========
    /// Success without payload
    Ack,

    /// Error response
    Error { code: ErrorCode, message: String },
}

/// Health of one data node as reported by the liveness monitor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataNodeStatus {
    pub address: String,
    pub status: String,
    pub consecutive_failures: u32,
    /// Milliseconds since the last successful heartbeat
    pub last_seen_ms: Option<u64>,
}

/// Error codes carried by `Message::Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    NotFound,
    AlreadyExists,
    NotADirectory,
    IsDirectory,
    InvalidArgument,
    ChunkNotFound,
    Io,
    /// A downstream node could not be reached
    Unavailable,
    ShuttingDown,
    Internal,
}

impl Message {
    /// Serialize message to bytes
    pub fn serialize(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize message from bytes
    pub fn deserialize(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    /// Build an error response from a local error
    pub fn error(err: &crate::Error) -> Self {
        Message::Error {
            code: err.code(),
            message: err.detail(),
        }
    }

    /// Get the message type name (for logging)
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::CreateFile { .. } => "CreateFile",
            Message::CreateFileResponse { .. } => "CreateFileResponse",
            Message::ListDir { .. } => "ListDir",
            Message::ListDirResponse { .. } => "ListDirResponse",
            Message::ChangeDir { .. } => "ChangeDir",
            Message::ChangeDirResponse { .. } => "ChangeDirResponse",
            Message::GetInode { .. } => "GetInode",
            Message::InodeResponse { .. } => "InodeResponse",
            Message::WriteFile { .. } => "WriteFile",
            Message::WriteFileResponse { .. } => "WriteFileResponse",
            Message::ReadFile { .. } => "ReadFile",
            Message::ReadFileResponse { .. } => "ReadFileResponse",
            Message::StatusRequest => "StatusRequest",
            Message::StatusResponse { .. } => "StatusResponse",
            Message::SnapshotRequest => "SnapshotRequest",
            Message::WriteChunk { .. } => "WriteChunk",
            Message::ReadChunk { .. } => "ReadChunk",
            Message::ChunkData { .. } => "ChunkData",
            Message::DeleteChunk { .. } => "DeleteChunk",
            Message::Heartbeat => "Heartbeat",
            Message::Ack => "Ack",
            Message::Error { .. } => "Error",
        }
    }
}

/// Frame header for length-prefixed messages
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    /// Message length
    pub length: u32,
    /// Message checksum
    pub checksum: u32,
}

impl FrameHeader {
    /// Header size in bytes
    pub const SIZE: usize = 8;

    /// Largest body accepted from the wire
    pub const MAX_BODY: u32 = 64 * 1024 * 1024;

    /// Create a new frame header
    pub fn new(data: &[u8]) -> Self {
        Self {
            length: data.len() as u32,
            checksum: crc32fast::hash(data),
        }
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.length.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    /// Deserialize header from bytes
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        let [l0, l1, l2, l3, c0, c1, c2, c3] = *bytes;
        Self {
            length: u32::from_le_bytes([l0, l1, l2, l3]),
            checksum: u32::from_le_bytes([c0, c1, c2, c3]),
        }
    }
}
