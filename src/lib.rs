//! WolfDFS - Chunked Distributed File Store
//!
//! A small distributed file store made of one metadata authority and a
//! set of data nodes. The authority owns a single hierarchical namespace
//! of inodes; file content is split into fixed-size chunks spread
//! round-robin over the data nodes.
//!
//! # Architecture
//!
//! Clients only talk to the metadata authority. It resolves names to
//! inodes, places or fetches chunks on the data nodes on the client's
//! behalf, and persists the inode table as a snapshot at shutdown.
//!
//! # Features
//!
//! - Directories, files and shell-style `cd` over one global namespace
//! - Round-robin chunk placement with stateless lookup on read
//! - Checksummed snapshots with optional LZ4 compression
//! - Periodic data node heartbeats
//! - Length-prefixed, CRC-checked TCP wire protocol

pub mod config;
pub mod error;
pub mod namespace;
pub mod network;
pub mod placement;
pub mod metadata;
pub mod datanode;
pub mod client;

pub use config::WolfDfsConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::WolfDfsConfig;
    pub use crate::error::{Error, Result};
    pub use crate::namespace::{DirEntry, Inode, InodeId, InodeInfo, InodeTable};
    pub use crate::placement::PlacementEngine;
    pub use crate::metadata::MetadataService;
    pub use crate::datanode::{ChunkStore, DataNodeService};
    pub use crate::client::MetadataClient;
    pub use crate::network::Message;
}
