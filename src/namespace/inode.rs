//! Inode records
//!
//! An inode is either a directory (name -> child id entries) or a file
//! (ordered chunk id sequence plus byte size). The variant split keeps a
//! directory from ever carrying chunks and a file from ever carrying entries.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identifier of an inode
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InodeId(String);

impl InodeId {
    /// Reserved identifier of the namespace root
    pub const ROOT: &'static str = "root";

    /// The root inode id
    pub fn root() -> Self {
        InodeId(Self::ROOT.to_string())
    }

    /// Allocate a fresh, globally unique id
    pub fn generate() -> Self {
        InodeId(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an existing id
    pub fn new(id: impl Into<String>) -> Self {
        InodeId(id.into())
    }

    /// Interpret an optional id from a request, treating empty as root
    pub fn or_root(id: Option<&str>) -> Self {
        match id {
            Some(id) if !id.is_empty() => InodeId(id.to_string()),
            _ => Self::root(),
        }
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the root id
    pub fn is_root(&self) -> bool {
        self.0 == Self::ROOT
    }
}

impl fmt::Display for InodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a stored chunk: `<inode id>-<index>`
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkId(String);

impl ChunkId {
    /// Chunk id for position `index` of a file
    pub fn for_index(inode: &InodeId, index: usize) -> Self {
        ChunkId(format!("{}-{}", inode, index))
    }

    /// Wrap an existing chunk id
    pub fn new(id: impl Into<String>) -> Self {
        ChunkId(id.into())
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Owner of an inode (descriptive only)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    pub uid: u32,
    pub gid: u32,
}

/// Inode timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub accessed: DateTime<Utc>,
}

impl Timestamps {
    fn now() -> Self {
        let now = Utc::now();
        Self {
            created: now,
            updated: now,
            accessed: now,
        }
    }
}

/// Variant-specific inode content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InodeKind {
    /// Directory: child name -> child inode id
    Directory { entries: HashMap<String, InodeId> },
    /// File: ordered chunks and total byte size
    File { chunk_ids: Vec<ChunkId>, size: u64 },
}

/// A file or directory record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inode {
    pub id: InodeId,
    pub name: String,
    /// Containing directory; `None` only for the root
    pub parent_id: Option<InodeId>,
    pub permissions: String,
    pub ownership: Ownership,
    pub timestamps: Timestamps,
    pub links: Vec<String>,
    pub kind: InodeKind,
}

const DEFAULT_PERMISSIONS: &str = "rw-r--r--";

impl Inode {
    fn with_kind(id: InodeId, name: String, kind: InodeKind) -> Self {
        Self {
            id,
            name,
            parent_id: None,
            permissions: DEFAULT_PERMISSIONS.to_string(),
            ownership: Ownership::default(),
            timestamps: Timestamps::now(),
            links: Vec::new(),
            kind,
        }
    }

    /// The namespace root directory
    pub fn root() -> Self {
        Self::with_kind(
            InodeId::root(),
            "/".to_string(),
            InodeKind::Directory {
                entries: HashMap::new(),
            },
        )
    }

    /// New empty directory with a fresh id
    pub fn new_directory(name: impl Into<String>) -> Self {
        Self::with_kind(
            InodeId::generate(),
            name.into(),
            InodeKind::Directory {
                entries: HashMap::new(),
            },
        )
    }

    /// New empty file with a fresh id
    pub fn new_file(name: impl Into<String>) -> Self {
        Self::with_kind(
            InodeId::generate(),
            name.into(),
            InodeKind::File {
                chunk_ids: Vec::new(),
                size: 0,
            },
        )
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, InodeKind::Directory { .. })
    }

    /// File size in bytes; zero for directories
    pub fn size(&self) -> u64 {
        match &self.kind {
            InodeKind::File { size, .. } => *size,
            InodeKind::Directory { .. } => 0,
        }
    }

    /// Chunk ids in content order; empty for directories
    pub fn chunk_ids(&self) -> &[ChunkId] {
        match &self.kind {
            InodeKind::File { chunk_ids, .. } => chunk_ids,
            InodeKind::Directory { .. } => &[],
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_ids().len()
    }

    /// Directory entries, or `None` for files
    pub fn entries(&self) -> Option<&HashMap<String, InodeId>> {
        match &self.kind {
            InodeKind::Directory { entries } => Some(entries),
            InodeKind::File { .. } => None,
        }
    }

    /// Look up a child id by name
    pub fn entry(&self, name: &str) -> Option<&InodeId> {
        self.entries().and_then(|entries| entries.get(name))
    }

    /// Link a child under `name`
    pub fn insert_entry(&mut self, name: &str, child: InodeId) -> Result<()> {
        let InodeKind::Directory { entries } = &mut self.kind else {
            return Err(Error::NotADirectory(self.name.clone()));
        };

        if entries.contains_key(name) {
            return Err(Error::AlreadyExists(name.to_string()));
        }

        entries.insert(name.to_string(), child);
        self.touch_updated();
        Ok(())
    }

    /// Replace the content description of a file
    pub fn set_content(&mut self, new_chunks: Vec<ChunkId>, new_size: u64) -> Result<Vec<ChunkId>> {
        let InodeKind::File { chunk_ids, size } = &mut self.kind else {
            return Err(Error::IsDirectory(self.name.clone()));
        };

        let previous = std::mem::replace(chunk_ids, new_chunks);
        *size = new_size;
        self.touch_updated();
        Ok(previous)
    }

    pub fn add_link(&mut self, link_id: impl Into<String>) {
        let link_id = link_id.into();
        if !self.links.contains(&link_id) {
            self.links.push(link_id);
        }
    }

    /// Remove a hard link; returns whether it was present
    pub fn remove_link(&mut self, link_id: &str) -> bool {
        let before = self.links.len();
        self.links.retain(|l| l != link_id);
        self.links.len() != before
    }

    pub fn touch_updated(&mut self) {
        self.timestamps.updated = Utc::now();
    }

    pub fn touch_accessed(&mut self) {
        self.timestamps.accessed = Utc::now();
    }

    /// Lightweight listing descriptor
    pub fn dir_entry(&self) -> DirEntry {
        DirEntry {
            name: self.name.clone(),
            id: self.id.clone(),
            is_dir: self.is_dir(),
        }
    }

    /// Attribute summary returned by `GetInode`
    pub fn info(&self) -> InodeInfo {
        InodeInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            is_dir: self.is_dir(),
            size: self.size(),
            parent_id: self.parent_id.clone(),
            chunk_count: self.chunk_count(),
            permissions: self.permissions.clone(),
            created: self.timestamps.created,
            updated: self.timestamps.updated,
            accessed: self.timestamps.accessed,
        }
    }
}

/// Listing entry: one immediate child of a directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub id: InodeId,
    pub is_dir: bool,
}

/// Inode attributes as seen by clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InodeInfo {
    pub id: InodeId,
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
    pub parent_id: Option<InodeId>,
    pub chunk_count: usize,
    pub permissions: String,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    pub accessed: DateTime<Utc>,
}
