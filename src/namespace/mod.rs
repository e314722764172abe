//! Namespace Module
//!
//! The inode model and the namespace operations (create, list, change
//! directory, file lookup) over the id-keyed inode table.

pub mod inode;
mod table;

pub use inode::{ChunkId, DirEntry, Inode, InodeId, InodeInfo, InodeKind, Ownership, Timestamps};
pub use table::{validate_name, DirectoryRef, InodeTable};
