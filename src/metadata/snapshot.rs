//! Inode table snapshots
//!
//! File layout:
//!
//! ```text
//! [magic "WDFS"][version u32][flags u8][crc32 u32][length u32][body]
//! ```
//!
//! The body is the bincode-encoded inode map, LZ4-compressed when flag
//! bit 0 is set. The checksum covers the body as stored. Writes go to a
//! temporary file that is renamed over the previous snapshot.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::namespace::{Inode, InodeId, InodeTable};

/// Magic bytes at the start of every snapshot
const SNAPSHOT_MAGIC: &[u8; 4] = b"WDFS";

/// Snapshot format version
const SNAPSHOT_VERSION: u32 = 1;

/// Header size in bytes
const HEADER_SIZE: usize = 17;

const FLAG_COMPRESSED: u8 = 0x01;

/// Snapshot file header
#[derive(Debug, Clone, PartialEq, Eq)]
struct SnapshotHeader {
    flags: u8,
    checksum: u32,
    length: u32,
}

impl SnapshotHeader {
    fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(SNAPSHOT_MAGIC);
        bytes[4..8].copy_from_slice(&SNAPSHOT_VERSION.to_le_bytes());
        bytes[8] = self.flags;
        bytes[9..13].copy_from_slice(&self.checksum.to_le_bytes());
        bytes[13..17].copy_from_slice(&self.length.to_le_bytes());
        bytes
    }

    fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Result<Self> {
        if &bytes[0..4] != SNAPSHOT_MAGIC {
            return Err(Error::Snapshot("invalid snapshot magic bytes".into()));
        }

        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != SNAPSHOT_VERSION {
            return Err(Error::Snapshot(format!(
                "unsupported snapshot version: {}",
                version
            )));
        }

        Ok(Self {
            flags: bytes[8],
            checksum: u32::from_le_bytes([bytes[9], bytes[10], bytes[11], bytes[12]]),
            length: u32::from_le_bytes([bytes[13], bytes[14], bytes[15], bytes[16]]),
        })
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Encode the whole table as snapshot bytes (header and body)
pub fn encode(table: &InodeTable, compress: bool) -> Result<Vec<u8>> {
    let serialized = bincode::serialize(table.inodes())?;
    let (flags, body) = if compress {
        (FLAG_COMPRESSED, lz4_flex::compress_prepend_size(&serialized))
    } else {
        (0, serialized)
    };

    let length = u32::try_from(body.len())
        .map_err(|_| Error::Snapshot(format!("snapshot body too large: {} bytes", body.len())))?;
    let header = SnapshotHeader {
        flags,
        checksum: crc32fast::hash(&body),
        length,
    };

    let mut bytes = Vec::with_capacity(HEADER_SIZE + body.len());
    bytes.extend_from_slice(&header.to_bytes());
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Write encoded snapshot bytes to `path` via a temporary file.
/// Blocking; async callers run it on the blocking pool.
pub fn write_encoded(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_path(path);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Write the whole table to `path`. Returns the number of bytes written.
pub fn save(path: &Path, table: &InodeTable, compress: bool) -> Result<usize> {
    let bytes = encode(table, compress)?;
    write_encoded(path, &bytes)?;

    tracing::debug!(
        "Saved snapshot of {} inodes to {:?} ({} bytes)",
        table.len(),
        path,
        bytes.len()
    );
    Ok(bytes.len())
}

/// Read a table back from `path`
pub fn load(path: &Path) -> Result<InodeTable> {
    let mut file = File::open(path)?;

    let mut header_bytes = [0u8; HEADER_SIZE];
    file.read_exact(&mut header_bytes)?;
    let header = SnapshotHeader::from_bytes(&header_bytes)?;

    let mut body = Vec::new();
    file.read_to_end(&mut body)?;
    if body.len() != header.length as usize {
        return Err(Error::Snapshot(format!(
            "snapshot truncated: expected {} bytes, found {}",
            header.length,
            body.len()
        )));
    }

    if crc32fast::hash(&body) != header.checksum {
        return Err(Error::Snapshot("snapshot checksum mismatch".into()));
    }

    let serialized = if header.flags & FLAG_COMPRESSED != 0 {
        lz4_flex::decompress_size_prepended(&body)
            .map_err(|e| Error::Snapshot(format!("decompression failed: {}", e)))?
    } else {
        body
    };

    let inodes: HashMap<InodeId, Inode> = bincode::deserialize(&serialized)?;
    InodeTable::from_map(inodes)
}

/// Startup load: a missing or unreadable snapshot yields a fresh table
pub fn load_or_default(path: &Path) -> InodeTable {
    if !path.exists() {
        tracing::info!("No snapshot at {:?}, starting with an empty namespace", path);
        return InodeTable::new();
    }

    match load(path) {
        Ok(table) => {
            tracing::info!("Loaded {} inodes from {:?}", table.len(), path);
            table
        }
        Err(e) => {
            tracing::warn!(
                "Failed to load snapshot {:?}: {}; starting with an empty namespace",
                path,
                e
            );
            InodeTable::new()
        }
    }
}
