//! Chunk blob storage for a data node

use std::collections::{HashMap, VecDeque};
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::debug;

use crate::error::{Error, Result};

const TEMP_SUFFIX: &str = ".tmp";

/// Blob directory keyed by chunk id
pub struct ChunkStore {
    /// Directory holding one file per chunk
    base_dir: PathBuf,

    /// Recently read or written chunks
    read_cache: Mutex<ReadCache>,
}

/// Small LRU cache of chunk contents
struct ReadCache {
    entries: HashMap<String, Vec<u8>>,
    access_order: VecDeque<String>,
    capacity: usize,
    /// Bumped by every write and delete; a disk read only fills the cache
    /// if no mutation happened since it missed
    generation: u64,
}

impl ReadCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            access_order: VecDeque::with_capacity(capacity),
            capacity,
            generation: 0,
        }
    }

    fn promote(&mut self, id: &str) {
        if let Some(pos) = self.access_order.iter().position(|c| c == id) {
            if let Some(key) = self.access_order.remove(pos) {
                self.access_order.push_back(key);
            }
        }
    }

    fn get(&mut self, id: &str) -> Option<Vec<u8>> {
        let data = self.entries.get(id).cloned()?;
        self.promote(id);
        Some(data)
    }

    fn insert(&mut self, id: &str, data: Vec<u8>) {
        if self.capacity == 0 {
            return;
        }

        // Chunks are rewritten in place on overwrite
        if self.entries.insert(id.to_string(), data).is_some() {
            self.promote(id);
            return;
        }
        self.access_order.push_back(id.to_string());

        while self.entries.len() > self.capacity {
            match self.access_order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    /// Cache a blob read from disk, unless a write or delete ran since
    /// the miss at `seen`
    fn fill(&mut self, id: &str, data: Vec<u8>, seen: u64) -> bool {
        if self.generation != seen {
            return false;
        }
        self.insert(id, data);
        true
    }

    /// Record a write of `id`
    fn store(&mut self, id: &str, data: Vec<u8>) {
        self.generation += 1;
        self.insert(id, data);
    }

    fn remove(&mut self, id: &str) {
        self.generation += 1;
        if self.entries.remove(id).is_some() {
            self.access_order.retain(|c| c != id);
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Reject ids that could escape the chunk directory
pub fn validate_chunk_id(chunk_id: &str) -> Result<()> {
    if chunk_id.is_empty()
        || chunk_id == "."
        || chunk_id == ".."
        || chunk_id.contains('/')
        || chunk_id.contains('\\')
        || chunk_id.contains('\0')
        || chunk_id.ends_with(TEMP_SUFFIX)
    {
        return Err(Error::InvalidArgument(format!("invalid chunk id '{}'", chunk_id)));
    }
    Ok(())
}

impl ChunkStore {
    /// Open (creating if needed) a chunk store in `base_dir`
    pub fn new(base_dir: PathBuf, cache_capacity: usize) -> Result<Self> {
        fs::create_dir_all(&base_dir)?;

        Ok(Self {
            base_dir,
            read_cache: Mutex::new(ReadCache::new(cache_capacity)),
        })
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    fn chunk_path(&self, chunk_id: &str) -> PathBuf {
        self.base_dir.join(chunk_id)
    }

    /// Store `data` under `chunk_id`, replacing any previous blob
    pub fn write(&self, chunk_id: &str, data: &[u8]) -> Result<()> {
        validate_chunk_id(chunk_id)?;

        let path = self.chunk_path(chunk_id);
        let tmp = self.base_dir.join(format!("{}{}", chunk_id, TEMP_SUFFIX));

        {
            let mut file = File::create(&tmp)?;
            file.write_all(data)?;
        }
        fs::rename(&tmp, &path)?;

        if let Ok(mut cache) = self.read_cache.lock() {
            cache.store(chunk_id, data.to_vec());
        }

        debug!("Stored chunk {} ({} bytes)", chunk_id, data.len());
        Ok(())
    }

    /// Fetch the blob stored under `chunk_id`
    pub fn read(&self, chunk_id: &str) -> Result<Vec<u8>> {
        validate_chunk_id(chunk_id)?;

        let mut seen = None;
        if let Ok(mut cache) = self.read_cache.lock() {
            if let Some(data) = cache.get(chunk_id) {
                debug!("Cache hit for chunk {}", chunk_id);
                return Ok(data);
            }
            seen = Some(cache.generation);
        }

        let mut file = match File::open(self.chunk_path(chunk_id)) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::ChunkNotFound(chunk_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        if let (Some(seen), Ok(mut cache)) = (seen, self.read_cache.lock()) {
            if !cache.fill(chunk_id, data.clone(), seen) {
                debug!("Chunk {} changed during read, not caching", chunk_id);
            }
        }

        Ok(data)
    }

    /// Remove the blob stored under `chunk_id`
    pub fn delete(&self, chunk_id: &str) -> Result<()> {
        validate_chunk_id(chunk_id)?;

        if let Ok(mut cache) = self.read_cache.lock() {
            cache.remove(chunk_id);
        }

        match fs::remove_file(self.chunk_path(chunk_id)) {
            Ok(()) => {
                debug!("Deleted chunk {}", chunk_id);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::ChunkNotFound(chunk_id.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    pub fn exists(&self, chunk_id: &str) -> bool {
        validate_chunk_id(chunk_id).is_ok() && self.chunk_path(chunk_id).exists()
    }

    /// Number of stored chunks
    pub fn chunk_count(&self) -> Result<usize> {
        let mut count = 0;
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() && !entry.file_name().to_string_lossy().ends_with(TEMP_SUFFIX) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Number of chunks held in the read cache
    pub fn cached_chunks(&self) -> usize {
        self.read_cache.lock().map(|c| c.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_chunk_store_roundtrip() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::new(dir.path().to_path_buf(), 16).unwrap();

        store.write("abc-0", b"Hello, WolfDFS!").unwrap();
        assert_eq!(store.read("abc-0").unwrap(), b"Hello, WolfDFS!");
        assert!(store.exists("abc-0"));
        assert_eq!(store.chunk_count().unwrap(), 1);
    }

    #[test]
    fn test_overwrite_replaces_cached_copy() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::new(dir.path().to_path_buf(), 16).unwrap();

        store.write("abc-0", b"first").unwrap();
        store.read("abc-0").unwrap();
        store.write("abc-0", b"second").unwrap();
        assert_eq!(store.read("abc-0").unwrap(), b"second");
    }

    #[test]
    fn test_read_from_disk_without_cache() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::new(dir.path().to_path_buf(), 0).unwrap();

        store.write("abc-1", b"on disk").unwrap();
        assert_eq!(store.cached_chunks(), 0);
        assert_eq!(store.read("abc-1").unwrap(), b"on disk");
    }

    #[test]
    fn test_missing_chunk() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::new(dir.path().to_path_buf(), 16).unwrap();

        assert!(matches!(store.read("nope-0"), Err(Error::ChunkNotFound(_))));
        assert!(matches!(store.delete("nope-0"), Err(Error::ChunkNotFound(_))));
    }

    #[test]
    fn test_delete() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::new(dir.path().to_path_buf(), 16).unwrap();

        store.write("abc-0", b"x").unwrap();
        store.delete("abc-0").unwrap();
        assert!(!store.exists("abc-0"));
        assert!(matches!(store.read("abc-0"), Err(Error::ChunkNotFound(_))));
    }

    #[test]
    fn test_cache_evicts_oldest() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::new(dir.path().to_path_buf(), 2).unwrap();

        store.write("c-0", b"0").unwrap();
        store.write("c-1", b"1").unwrap();
        store.write("c-2", b"2").unwrap();
        assert_eq!(store.cached_chunks(), 2);
        // Evicted from cache, still on disk
        assert_eq!(store.read("c-0").unwrap(), b"0");
    }

    /// Start a disk read the way `read` does after a cache miss
    fn begin_miss(store: &ChunkStore, chunk_id: &str) -> (u64, Vec<u8>) {
        let mut cache = store.read_cache.lock().unwrap();
        cache.entries.clear();
        cache.access_order.clear();
        let seen = cache.generation;
        drop(cache);
        (seen, fs::read(store.chunk_path(chunk_id)).unwrap())
    }

    #[test]
    fn test_slow_read_does_not_cache_overwritten_blob() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::new(dir.path().to_path_buf(), 16).unwrap();
        store.write("c-0", b"old").unwrap();

        let (seen, stale) = begin_miss(&store, "c-0");
        store.write("c-0", b"new").unwrap();

        assert!(!store.read_cache.lock().unwrap().fill("c-0", stale, seen));
        assert_eq!(store.read("c-0").unwrap(), b"new");
    }

    #[test]
    fn test_slow_read_does_not_resurrect_deleted_blob() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::new(dir.path().to_path_buf(), 16).unwrap();
        store.write("c-0", b"old").unwrap();

        let (seen, stale) = begin_miss(&store, "c-0");
        store.delete("c-0").unwrap();

        assert!(!store.read_cache.lock().unwrap().fill("c-0", stale, seen));
        assert!(matches!(store.read("c-0"), Err(Error::ChunkNotFound(_))));
    }

    #[test]
    fn test_uncontended_read_fills_cache() {
        let dir = tempdir().unwrap();
        let store = ChunkStore::new(dir.path().to_path_buf(), 16).unwrap();
        store.write("c-0", b"blob").unwrap();

        let (seen, data) = begin_miss(&store, "c-0");
        assert!(store.read_cache.lock().unwrap().fill("c-0", data, seen));
        assert_eq!(store.cached_chunks(), 1);
    }

    #[test]
    fn test_invalid_ids_rejected() {
        for id in ["", ".", "..", "../etc/passwd", "a/b", "x.tmp"] {
            assert!(validate_chunk_id(id).is_err(), "{:?}", id);
        }
        assert!(validate_chunk_id("2f1c0b3e-0000-4000-8000-000000000000-12").is_ok());
    }
}
