//! Inode Table
//!
//! The authoritative id -> inode map plus the namespace operations that
//! run against it. The table itself is not synchronized; the metadata
//! service owns the single reader/writer lock that guards it.

use std::collections::HashMap;

use crate::error::{Error, Result};
use super::inode::{ChunkId, DirEntry, Inode, InodeId};

/// How a directory is addressed by a listing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryRef {
    /// Directly by id
    Id(InodeId),
    /// By name inside a parent directory
    Child { parent: InodeId, name: String },
}

impl DirectoryRef {
    /// Build from the optional identifiers of a `ListDir` request.
    /// A directory id wins over the (parent, name) pair.
    pub fn from_request(
        directory_id: Option<&str>,
        parent_id: Option<&str>,
        directory_name: Option<&str>,
    ) -> Result<Self> {
        match (directory_id, parent_id, directory_name) {
            (Some(id), _, _) if !id.is_empty() => Ok(DirectoryRef::Id(InodeId::new(id))),
            (_, Some(parent), Some(name)) if !parent.is_empty() && !name.is_empty() => {
                Ok(DirectoryRef::Child {
                    parent: InodeId::new(parent),
                    name: name.to_string(),
                })
            }
            _ => Err(Error::InvalidArgument(
                "directory identifier not provided".into(),
            )),
        }
    }
}

/// Check that `name` can be used as a directory entry
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidArgument("name cannot be empty".into()));
    }
    if name == "." || name == ".." {
        return Err(Error::InvalidArgument(format!("'{}' is a reserved name", name)));
    }
    if name.contains('/') || name.contains('\0') {
        return Err(Error::InvalidArgument(format!(
            "name '{}' contains an illegal character",
            name
        )));
    }
    Ok(())
}

/// Map from inode id to inode, always containing the root directory
#[derive(Debug, Clone)]
pub struct InodeTable {
    inodes: HashMap<InodeId, Inode>,
}

impl InodeTable {
    /// Fresh table holding only the root directory
    pub fn new() -> Self {
        let mut inodes = HashMap::new();
        inodes.insert(InodeId::root(), Inode::root());
        Self { inodes }
    }

    /// Adopt a map restored from a snapshot
    pub fn from_map(inodes: HashMap<InodeId, Inode>) -> Result<Self> {
        match inodes.get(&InodeId::root()) {
            Some(root) if root.is_dir() => Ok(Self { inodes }),
            Some(_) => Err(Error::Snapshot("root inode is not a directory".into())),
            None => Err(Error::Snapshot("root inode missing".into())),
        }
    }

    /// Borrow the raw map (for snapshots)
    pub fn inodes(&self) -> &HashMap<InodeId, Inode> {
        &self.inodes
    }

    pub fn len(&self) -> usize {
        self.inodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inodes.is_empty()
    }

    /// Resolve an id to its inode
    pub fn resolve(&self, id: &InodeId) -> Result<&Inode> {
        self.inodes
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("inode {}", id)))
    }

    fn resolve_mut(&mut self, id: &InodeId) -> Result<&mut Inode> {
        self.inodes
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("inode {}", id)))
    }

    /// Resolve an id that must be a directory
    fn resolve_dir(&self, id: &InodeId) -> Result<&Inode> {
        let inode = self.resolve(id)?;
        if !inode.is_dir() {
            return Err(Error::NotADirectory(inode.name.clone()));
        }
        Ok(inode)
    }

    /// Resolve the child called `name` inside directory `parent`
    fn resolve_child(&self, parent: &InodeId, name: &str) -> Result<&Inode> {
        let dir = self.resolve_dir(parent)?;
        let child_id = dir
            .entry(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        self.resolve(child_id)
    }

    /// Create a file or directory named `name` under `parent`
    pub fn create_entry(&mut self, parent: &InodeId, name: &str, is_dir: bool) -> Result<DirEntry> {
        validate_name(name)?;

        let parent_inode = self.resolve_dir(parent)?;
        if parent_inode.entry(name).is_some() {
            return Err(Error::AlreadyExists(name.to_string()));
        }

        let mut inode = if is_dir {
            Inode::new_directory(name)
        } else {
            Inode::new_file(name)
        };
        inode.parent_id = Some(parent.clone());
        let entry = inode.dir_entry();

        self.resolve_mut(parent)?.insert_entry(name, inode.id.clone())?;
        self.inodes.insert(inode.id.clone(), inode);

        tracing::debug!("Created {} '{}' ({}) under {}",
            if is_dir { "directory" } else { "file" }, name, entry.id, parent);
        Ok(entry)
    }

    /// List the immediate children of a directory
    pub fn list_directory(&self, target: &DirectoryRef) -> Result<Vec<DirEntry>> {
        let dir = match target {
            DirectoryRef::Id(id) => self.resolve(id)?,
            DirectoryRef::Child { parent, name } => self.resolve_child(parent, name)?,
        };

        let entries = dir
            .entries()
            .ok_or_else(|| Error::NotADirectory(dir.name.clone()))?;

        entries
            .iter()
            .map(|(name, child_id)| {
                let child = self.resolve(child_id)?;
                Ok(DirEntry {
                    name: name.clone(),
                    id: child.id.clone(),
                    is_dir: child.is_dir(),
                })
            })
            .collect()
    }

    /// Shell-style `cd`: `..`, `.`, empty (root) or a child directory name
    pub fn change_directory(&self, current: &InodeId, target: &str) -> Result<DirEntry> {
        let current_inode = self.resolve(current)?;

        let next = match target {
            "." => current_inode,
            "" => self.resolve(&InodeId::root())?,
            ".." => match &current_inode.parent_id {
                Some(parent) if !current_inode.id.is_root() => self.resolve(parent)?,
                _ => current_inode,
            },
            name => {
                let child_id = current_inode
                    .entry(name)
                    .ok_or_else(|| Error::NotFound(name.to_string()))?;
                self.resolve(child_id)?
            }
        };

        if !next.is_dir() {
            return Err(Error::NotADirectory(next.name.clone()));
        }

        Ok(next.dir_entry())
    }

    /// Find the regular file `name` inside directory `dir`
    pub fn lookup_file(&self, dir: &InodeId, name: &str) -> Result<&Inode> {
        let inode = self.resolve_child(dir, name)?;
        if inode.is_dir() {
            return Err(Error::IsDirectory(name.to_string()));
        }
        Ok(inode)
    }

    /// Replace a file's chunk sequence and size in one step.
    /// Returns the chunk ids the file referenced before.
    pub fn commit_content(
        &mut self,
        file: &InodeId,
        chunk_ids: Vec<ChunkId>,
        size: u64,
    ) -> Result<Vec<ChunkId>> {
        self.resolve_mut(file)?.set_content(chunk_ids, size)
    }

    /// Refresh a file's accessed timestamp
    pub fn mark_accessed(&mut self, id: &InodeId) -> Result<()> {
        self.resolve_mut(id)?.touch_accessed();
        Ok(())
    }
}

impl Default for InodeTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(entries: &[DirEntry]) -> Vec<String> {
        let mut names: Vec<String> = entries.iter().map(|e| e.name.clone()).collect();
        names.sort();
        names
    }

    #[test]
    fn test_new_table_has_root() {
        let table = InodeTable::new();
        assert_eq!(table.len(), 1);
        let root = table.resolve(&InodeId::root()).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn test_resolve_missing() {
        let table = InodeTable::new();
        assert!(matches!(
            table.resolve(&InodeId::new("nope")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_create_links_child_into_parent() {
        let mut table = InodeTable::new();
        let created = table.create_entry(&InodeId::root(), "file1", false).unwrap();

        assert_eq!(created.name, "file1");
        assert!(!created.is_dir);

        let root = table.resolve(&InodeId::root()).unwrap();
        assert_eq!(root.entry("file1"), Some(&created.id));

        let child = table.resolve(&created.id).unwrap();
        assert_eq!(child.parent_id, Some(InodeId::root()));
    }

    #[test]
    fn test_duplicate_name_same_parent() {
        let mut table = InodeTable::new();
        table.create_entry(&InodeId::root(), "a", false).unwrap();

        match table.create_entry(&InodeId::root(), "a", true) {
            Err(Error::AlreadyExists(name)) => assert_eq!(name, "a"),
            other => panic!("expected AlreadyExists, got {:?}", other),
        }
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_same_name_different_parents() {
        let mut table = InodeTable::new();
        let d1 = table.create_entry(&InodeId::root(), "d1", true).unwrap();
        let d2 = table.create_entry(&InodeId::root(), "d2", true).unwrap();

        let a = table.create_entry(&d1.id, "same", false).unwrap();
        let b = table.create_entry(&d2.id, "same", false).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_create_under_missing_parent() {
        let mut table = InodeTable::new();
        assert!(matches!(
            table.create_entry(&InodeId::new("missing"), "x", false),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_create_under_file() {
        let mut table = InodeTable::new();
        let file = table.create_entry(&InodeId::root(), "f", false).unwrap();
        assert!(matches!(
            table.create_entry(&file.id, "x", false),
            Err(Error::NotADirectory(_))
        ));
    }

    #[test]
    fn test_invalid_names() {
        let mut table = InodeTable::new();
        for bad in ["", ".", "..", "a/b"] {
            assert!(
                matches!(
                    table.create_entry(&InodeId::root(), bad, false),
                    Err(Error::InvalidArgument(_))
                ),
                "name {:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_list_file_is_not_a_directory() {
        let mut table = InodeTable::new();
        let file = table.create_entry(&InodeId::root(), "f", false).unwrap();
        assert!(matches!(
            table.list_directory(&DirectoryRef::Id(file.id)),
            Err(Error::NotADirectory(_))
        ));
    }

    #[test]
    fn test_list_by_parent_and_name() {
        let mut table = InodeTable::new();
        let dir = table.create_entry(&InodeId::root(), "dir1", true).unwrap();
        table.create_entry(&dir.id, "inner", false).unwrap();

        let entries = table
            .list_directory(&DirectoryRef::Child {
                parent: InodeId::root(),
                name: "dir1".into(),
            })
            .unwrap();
        assert_eq!(names(&entries), vec!["inner"]);

        assert!(matches!(
            table.list_directory(&DirectoryRef::Child {
                parent: InodeId::root(),
                name: "nope".into(),
            }),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_directory_ref_requires_identifier() {
        assert!(matches!(
            DirectoryRef::from_request(None, None, None),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(
            DirectoryRef::from_request(Some(""), Some("root"), None),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(
            DirectoryRef::from_request(Some("root"), None, None).unwrap(),
            DirectoryRef::Id(InodeId::root())
        );
    }

    #[test]
    fn test_cd_dotdot_at_root_is_noop() {
        let table = InodeTable::new();
        let result = table.change_directory(&InodeId::root(), "..").unwrap();
        assert!(result.id.is_root());
        assert_eq!(result.name, "/");
    }

    #[test]
    fn test_cd_dotdot_returns_parent() {
        let mut table = InodeTable::new();
        let outer = table.create_entry(&InodeId::root(), "outer", true).unwrap();
        let inner = table.create_entry(&outer.id, "inner", true).unwrap();

        let up = table.change_directory(&inner.id, "..").unwrap();
        assert_eq!(up.id, outer.id);
        assert_eq!(up.name, "outer");
    }

    #[test]
    fn test_cd_dot_and_empty() {
        let mut table = InodeTable::new();
        let dir = table.create_entry(&InodeId::root(), "d", true).unwrap();

        assert_eq!(table.change_directory(&dir.id, ".").unwrap().id, dir.id);
        assert!(table.change_directory(&dir.id, "").unwrap().id.is_root());
    }

    #[test]
    fn test_cd_missing_child() {
        let table = InodeTable::new();
        assert!(matches!(
            table.change_directory(&InodeId::root(), "ghost"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_cd_into_file() {
        let mut table = InodeTable::new();
        table.create_entry(&InodeId::root(), "f", false).unwrap();
        assert!(matches!(
            table.change_directory(&InodeId::root(), "f"),
            Err(Error::NotADirectory(_))
        ));
    }

    #[test]
    fn test_lookup_file_typing() {
        let mut table = InodeTable::new();
        table.create_entry(&InodeId::root(), "d", true).unwrap();
        table.create_entry(&InodeId::root(), "f", false).unwrap();

        assert!(table.lookup_file(&InodeId::root(), "f").is_ok());
        assert!(matches!(
            table.lookup_file(&InodeId::root(), "d"),
            Err(Error::IsDirectory(_))
        ));
        assert!(matches!(
            table.lookup_file(&InodeId::root(), "missing"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_scenario() {
        let mut table = InodeTable::new();
        let root = InodeId::root();

        table.create_entry(&root, "file1", false).unwrap();
        let listing = table.list_directory(&DirectoryRef::Id(root.clone())).unwrap();
        assert_eq!(names(&listing), vec!["file1"]);

        let dir1 = table.create_entry(&root, "dir1", true).unwrap();
        table.create_entry(&dir1.id, "file2", false).unwrap();

        let current = table.change_directory(&root, "dir1").unwrap();
        assert_eq!(current.id, dir1.id);
        let listing = table.list_directory(&DirectoryRef::Id(current.id.clone())).unwrap();
        assert_eq!(names(&listing), vec!["file2"]);

        let current = table.change_directory(&current.id, "..").unwrap();
        assert!(current.id.is_root());
        let listing = table.list_directory(&DirectoryRef::Id(current.id)).unwrap();
        assert_eq!(names(&listing), vec!["dir1", "file1"]);
    }

    #[test]
    fn test_from_map_requires_root() {
        assert!(InodeTable::from_map(HashMap::new()).is_err());

        let mut bogus = HashMap::new();
        let mut root = Inode::new_file("/");
        root.id = InodeId::root();
        bogus.insert(InodeId::root(), root);
        assert!(InodeTable::from_map(bogus).is_err());
    }

    #[test]
    fn test_commit_content() {
        let mut table = InodeTable::new();
        let file = table.create_entry(&InodeId::root(), "f", false).unwrap();
        let chunks = vec![ChunkId::for_index(&file.id, 0)];

        table.commit_content(&file.id, chunks.clone(), 5).unwrap();
        let inode = table.resolve(&file.id).unwrap();
        assert_eq!(inode.chunk_ids(), chunks.as_slice());
        assert_eq!(inode.size(), 5);

        assert!(matches!(
            table.commit_content(&InodeId::root(), vec![], 0),
            Err(Error::IsDirectory(_))
        ));
    }
}
