//! Per-file content gates
//!
//! A write holds its file's gate exclusively from placement through
//! commit; reads hold it shared from resolve through reassembly. The
//! table lock is only taken for the short resolve and commit steps.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

use crate::namespace::InodeId;

/// Idle gates are dropped once the map grows past this
const PRUNE_THRESHOLD: usize = 1024;

#[derive(Default)]
pub struct FileGates {
    gates: Mutex<HashMap<InodeId, Arc<RwLock<()>>>>,
}

impl FileGates {
    pub fn new() -> Self {
        Self::default()
    }

    async fn gate(&self, id: &InodeId) -> Arc<RwLock<()>> {
        let mut gates = self.gates.lock().await;

        if gates.len() >= PRUNE_THRESHOLD {
            // Only the map holds an idle gate
            gates.retain(|_, gate| Arc::strong_count(gate) > 1);
        }

        Arc::clone(gates.entry(id.clone()).or_default())
    }

    /// Exclusive access to a file's content
    pub async fn write(&self, id: &InodeId) -> OwnedRwLockWriteGuard<()> {
        self.gate(id).await.write_owned().await
    }

    /// Shared access to a file's content
    pub async fn read(&self, id: &InodeId) -> OwnedRwLockReadGuard<()> {
        self.gate(id).await.read_owned().await
    }

    /// Number of gates currently tracked
    pub async fn len(&self) -> usize {
        self.gates.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_writer_excludes_reader() {
        let gates = Arc::new(FileGates::new());
        let id = InodeId::new("f");

        let guard = gates.write(&id).await;

        let reader = {
            let gates = Arc::clone(&gates);
            let id = id.clone();
            tokio::spawn(async move {
                let _g = gates.read(&id).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!reader.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_readers_share() {
        let gates = FileGates::new();
        let id = InodeId::new("f");

        let _a = gates.read(&id).await;
        let _b = tokio::time::timeout(Duration::from_millis(100), gates.read(&id))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_distinct_files_independent() {
        let gates = FileGates::new();
        let _a = gates.write(&InodeId::new("a")).await;
        let _b = tokio::time::timeout(Duration::from_millis(100), gates.write(&InodeId::new("b")))
            .await
            .unwrap();
        assert_eq!(gates.len().await, 2);
    }
}
