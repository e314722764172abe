//! Chunk Placement Engine
//!
//! Turns a file payload into independently stored chunks and back. Chunk
//! `i` of a file is named `<inode id>-<i>` and lives on data node
//! `i mod n`, so reads recompute the location from the position alone.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};

use super::chunker::{split, RoundRobin};
use super::transport::ChunkTransport;
use crate::error::{Error, Result};
use crate::namespace::{ChunkId, InodeId};

/// Chunk size used when none is configured
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Chunk RPCs kept in flight per file operation
const MAX_IN_FLIGHT: usize = 8;

/// Splits, places and reassembles file content
pub struct PlacementEngine {
    placement: RoundRobin,
    chunk_size: usize,
    transport: Arc<dyn ChunkTransport>,
}

impl PlacementEngine {
    /// Create an engine over `data_nodes` (placement order)
    pub fn new(
        data_nodes: Vec<String>,
        chunk_size: usize,
        transport: Arc<dyn ChunkTransport>,
    ) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::Config("chunk size must be positive".into()));
        }

        Ok(Self {
            placement: RoundRobin::new(data_nodes)?,
            chunk_size,
            transport,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn data_nodes(&self) -> &[String] {
        self.placement.nodes()
    }

    /// Transport shared with the liveness monitor
    pub fn transport(&self) -> Arc<dyn ChunkTransport> {
        Arc::clone(&self.transport)
    }

    /// Write every chunk of `data` for file `inode`.
    ///
    /// Returns the chunk ids in content order. The first failed write
    /// aborts the whole operation; chunks already stored stay where they are.
    pub async fn place(&self, inode: &InodeId, data: &[u8]) -> Result<Vec<ChunkId>> {
        let writes: Vec<_> = split(data, self.chunk_size)
            .enumerate()
            .map(|(index, chunk)| {
                let chunk_id = ChunkId::for_index(inode, index);
                let node = self.placement.node_for(index);
                async move {
                    if let Err(e) = self.transport.write_chunk(node, &chunk_id, chunk.to_vec()).await {
                        tracing::warn!("Failed to write chunk {} to {}: {}", chunk_id, node, e);
                        return Err(e);
                    }
                    tracing::trace!("Stored chunk {} on {}", chunk_id, node);
                    Ok(chunk_id)
                }
            })
            .collect();

        let chunk_ids: Vec<ChunkId> = stream::iter(writes)
            .buffered(MAX_IN_FLIGHT)
            .try_collect()
            .await?;

        tracing::debug!(
            "Placed {} bytes of {} as {} chunks across {} data nodes",
            data.len(),
            inode,
            chunk_ids.len(),
            self.placement.len()
        );
        Ok(chunk_ids)
    }

    /// Read and concatenate the chunks of a file, in order.
    /// Fails on the first chunk error without retrying.
    pub async fn reassemble(&self, chunk_ids: &[ChunkId]) -> Result<Vec<u8>> {
        if chunk_ids.is_empty() {
            return Ok(Vec::new());
        }

        let reads: Vec<_> = chunk_ids
            .iter()
            .enumerate()
            .map(|(index, chunk_id)| {
                let node = self.placement.node_for(index);
                async move {
                    self.transport.read_chunk(node, chunk_id).await.map_err(|e| {
                        tracing::warn!("Failed to read chunk {} from {}: {}", chunk_id, node, e);
                        e
                    })
                }
            })
            .collect();

        let parts: Vec<Vec<u8>> = stream::iter(reads)
            .buffered(MAX_IN_FLIGHT)
            .try_collect()
            .await?;

        Ok(parts.concat())
    }

    /// Best-effort removal of the chunks at positions `keep..` of a
    /// previous chunk sequence. Returns how many were deleted.
    pub async fn retire(&self, previous: &[ChunkId], keep: usize) -> usize {
        let mut deleted = 0;

        for (index, chunk_id) in previous.iter().enumerate().skip(keep) {
            let node = self.placement.node_for(index);
            match self.transport.delete_chunk(node, chunk_id).await {
                Ok(()) => deleted += 1,
                Err(e) => tracing::warn!("Failed to retire chunk {} on {}: {}", chunk_id, node, e),
            }
        }

        if deleted > 0 {
            tracing::debug!("Retired {} stale chunks", deleted);
        }
        deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::transport::testing::{Call, MemoryTransport};
    use rand::RngCore;

    const NODES: [&str; 3] = ["dn-1:7701", "dn-2:7702", "dn-3:7703"];

    fn engine(chunk_size: usize) -> (PlacementEngine, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let engine = PlacementEngine::new(
            NODES.iter().map(|s| s.to_string()).collect(),
            chunk_size,
            transport.clone(),
        )
        .unwrap();
        (engine, transport)
    }

    fn index_of(chunk_id: &str) -> usize {
        chunk_id.rsplit('-').next().unwrap().parse().unwrap()
    }

    #[tokio::test]
    async fn test_round_trip_sizes() {
        let (engine, _transport) = engine(16);
        let inode = InodeId::generate();

        for len in [0usize, 1, 15, 16, 17, 48, 1000] {
            let mut data = vec![0u8; len];
            rand::thread_rng().fill_bytes(&mut data);

            let chunk_ids = engine.place(&inode, &data).await.unwrap();
            assert_eq!(chunk_ids.len(), len.div_ceil(16));

            let read_back = engine.reassemble(&chunk_ids).await.unwrap();
            assert_eq!(read_back, data, "length {}", len);
        }
    }

    #[tokio::test]
    async fn test_chunk_i_goes_to_node_i_mod_n() {
        let (engine, transport) = engine(4);
        let inode = InodeId::new("f");

        // 7 chunks over 3 nodes
        let chunk_ids = engine.place(&inode, &[1u8; 26]).await.unwrap();
        assert_eq!(chunk_ids.len(), 7);

        let writes: Vec<(String, String)> = transport
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Write(node, id) => Some((node, id)),
                _ => None,
            })
            .collect();
        assert_eq!(writes.len(), 7);

        for (node, id) in &writes {
            assert_eq!(node, NODES[index_of(id) % 3], "chunk {}", id);
        }

        assert_eq!(transport.stored_on(NODES[0]), vec!["f-0", "f-3", "f-6"]);
        assert_eq!(transport.stored_on(NODES[1]), vec!["f-1", "f-4"]);
        assert_eq!(transport.stored_on(NODES[2]), vec!["f-2", "f-5"]);
    }

    #[tokio::test]
    async fn test_chunk_ids_follow_position() {
        let (engine, _transport) = engine(2);
        let inode = InodeId::new("abc");
        let ids = engine.place(&inode, b"hello").await.unwrap();
        let ids: Vec<&str> = ids.iter().map(|c| c.as_str()).collect();
        assert_eq!(ids, vec!["abc-0", "abc-1", "abc-2"]);
    }

    #[tokio::test]
    async fn test_reads_use_same_nodes() {
        let (engine, transport) = engine(4);
        let inode = InodeId::new("r");
        let ids = engine.place(&inode, &[9u8; 20]).await.unwrap();
        transport.clear_calls();

        engine.reassemble(&ids).await.unwrap();
        for call in transport.calls() {
            match call {
                Call::Read(node, id) => assert_eq!(node, NODES[index_of(&id) % 3]),
                other => panic!("unexpected call {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_empty_file_issues_no_rpc() {
        let (engine, transport) = engine(4);
        let ids = engine.place(&InodeId::new("e"), &[]).await.unwrap();
        assert!(ids.is_empty());
        assert!(engine.reassemble(&ids).await.unwrap().is_empty());
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_aborts() {
        let (engine, transport) = engine(4);
        transport.take_down(NODES[1]);

        let result = engine.place(&InodeId::new("x"), &[0u8; 12]).await;
        assert!(matches!(result, Err(Error::ConnectionFailed { .. })));
    }

    #[tokio::test]
    async fn test_read_failure_surfaces() {
        let (engine, transport) = engine(4);
        let ids = engine.place(&InodeId::new("x"), &[0u8; 12]).await.unwrap();
        transport.take_down(NODES[2]);

        assert!(engine.reassemble(&ids).await.is_err());
    }

    #[tokio::test]
    async fn test_retire_deletes_trailing_chunks() {
        let (engine, transport) = engine(4);
        let inode = InodeId::new("t");
        let previous = engine.place(&inode, &[0u8; 20]).await.unwrap();
        assert_eq!(previous.len(), 5);

        let deleted = engine.retire(&previous, 2).await;
        assert_eq!(deleted, 3);
        assert_eq!(transport.stored_on(NODES[0]), vec!["t-0"]);
        assert_eq!(transport.stored_on(NODES[1]), vec!["t-1"]);
        assert!(transport.stored_on(NODES[2]).is_empty());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let transport = Arc::new(MemoryTransport::new());
        assert!(PlacementEngine::new(vec!["a".into()], 0, transport).is_err());
    }
}
