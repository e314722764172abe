//! File splitting and round-robin node selection

use crate::error::{Error, Result};

/// Split `data` into contiguous slices of `chunk_size` bytes; the last
/// slice holds the remainder. Empty input yields nothing.
///
/// `chunk_size` must be positive; `PlacementEngine::new` enforces it.
pub fn split(data: &[u8], chunk_size: usize) -> std::slice::Chunks<'_, u8> {
    data.chunks(chunk_size)
}

/// Stateless round-robin placement: chunk `i` lives on node `i mod n`
#[derive(Debug, Clone)]
pub struct RoundRobin {
    nodes: Vec<String>,
}

impl RoundRobin {
    /// Create a placement over `nodes`, in configuration order
    pub fn new(nodes: Vec<String>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(Error::Config("no data nodes configured".into()));
        }
        Ok(Self { nodes })
    }

    /// Node holding the chunk at `index`
    pub fn node_for(&self, index: usize) -> &str {
        &self.nodes[index % self.nodes.len()]
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
