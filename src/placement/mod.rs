//! Chunk Placement Module
//!
//! Splits file payloads into fixed-size chunks, spreads them round-robin
//! over the data nodes and reassembles them on read.

mod chunker;
mod engine;
pub mod transport;

pub use chunker::{split, RoundRobin};
pub use engine::{PlacementEngine, DEFAULT_CHUNK_SIZE};
pub use transport::{ChunkTransport, RemoteChunkTransport};
