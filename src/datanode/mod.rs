//! Data Node Module
//!
//! Chunk blob storage and the RPC service exposing it.

mod service;
mod store;

pub use service::DataNodeService;
pub use store::{validate_chunk_id, ChunkStore};
