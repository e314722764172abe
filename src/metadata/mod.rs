//! Metadata Authority Module
//!
//! The service holding the namespace, its snapshot persistence, the
//! per-file content gates and the data node liveness monitor.

mod gate;
pub mod monitor;
pub mod snapshot;
mod service;

pub use gate::FileGates;
pub use monitor::{HealthRegistry, LivenessMonitor, MonitorHandle, NodeHealth, NodeStatus};
pub use service::{MetadataService, SnapshotSettings};
