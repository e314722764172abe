//! Data node liveness monitor
//!
//! Background task that heartbeats every data node on a fixed interval.
//! Results only feed the health registry and the log; placement never
//! consults them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::network::DataNodeStatus;
use crate::placement::ChunkTransport;

/// Data node status as last observed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Not probed yet
    Unknown,
    /// Last heartbeat succeeded
    Active,
    /// Last heartbeat failed
    Offline,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeStatus::Unknown => write!(f, "UNKNOWN"),
            NodeStatus::Active => write!(f, "ACTIVE"),
            NodeStatus::Offline => write!(f, "OFFLINE"),
        }
    }
}

/// Health record of one data node
#[derive(Debug, Clone)]
pub struct NodeHealth {
    pub address: String,
    pub status: NodeStatus,
    pub consecutive_failures: u32,
    pub last_heartbeat: Option<Instant>,
}

impl NodeHealth {
    pub fn new(address: String) -> Self {
        Self {
            address,
            status: NodeStatus::Unknown,
            consecutive_failures: 0,
            last_heartbeat: None,
        }
    }

    /// Record a successful heartbeat
    pub fn touch(&mut self) {
        self.status = NodeStatus::Active;
        self.consecutive_failures = 0;
        self.last_heartbeat = Some(Instant::now());
    }

    /// Record a failed heartbeat
    pub fn record_failure(&mut self) {
        self.status = NodeStatus::Offline;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    /// Check if the node answered recently
    pub fn is_healthy(&self, timeout: Duration) -> bool {
        match self.last_heartbeat {
            Some(last) => self.status == NodeStatus::Active && last.elapsed() < timeout,
            None => false,
        }
    }

    pub fn time_since_heartbeat(&self) -> Option<Duration> {
        self.last_heartbeat.map(|t| t.elapsed())
    }

    fn to_status(&self) -> DataNodeStatus {
        DataNodeStatus {
            address: self.address.clone(),
            status: self.status.to_string(),
            consecutive_failures: self.consecutive_failures,
            last_seen_ms: self.time_since_heartbeat().map(|d| d.as_millis() as u64),
        }
    }
}

/// Shared view of data node health, in placement order
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    nodes: Arc<RwLock<Vec<NodeHealth>>>,
}

impl HealthRegistry {
    pub fn new(addresses: &[String]) -> Self {
        Self {
            nodes: Arc::new(RwLock::new(
                addresses.iter().cloned().map(NodeHealth::new).collect(),
            )),
        }
    }

    pub async fn snapshot(&self) -> Vec<NodeHealth> {
        self.nodes.read().await.clone()
    }

    /// Wire representation for status responses
    pub async fn statuses(&self) -> Vec<DataNodeStatus> {
        self.nodes.read().await.iter().map(NodeHealth::to_status).collect()
    }

    async fn addresses(&self) -> Vec<String> {
        self.nodes.read().await.iter().map(|n| n.address.clone()).collect()
    }

    async fn record(&self, results: Vec<(String, bool)>) {
        let mut nodes = self.nodes.write().await;
        for (address, ok) in results {
            if let Some(node) = nodes.iter_mut().find(|n| n.address == address) {
                if ok {
                    if node.status == NodeStatus::Offline {
                        tracing::info!("Data node {} is reachable again", address);
                    }
                    node.touch();
                } else {
                    node.record_failure();
                }
            }
        }
    }
}

/// Periodic heartbeat loop over every configured data node
pub struct LivenessMonitor {
    transport: Arc<dyn ChunkTransport>,
    registry: HealthRegistry,
    interval: Duration,
}

impl LivenessMonitor {
    pub fn new(transport: Arc<dyn ChunkTransport>, registry: HealthRegistry, interval: Duration) -> Self {
        Self {
            transport,
            registry,
            interval,
        }
    }

    /// Heartbeat every node once, concurrently
    pub async fn probe_all(&self) {
        let addresses = self.registry.addresses().await;

        let probes = addresses.iter().map(|address| async move {
            match self.transport.heartbeat(address).await {
                Ok(()) => (address.clone(), true),
                Err(e) => {
                    tracing::warn!("Heartbeat to data node {} failed: {}", address, e);
                    (address.clone(), false)
                }
            }
        });

        let results = join_all(probes).await;
        self.registry.record(results).await;
    }

    /// Start the loop on its own task
    pub fn spawn(self) -> MonitorHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                "Liveness monitor started ({} ms interval)",
                self.interval.as_millis()
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => self.probe_all().await,
                    _ = shutdown_rx.changed() => break,
                }
            }

            tracing::info!("Liveness monitor stopped");
        });

        MonitorHandle { shutdown, task }
    }
}

/// Handle used to stop and join the monitor task
pub struct MonitorHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    /// Signal the loop to stop and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!("Liveness monitor task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::transport::testing::{Call, MemoryTransport};

    fn addresses() -> Vec<String> {
        vec!["dn-1:7701".into(), "dn-2:7702".into()]
    }

    #[tokio::test]
    async fn test_probe_marks_status() {
        let transport = Arc::new(MemoryTransport::new());
        transport.take_down("dn-2:7702");
        let registry = HealthRegistry::new(&addresses());

        let monitor = LivenessMonitor::new(transport.clone(), registry.clone(), Duration::from_secs(60));
        monitor.probe_all().await;
        monitor.probe_all().await;

        let health = registry.snapshot().await;
        assert_eq!(health[0].status, NodeStatus::Active);
        assert!(health[0].is_healthy(Duration::from_secs(5)));
        assert_eq!(health[1].status, NodeStatus::Offline);
        assert_eq!(health[1].consecutive_failures, 2);

        let statuses = registry.statuses().await;
        assert_eq!(statuses[1].status, "OFFLINE");
        assert!(statuses[1].last_seen_ms.is_none());
    }

    #[tokio::test]
    async fn test_loop_runs_until_shutdown() {
        let transport = Arc::new(MemoryTransport::new());
        let registry = HealthRegistry::new(&addresses());

        let handle = LivenessMonitor::new(transport.clone(), registry.clone(), Duration::from_millis(10))
            .spawn();
        tokio::time::sleep(Duration::from_millis(80)).await;
        handle.shutdown().await;

        let probes = transport.calls().len();
        assert!(probes >= 2);
        assert!(transport
            .calls()
            .iter()
            .all(|c| matches!(c, Call::Heartbeat(_))));

        // Joined: no more probes after shutdown returns
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(transport.calls().len(), probes);
    }

    #[test]
    fn test_unprobed_node_is_unknown() {
        let health = NodeHealth::new("dn-1:7701".into());
        assert_eq!(health.status, NodeStatus::Unknown);
        assert!(!health.is_healthy(Duration::from_secs(5)));
    }
}
