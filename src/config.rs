//! WolfDFS Configuration
//!
//! Configuration structures shared by the metadata authority and the
//! data nodes. One TOML file per process; sections that do not apply to
//! the process role are simply ignored.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main WolfDFS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WolfDfsConfig {
    /// Node-specific configuration
    pub node: NodeConfig,

    /// Metadata authority configuration
    #[serde(default)]
    pub metadata: MetadataConfig,

    /// Data node configuration
    #[serde(default)]
    pub data_node: DataNodeConfig,

    /// Outbound RPC configuration
    #[serde(default)]
    pub network: NetworkConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Node-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique node identifier
    pub id: String,

    /// Address to bind the RPC listener on
    pub bind_address: String,

    /// Data directory for snapshots and chunk blobs
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

/// Metadata authority configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Data node addresses, in placement order
    #[serde(default)]
    pub data_nodes: Vec<String>,

    /// Chunk size in bytes
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Heartbeat interval in milliseconds
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Snapshot file name inside the metadata directory
    #[serde(default = "default_snapshot_file")]
    pub snapshot_file: String,

    /// Enable LZ4 compression of the snapshot body
    #[serde(default)]
    pub snapshot_compression: bool,
}

/// Data node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataNodeConfig {
    /// Number of chunks kept in the read cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

/// Outbound RPC configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Connect timeout in milliseconds
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Request timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    PathBuf::from("/var/lib/wolfdfs")
}

fn default_chunk_size() -> usize {
    1024
}

fn default_heartbeat_interval_ms() -> u64 {
    5000
}

fn default_snapshot_file() -> String {
    "metadata.snap".to_string()
}

fn default_cache_capacity() -> usize {
    256
}

fn default_connect_timeout_ms() -> u64 {
    2000
}

fn default_request_timeout_ms() -> u64 {
    10000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            data_nodes: Vec::new(),
            chunk_size: default_chunk_size(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            snapshot_file: default_snapshot_file(),
            snapshot_compression: false,
        }
    }
}

impl Default for DataNodeConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl WolfDfsConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: WolfDfsConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate settings common to every role
    pub fn validate(&self) -> crate::Result<()> {
        if self.node.id.is_empty() {
            return Err(crate::Error::Config("node.id cannot be empty".into()));
        }

        if self.node.bind_address.is_empty() {
            return Err(crate::Error::Config("node.bind_address cannot be empty".into()));
        }

        if self.metadata.chunk_size == 0 {
            return Err(crate::Error::Config("metadata.chunk_size must be positive".into()));
        }

        if self.metadata.heartbeat_interval_ms == 0 {
            return Err(crate::Error::Config(
                "metadata.heartbeat_interval_ms must be positive".into(),
            ));
        }

        Ok(())
    }

    /// Validate settings the metadata authority needs on top of `validate`
    pub fn validate_metadata(&self) -> crate::Result<()> {
        self.validate()?;

        if self.metadata.data_nodes.is_empty() {
            return Err(crate::Error::Config(
                "metadata.data_nodes must list at least one data node".into(),
            ));
        }

        if let Some(dup) = self
            .metadata
            .data_nodes
            .iter()
            .enumerate()
            .find(|(i, addr)| self.metadata.data_nodes[..*i].contains(addr))
            .map(|(_, addr)| addr)
        {
            return Err(crate::Error::Config(format!(
                "metadata.data_nodes lists {} more than once",
                dup
            )));
        }

        Ok(())
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &PathBuf {
        &self.node.data_dir
    }

    /// Directory holding the metadata snapshot
    pub fn metadata_dir(&self) -> PathBuf {
        self.node.data_dir.join("metadata")
    }

    /// Full path of the metadata snapshot
    pub fn snapshot_path(&self) -> PathBuf {
        self.metadata_dir().join(&self.metadata.snapshot_file)
    }

    /// Directory holding chunk blobs on a data node
    pub fn chunk_dir(&self) -> PathBuf {
        self.node.data_dir.join("chunks")
    }

    /// Get heartbeat interval as Duration
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.metadata.heartbeat_interval_ms)
    }

    /// Get connect timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.network.connect_timeout_ms)
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.network.request_timeout_ms)
    }

    /// Render a starter configuration file
    pub fn generate(node_id: &str, bind_address: &str, data_nodes: &[String]) -> String {
        let nodes = data_nodes
            .iter()
            .map(|n| format!("\"{}\"", n))
            .collect::<Vec<_>>()
            .join(", ");

        format!(
            r#"# WolfDFS configuration

[node]
id = "{node_id}"
bind_address = "{bind_address}"
data_dir = "/var/lib/wolfdfs"

[metadata]
# Data node addresses, in placement order. Changing the order changes
# where existing chunks are looked up.
data_nodes = [{nodes}]
chunk_size = {chunk_size}
heartbeat_interval_ms = {heartbeat}
snapshot_file = "metadata.snap"
snapshot_compression = false

[data_node]
cache_capacity = {cache}

[network]
connect_timeout_ms = {connect}
request_timeout_ms = {request}

[logging]
level = "info"
format = "pretty"
"#,
            chunk_size = default_chunk_size(),
            heartbeat = default_heartbeat_interval_ms(),
            cache = default_cache_capacity(),
            connect = default_connect_timeout_ms(),
            request = default_request_timeout_ms(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[node]
id = "meta-1"
bind_address = "0.0.0.0:7700"
data_dir = "/var/lib/wolfdfs"

[metadata]
data_nodes = ["dn-1:7701", "dn-2:7702", "dn-3:7703"]
chunk_size = 4096
"#;

        let config = WolfDfsConfig::from_str(toml).unwrap();
        assert_eq!(config.node.id, "meta-1");
        assert_eq!(config.metadata.data_nodes.len(), 3);
        assert_eq!(config.metadata.chunk_size, 4096);
        assert_eq!(config.heartbeat_interval(), Duration::from_millis(5000));
        assert_eq!(
            config.snapshot_path(),
            PathBuf::from("/var/lib/wolfdfs/metadata/metadata.snap")
        );
        config.validate_metadata().unwrap();
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let toml = r#"
[node]
id = "meta-1"
bind_address = "0.0.0.0:7700"

[metadata]
data_nodes = ["dn-1:7701"]
chunk_size = 0
"#;

        assert!(matches!(
            WolfDfsConfig::from_str(toml),
            Err(crate::Error::Config(_))
        ));
    }

    #[test]
    fn test_metadata_requires_data_nodes() {
        let toml = r#"
[node]
id = "dn-1"
bind_address = "0.0.0.0:7701"
"#;

        let config = WolfDfsConfig::from_str(toml).unwrap();
        assert!(config.validate_metadata().is_err());
    }

    #[test]
    fn test_duplicate_data_node_rejected() {
        let toml = r#"
[node]
id = "meta-1"
bind_address = "0.0.0.0:7700"

[metadata]
data_nodes = ["dn-1:7701", "dn-1:7701"]
"#;

        let config = WolfDfsConfig::from_str(toml).unwrap();
        assert!(config.validate_metadata().is_err());
    }

    #[test]
    fn test_generated_config_parses() {
        let rendered = WolfDfsConfig::generate(
            "meta-1",
            "0.0.0.0:7700",
            &["127.0.0.1:7701".to_string(), "127.0.0.1:7702".to_string()],
        );

        let config = WolfDfsConfig::from_str(&rendered).unwrap();
        assert_eq!(config.metadata.data_nodes.len(), 2);
        config.validate_metadata().unwrap();
    }
}
