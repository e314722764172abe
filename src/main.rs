//! WolfDFS - Chunked Distributed File Store
//!
//! Server binary: runs either the metadata authority or a data node.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wolfdfs::config::{LoggingConfig, WolfDfsConfig};
use wolfdfs::datanode::DataNodeService;
use wolfdfs::error::Result;
use wolfdfs::metadata::MetadataService;
use wolfdfs::network::{NetworkClient, NetworkServer, RequestHandler};
use wolfdfs::placement::RemoteChunkTransport;

/// WolfDFS - Chunked Distributed File Store
#[derive(Parser)]
#[command(name = "wolfdfs")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "wolfdfs.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(short, long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the metadata authority
    Metadata,

    /// Run a data node
    DataNode,

    /// Initialize a new configuration file
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "wolfdfs.toml")]
        output: PathBuf,

        /// Node ID
        #[arg(long, default_value = "meta-1")]
        node_id: String,

        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:7700")]
        bind: String,

        /// Data node address (repeat for each node, in placement order)
        #[arg(long = "data-node")]
        data_nodes: Vec<String>,
    },

    /// Validate configuration file
    Validate,

    /// Show node information
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The logging section is optional; fall back to defaults if the file is unusable
    let logging = WolfDfsConfig::from_file(&cli.config)
        .map(|c| c.logging)
        .unwrap_or_default();
    init_logging(cli.log_level.as_deref().unwrap_or(&logging.level), &logging);

    match cli.command {
        Commands::Metadata => run_metadata(cli.config).await,
        Commands::DataNode => run_data_node(cli.config).await,
        Commands::Init { output, node_id, bind, data_nodes } => {
            run_init(output, node_id, bind, data_nodes)
        }
        Commands::Validate => run_validate(cli.config),
        Commands::Info => run_info(cli.config),
    }
}

/// Initialize logging
fn init_logging(level: &str, logging: &LoggingConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn load_config(config_path: &Path) -> Result<WolfDfsConfig> {
    match WolfDfsConfig::from_file(config_path) {
        Ok(c) => {
            tracing::info!("Loaded configuration for node: {}", c.node.id);
            Ok(c)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration from {:?}: {}", config_path, e);
            tracing::error!("Please check that the config file exists and is valid TOML");
            Err(e)
        }
    }
}

/// Serve `handler` until ctrl-c, then stop the listener and wait for
/// requests already in flight
async fn serve_until_shutdown(bind_address: &str, handler: Arc<dyn RequestHandler>) -> Result<()> {
    let server = Arc::new(NetworkServer::bind(bind_address, handler).await?);
    let runner = Arc::clone(&server);
    let mut server_task = tokio::spawn(async move { runner.run().await });

    let finished = tokio::select! {
        result = &mut server_task => {
            match result {
                Ok(Ok(())) => tracing::warn!("Network server exited"),
                Ok(Err(e)) => tracing::error!("Network server error: {}", e),
                Err(e) => tracing::error!("Network server task failed: {}", e),
            }
            true
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
            false
        }
    };

    server.stop();
    if !finished {
        if let Err(e) = server_task.await {
            tracing::error!("Network server task failed: {}", e);
        }
    }
    server.drain().await;
    Ok(())
}

/// Run the metadata authority
async fn run_metadata(config_path: PathBuf) -> Result<()> {
    tracing::info!("Starting WolfDFS metadata authority...");

    let config = load_config(&config_path)?;
    config.validate_metadata()?;

    if let Err(e) = std::fs::create_dir_all(config.metadata_dir()) {
        tracing::error!("Failed to create metadata directory {:?}: {}", config.metadata_dir(), e);
        return Err(e.into());
    }

    let network = Arc::new(NetworkClient::new(config.connect_timeout(), config.request_timeout()));
    let transport = Arc::new(RemoteChunkTransport::new(network));
    let service = Arc::new(MetadataService::from_config(&config, transport)?);

    tracing::info!(
        "Placing {} byte chunks over {} data nodes: {:?}",
        config.metadata.chunk_size,
        config.metadata.data_nodes.len(),
        config.metadata.data_nodes
    );

    let monitor = service.spawn_monitor(config.heartbeat_interval());

    let handler: Arc<dyn RequestHandler> = service.clone();
    let served = serve_until_shutdown(&config.node.bind_address, handler).await;

    // Listener is down and in-flight requests are done; stop probing before the final snapshot
    monitor.shutdown().await;

    match service.save_snapshot().await {
        Ok(bytes) => tracing::info!("Saved snapshot to {:?} ({} bytes)", config.snapshot_path(), bytes),
        Err(e) => {
            tracing::error!("Failed to save snapshot to {:?}: {}", config.snapshot_path(), e);
            return Err(e);
        }
    }

    tracing::info!("Metadata authority stopped");
    served
}

/// Run a data node
async fn run_data_node(config_path: PathBuf) -> Result<()> {
    tracing::info!("Starting WolfDFS data node...");

    let config = load_config(&config_path)?;

    let service = match DataNodeService::from_config(&config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to open chunk directory {:?}: {}", config.chunk_dir(), e);
            return Err(e);
        }
    };
    tracing::info!(
        "Serving chunks from {:?} ({} stored)",
        config.chunk_dir(),
        service.store().chunk_count().unwrap_or(0)
    );

    serve_until_shutdown(&config.node.bind_address, Arc::new(service)).await?;

    tracing::info!("Data node stopped");
    Ok(())
}

/// Initialize configuration file
fn run_init(output: PathBuf, node_id: String, bind: String, data_nodes: Vec<String>) -> Result<()> {
    let config_content = WolfDfsConfig::generate(&node_id, &bind, &data_nodes);

    std::fs::write(&output, config_content)?;
    println!("Configuration file created: {}", output.display());
    println!("\nEdit the file to configure the data nodes and storage paths.");
    println!("Then start with: wolfdfs --config {} metadata", output.display());

    Ok(())
}

/// Validate configuration
fn run_validate(config_path: PathBuf) -> Result<()> {
    let result = WolfDfsConfig::from_file(&config_path).and_then(|config| {
        if !config.metadata.data_nodes.is_empty() {
            config.validate_metadata()?;
        }
        Ok(config)
    });

    match result {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!("  Node ID: {}", config.node.id);
            println!("  Bind Address: {}", config.node.bind_address);
            println!("  Data Nodes: {}", config.metadata.data_nodes.len());
            println!("  Chunk Size: {} bytes", config.metadata.chunk_size);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration error: {}", e);
            Err(e)
        }
    }
}

/// Show node information
fn run_info(config_path: PathBuf) -> Result<()> {
    let config = WolfDfsConfig::from_file(&config_path)?;

    println!("WolfDFS Node Information");
    println!("========================");
    println!();
    println!("Node ID:          {}", config.node.id);
    println!("Bind Address:     {}", config.node.bind_address);
    println!("Data Directory:   {}", config.data_dir().display());
    println!();
    println!("Metadata Authority:");
    println!("  Data Nodes:     {:?}", config.metadata.data_nodes);
    println!("  Chunk Size:     {} bytes", config.metadata.chunk_size);
    println!("  Heartbeat:      {} ms", config.metadata.heartbeat_interval_ms);
    println!("  Snapshot:       {}", config.snapshot_path().display());
    println!("  Compression:    {}", config.metadata.snapshot_compression);
    println!();
    println!("Data Node:");
    println!("  Chunk Dir:      {}", config.chunk_dir().display());
    println!("  Cache:          {} chunks", config.data_node.cache_capacity);
    println!();
    println!("Network:");
    println!("  Connect:        {} ms", config.network.connect_timeout_ms);
    println!("  Request:        {} ms", config.network.request_timeout_ms);

    Ok(())
}
