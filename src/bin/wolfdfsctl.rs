//! WolfDFSCtl - Command line client for WolfDFS
//!
//! Usage:
//!   wolfdfsctl ls                 - List the current directory
//!   wolfdfsctl mkdir <name>       - Create a directory
//!   wolfdfsctl touch <name>       - Create an empty file
//!   wolfdfsctl put <local> <name> - Upload a local file
//!   wolfdfsctl get <name>         - Download a file
//!   wolfdfsctl status             - Show metadata authority status
//!
//! `--dir a/b` runs the command inside that directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde::Serialize;

use wolfdfs::client::{MetadataClient, MetadataStatus};
use wolfdfs::namespace::DirEntry;

/// WolfDFS client
#[derive(Parser)]
#[command(name = "wolfdfsctl")]
#[command(about = "Browse and transfer files on a WolfDFS cluster", long_about = None)]
struct Cli {
    /// Metadata authority address
    #[arg(short, long, default_value = "127.0.0.1:7700")]
    metadata: String,

    /// Directory to run the command in (slash separated, from the root)
    #[arg(short, long, default_value = "/")]
    dir: String,

    /// Print machine-readable JSON
    #[arg(long)]
    json: bool,

    /// Connect timeout in milliseconds
    #[arg(long, default_value_t = 2000)]
    connect_timeout_ms: u64,

    /// Request timeout in milliseconds
    #[arg(long, default_value_t = 30000)]
    request_timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a directory
    Ls {
        /// Child directory to list instead of the current one
        name: Option<String>,
    },
    /// Create a directory
    Mkdir { name: String },
    /// Create an empty file
    Touch { name: String },
    /// Resolve a path and print the directory it lands on
    Cd { path: String },
    /// Upload a local file
    Put {
        /// Local file to read
        local: PathBuf,
        /// Remote file name (created if missing)
        name: String,
    },
    /// Download a remote file
    Get {
        name: String,
        /// Write to this path instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show inode attributes of an entry
    Stat { name: String },
    /// Show metadata authority and data node status
    Status,
    /// Ask the metadata authority to write its snapshot now
    Snapshot,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut client = MetadataClient::new(
        cli.metadata.clone(),
        Duration::from_millis(cli.connect_timeout_ms),
        Duration::from_millis(cli.request_timeout_ms),
    );

    client
        .change_path(&cli.dir)
        .await
        .with_context(|| format!("cannot enter directory '{}'", cli.dir))?;

    match cli.command {
        Commands::Ls { name } => {
            let entries = match name {
                Some(name) => {
                    let parent = client.pwd().id.clone();
                    client.list_child(&parent, &name).await
                }
                None => client.list_dir(None).await,
            }
            .context("listing failed")?;
            print_entries(&entries, cli.json)
        }
        Commands::Mkdir { name } => {
            let entry = client.mkdir(&name).await.with_context(|| format!("mkdir '{}'", name))?;
            print_entry(&entry, cli.json)
        }
        Commands::Touch { name } => {
            let entry = client.create_file(&name).await.with_context(|| format!("touch '{}'", name))?;
            print_entry(&entry, cli.json)
        }
        Commands::Cd { path } => {
            let entry = client.change_path(&path).await.with_context(|| format!("cd '{}'", path))?;
            print_entry(&entry, cli.json)
        }
        Commands::Put { local, name } => put(&client, &local, &name, cli.json).await,
        Commands::Get { name, output } => get(&client, &name, output).await,
        Commands::Stat { name } => stat(&client, &name, cli.json).await,
        Commands::Status => {
            let status = client.status().await.context("status request failed")?;
            print_status(&status, cli.json)
        }
        Commands::Snapshot => {
            client.snapshot().await.context("snapshot request failed")?;
            println!("Snapshot written");
            Ok(())
        }
    }
}

// ============ Commands ============

async fn find_entry(client: &MetadataClient, name: &str) -> anyhow::Result<Option<DirEntry>> {
    let entries = client.list_dir(None).await?;
    Ok(entries.into_iter().find(|e| e.name == name))
}

async fn put(client: &MetadataClient, local: &Path, name: &str, json: bool) -> anyhow::Result<()> {
    let data = std::fs::read(local).with_context(|| format!("cannot read {}", local.display()))?;

    match find_entry(client, name).await? {
        Some(entry) if entry.is_dir => bail!("'{}' is a directory", name),
        Some(_) => {}
        None => {
            client.create_file(name).await.with_context(|| format!("cannot create '{}'", name))?;
        }
    }

    let size = data.len();
    client
        .write_file(name, data)
        .await
        .with_context(|| format!("write to '{}' failed", name))?;

    if json {
        println!("{}", serde_json::json!({ "name": name, "size": size }));
    } else {
        println!("Wrote {} bytes to {}", size, name);
    }
    Ok(())
}

async fn get(client: &MetadataClient, name: &str, output: Option<PathBuf>) -> anyhow::Result<()> {
    let data = client
        .read_file(name)
        .await
        .with_context(|| format!("read of '{}' failed", name))?;

    match output {
        Some(path) => {
            std::fs::write(&path, &data).with_context(|| format!("cannot write {}", path.display()))?;
            eprintln!("Read {} bytes into {}", data.len(), path.display());
        }
        None => {
            use std::io::Write;
            std::io::stdout().write_all(&data)?;
        }
    }
    Ok(())
}

async fn stat(client: &MetadataClient, name: &str, json: bool) -> anyhow::Result<()> {
    let entry = match find_entry(client, name).await? {
        Some(entry) => entry,
        None => bail!("'{}' not found in {}", name, client.pwd().name),
    };
    let info = client.get_inode(&entry.id).await?;

    if json {
        return print_json(&info);
    }

    println!("Name:        {}", info.name);
    println!("ID:          {}", info.id);
    println!("Type:        {}", if info.is_dir { "directory" } else { "file" });
    println!("Size:        {} bytes", info.size);
    println!("Chunks:      {}", info.chunk_count);
    println!(
        "Parent:      {}",
        info.parent_id.as_ref().map(|p| p.as_str()).unwrap_or("-")
    );
    println!("Permissions: {}", info.permissions);
    println!("Created:     {}", info.created.to_rfc3339());
    println!("Updated:     {}", info.updated.to_rfc3339());
    println!("Accessed:    {}", info.accessed.to_rfc3339());
    Ok(())
}

// ============ Output ============

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_entry(entry: &DirEntry, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(entry);
    }
    println!("{}{}  {}", entry.name, if entry.is_dir { "/" } else { "" }, entry.id);
    Ok(())
}

fn print_entries(entries: &[DirEntry], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&entries);
    }

    println!("{:<6} {:<30} {}", "TYPE", "NAME", "ID");
    println!("{}", "-".repeat(74));
    for entry in entries {
        let kind = if entry.is_dir { "dir" } else { "file" };
        println!("{:<6} {:<30} {}", kind, entry.name, entry.id);
    }
    Ok(())
}

fn print_status(status: &MetadataStatus, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(status);
    }

    println!();
    println!("WolfDFS Status (wolfdfsctl v{})", env!("CARGO_PKG_VERSION"));
    println!("==================================");
    println!();
    println!("Metadata node: {}", status.node_id);
    println!("Inodes:        {}", status.inode_count);
    println!("Chunk size:    {} bytes", status.chunk_size);
    println!();

    println!("{:<25} {:<10} {:<10} {}", "DATA NODE", "STATUS", "FAILURES", "LAST SEEN");
    println!("{}", "-".repeat(60));

    for node in &status.data_nodes {
        // Pad before adding color codes
        let status_padded = format!("{:<10}", node.status);
        let status_colored = match node.status.as_str() {
            "ACTIVE" => format!("\x1b[32m{}\x1b[0m", status_padded),
            "OFFLINE" => format!("\x1b[31m{}\x1b[0m", status_padded),
            _ => format!("\x1b[33m{}\x1b[0m", status_padded),
        };
        let last_seen = node
            .last_seen_ms
            .map(|ms| format!("{} ms ago", ms))
            .unwrap_or_else(|| "never".to_string());

        println!(
            "{:<25} {} {:<10} {}",
            node.address, status_colored, node.consecutive_failures, last_seen
        );
    }
    println!();

    Ok(())
}
