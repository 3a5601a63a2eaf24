use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use flowdeck_bridge::{AgentBridge, BridgeConfig, BridgeLogEntry};
use flowdeck_engine::SchemaLoader;
use tokio::sync::mpsc;
use tracing::{Level, debug};

/// Host the Flowdeck agent bridge from the command line.
#[derive(Parser, Debug)]
#[command(name = "flowdeck", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the agent bridge on a loopback port until interrupted.
    Serve {
        /// Path to a JSON bridge configuration file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Context directory containing workflow-schema.md
        #[arg(long)]
        context_dir: Option<PathBuf>,
        /// Override the loopback bind address (host:port)
        #[arg(long)]
        bind: Option<String>,
    },
    /// Print the workflow schema documentation.
    Schema {
        /// Context directory containing workflow-schema.md
        #[arg(long)]
        context_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    match Cli::parse().command {
        Command::Serve { config, context_dir, bind } => serve(config, context_dir, bind).await,
        Command::Schema { context_dir } => print_schema(context_dir),
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_max_level(Level::INFO)
        .try_init();
}

async fn serve(config_path: Option<PathBuf>, context_dir: Option<PathBuf>, bind: Option<String>) -> Result<()> {
    let mut config = match config_path {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };
    if bind.is_some() {
        config.bind_address = bind;
    }

    let (log_sender, mut log_receiver) = mpsc::unbounded_channel::<BridgeLogEntry>();
    let bridge = AgentBridge::new(config).with_log_sender(log_sender);

    let drain_handle = tokio::spawn(async move {
        while let Some(entry) = log_receiver.recv().await {
            debug!(payload = ?entry.payload, "{}", entry.message);
        }
    });

    let port = bridge.start(context_dir.as_deref()).await?;
    println!("agent bridge listening on http://127.0.0.1:{port}/mcp");

    tokio::signal::ctrl_c().await?;
    bridge.stop().await?;
    drain_handle.abort();
    Ok(())
}

fn print_schema(context_dir: Option<PathBuf>) -> Result<()> {
    let loader = SchemaLoader::new();
    if let Some(directory) = context_dir {
        loader.set_base_dir(directory);
    }
    println!("{}", loader.load()?);
    Ok(())
}
