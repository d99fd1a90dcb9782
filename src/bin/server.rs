//! zerokv Server Binary
//!
//! Starts the TCP server for zerokv.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use zerokv::network::Server;
use zerokv::{Config, Engine, KeyMode, SyncStrategy};

/// zerokv Server
#[derive(Parser, Debug)]
#[command(name = "zerokv-server")]
#[command(about = "Append-only key-value store speaking the Redis protocol")]
#[command(version)]
struct Args {
    /// Data segment directory
    #[arg(long, default_value = "./zerokv_data/data")]
    data: String,

    /// Index segment directory
    #[arg(long, default_value = "./zerokv_data/index")]
    index: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:9900")]
    listen: String,

    /// Key mode: user, seq, direct or block
    #[arg(long, default_value = "user")]
    mode: KeyMode,

    /// Segment size in bytes before rotation
    #[arg(long, default_value_t = zerokv::config::DEFAULT_SEGMENT_SIZE)]
    datasize: u64,

    /// fsync after every write
    #[arg(long)]
    sync: bool,

    /// Admin password (every client is admin when unset)
    #[arg(long)]
    admin: Option<String>,

    /// Maximum concurrent connections
    #[arg(short, long, default_value = "1024")]
    max_connections: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,zerokv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("zerokv Server v{}", zerokv::VERSION);
    tracing::info!("Data directory: {}", args.data);
    tracing::info!("Index directory: {}", args.index);
    tracing::info!("Listen address: {}", args.listen);

    // Build config from args
    let mut builder = Config::builder()
        .data_dir(&args.data)
        .index_dir(&args.index)
        .listen_addr(&args.listen)
        .key_mode(args.mode)
        .segment_size(args.datasize)
        .max_connections(args.max_connections);

    if args.sync {
        builder = builder.sync_strategy(SyncStrategy::EveryWrite);
    }
    if let Some(password) = &args.admin {
        builder = builder.admin_password(password);
    }
    let config = builder.build();

    // Open engine
    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!("Engine initialized successfully");

    // Start server
    let server = match Server::bind(config, Arc::clone(&engine)) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to start server: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    drop(server);
    match Arc::try_unwrap(engine) {
        Ok(engine) => {
            if let Err(e) = engine.close() {
                tracing::error!("Failed to close engine: {}", e);
            }
        }
        Err(_) => tracing::warn!("Engine still in use at exit, skipping close"),
    }
}
