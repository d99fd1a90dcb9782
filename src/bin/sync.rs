//! zerokv Sync Binary
//!
//! Copies one namespace from a source server to a remote server.

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};
use zerokv::sync::{SyncOptions, Synchronizer};

/// zerokv namespace synchronizer
#[derive(Parser, Debug)]
#[command(name = "zerokv-sync")]
#[command(about = "Copy a namespace between two zerokv servers")]
#[command(version)]
struct Args {
    /// Source host
    #[arg(long, default_value = "127.0.0.1")]
    source_host: String,

    /// Source port
    #[arg(long, default_value_t = 9900)]
    source_port: u16,

    /// Remote (target) host
    #[arg(long)]
    remote_host: String,

    /// Remote (target) port
    #[arg(long, default_value_t = 9900)]
    remote_port: u16,

    /// Namespace to copy
    #[arg(long, default_value = "default")]
    namespace: String,

    /// Namespace password
    #[arg(long)]
    password: Option<String>,
}

fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,zerokv=debug"));
    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();

    let mut options = SyncOptions::new(
        format!("{}:{}", args.source_host, args.source_port),
        format!("{}:{}", args.remote_host, args.remote_port),
    );
    options.namespace = args.namespace;
    options.password = args.password;

    let status = Synchronizer::connect(options).and_then(|mut sync| sync.run());

    match status {
        Ok(status) => {
            println!(
                "{} keys copied ({} bytes), {} requested, {} expected",
                status.copied, status.transferred, status.requested, status.keys
            );
        }
        Err(e) => {
            tracing::error!("Sync failed: {}", e);
            std::process::exit(1);
        }
    }
}
