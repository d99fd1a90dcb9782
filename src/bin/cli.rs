//! zerokv CLI Client
//!
//! Command-line interface for interacting with zerokv.

use clap::{Parser, Subcommand};
use zerokv::protocol::Frame;
use zerokv::{Client, Result};

/// zerokv CLI
#[derive(Parser, Debug)]
#[command(name = "zerokv-cli")]
#[command(about = "CLI for the zerokv key-value store")]
#[command(version)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:9900")]
    server: String,

    /// Namespace to select before running the command
    #[arg(short, long)]
    namespace: Option<String>,

    /// Namespace password
    #[arg(short, long)]
    password: Option<String>,

    /// Admin password
    #[arg(long)]
    auth: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ping the server
    Ping,

    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair (use "" as key for generated keys)
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Check whether a key exists
    Exists {
        key: String,
    },

    /// List the keys of the namespace
    Keys,

    /// Server information
    Info,

    /// List namespaces
    Nslist,

    /// Namespace information
    Nsinfo {
        name: String,
    },

    /// Create a namespace
    Nsnew {
        name: String,
    },

    /// Send any command as is
    Raw {
        args: Vec<String>,
    },
}

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("(error) {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut client = Client::connect(&args.server)?;

    if let Some(password) = &args.auth {
        client.auth(password)?;
    }
    if let Some(namespace) = &args.namespace {
        client.select(namespace, args.password.as_deref())?;
    }

    let reply = match args.command {
        Commands::Ping => client.command(&["PING"])?,
        Commands::Get { key } => client.command(&["GET", key.as_str()])?,
        Commands::Set { key, value } => client.command(&["SET", key.as_str(), value.as_str()])?,
        Commands::Del { key } => client.command(&["DEL", key.as_str()])?,
        Commands::Exists { key } => client.command(&["EXISTS", key.as_str()])?,
        Commands::Keys => {
            let mut cursor: Option<Vec<u8>> = None;
            while let Some(item) = client.scan(cursor.as_deref())? {
                println!(
                    "{}  ({} bytes, {})",
                    display_key(&item.key),
                    item.size,
                    item.timestamp
                );
                cursor = Some(item.key);
            }
            return Ok(());
        }
        Commands::Info => client.command(&["INFO"])?,
        Commands::Nslist => client.command(&["NSLIST"])?,
        Commands::Nsinfo { name } => client.command(&["NSINFO", name.as_str()])?,
        Commands::Nsnew { name } => client.command(&["NSNEW", name.as_str()])?,
        Commands::Raw { args } => client.command(&args[..])?,
    };

    print_frame(&reply, 0);
    Ok(())
}

/// Printable keys as text, binary keys (generated ids) as hex
fn display_key(key: &[u8]) -> String {
    match std::str::from_utf8(key) {
        Ok(text) if text.chars().all(|c| !c.is_control()) => format!("\"{}\"", text),
        _ => key.iter().map(|b| format!("{:02x}", b)).collect(),
    }
}

fn print_frame(frame: &Frame, depth: usize) {
    let indent = "  ".repeat(depth);
    match frame {
        Frame::Simple(text) => println!("{}{}", indent, text),
        Frame::Error(message) => println!("{}(error) {}", indent, message),
        Frame::Integer(n) => println!("{}(integer) {}", indent, n),
        Frame::Bulk(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) if text.contains('\n') => print!("{}", text),
            _ => println!("{}{}", indent, display_key(bytes)),
        },
        Frame::Null => println!("{}(nil)", indent),
        Frame::Array(items) if items.is_empty() => println!("{}(empty array)", indent),
        Frame::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                println!("{}{})", indent, i + 1);
                print_frame(item, depth + 1);
            }
        }
    }
}
