//! SimpleDB Server Binary
//!
//! Starts the TCP server for SimpleDB.

use std::sync::Arc;

use clap::Parser;
use simpledb::network::Server;
use simpledb::protocol::Limits;
use simpledb::{Config, DbError, Engine, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// SimpleDB Server
#[derive(Parser, Debug)]
#[command(name = "simpledb-server")]
#[command(about = "In-memory key-value store")]
#[command(version)]
struct Args {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "31337")]
    port: u16,

    /// Maximum concurrent client sessions
    #[arg(short, long, default_value = "64")]
    max_connections: usize,

    /// Close idle connections after this many milliseconds (0 = never)
    #[arg(long, default_value = "0")]
    read_timeout_ms: u64,

    /// Largest accepted bulk string in MB
    #[arg(long, default_value = "64")]
    max_bulk_mb: usize,

    /// Largest accepted request frame in MB
    #[arg(long, default_value = "128")]
    max_frame_mb: usize,
}

/// Convert a megabyte flag to bytes
fn megabytes(flag: &str, mb: usize) -> Result<usize> {
    mb.checked_mul(1024 * 1024)
        .ok_or_else(|| DbError::Config(format!("--{} {} is too large", flag, mb)))
}

fn limits_from(args: &Args) -> Result<Limits> {
    Ok(Limits {
        max_bulk_len: megabytes("max-bulk-mb", args.max_bulk_mb)?,
        max_frame_len: megabytes("max-frame-mb", args.max_frame_mb)?,
        ..Limits::default()
    })
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,simpledb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();
    let listen_addr = format!("{}:{}", args.host, args.port);

    tracing::info!("SimpleDB Server v{}", simpledb::VERSION);
    tracing::info!("Listen address: {}", listen_addr);

    let limits = match limits_from(&args) {
        Ok(limits) => limits,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Build config from args
    let config = Config::builder()
        .listen_addr(listen_addr)
        .max_connections(args.max_connections)
        .read_timeout_ms(args.read_timeout_ms)
        .limits(limits)
        .build();

    let engine = Arc::new(Engine::new());

    let server = match Server::bind(config, engine) {
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

    tracing::info!("Server stopped");
}
