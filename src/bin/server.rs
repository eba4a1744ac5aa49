//! LedgerKV Server Binary
//!
//! Recovers the store from the transaction log and serves it over HTTP.

use std::sync::Arc;

use clap::Parser;
use ledgerkv::config::{LogBackend, WalSyncStrategy};
use ledgerkv::network::Server;
use ledgerkv::{Config, Engine};
use tracing_subscriber::{fmt, EnvFilter};

/// LedgerKV Server
#[derive(Parser, Debug)]
#[command(name = "ledgerkv-server")]
#[command(about = "Key-value store over HTTP with a replayable transaction log")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./ledgerkv_data")]
    data_dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    listen: String,

    /// Transaction log backend: file or sqlite
    #[arg(short, long, default_value = "file")]
    backend: LogBackend,

    /// Pending-event queue capacity
    #[arg(short, long, default_value = "16")]
    queue_capacity: usize,

    /// fsync the log file every N events (1 = every write)
    #[arg(short = 's', long, default_value = "100")]
    sync_every: usize,
}

#[tokio::main]
async fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,ledgerkv=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("LedgerKV Server v{}", ledgerkv::VERSION);
    tracing::info!("Data directory: {}", args.data_dir);
    tracing::info!("Log backend: {:?}", args.backend);

    let sync_strategy = match args.sync_every {
        1 => WalSyncStrategy::EveryWrite,
        count => WalSyncStrategy::EveryNEntries { count },
    };

    // Build config from args
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .listen_addr(&args.listen)
        .log_backend(args.backend)
        .queue_capacity(args.queue_capacity)
        .wal_sync_strategy(sync_strategy)
        .build();

    // Recovery runs before any request is accepted
    let engine = match Engine::open(config.clone()) {
        Ok(e) => Arc::new(e),
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Engine initialized: {} keys, last sequence {}",
        engine.key_count(),
        engine.last_sequence()
    );

    let server = match Server::bind(&config.listen_addr, Arc::clone(&engine)).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Server error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run(shutdown_signal()).await {
        tracing::error!("Server error: {}", e);
    }

    // Drain whatever is still queued before exiting
    if let Err(e) = engine.close() {
        tracing::error!("Failed to drain transaction log: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C, initiating shutdown...");
}
