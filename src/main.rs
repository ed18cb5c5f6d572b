//! minihttpd server binary.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌───────────────────────────────────────────────────────┐
//!                 │                      MINIHTTPD                        │
//!                 │                                                       │
//!   TCP bytes     │  ┌──────────┐   ┌──────────┐   ┌──────┐   ┌────────┐  │
//!   ──────────────┼─▶│   net    │──▶│  http    │──▶│ auth │──▶│ router │  │
//!                 │  │ listener │   │ request  │   │ gate │   │        │  │
//!                 │  └──────────┘   └────┬─────┘   └──────┘   └───┬────┘  │
//!                 │                      │ '{'                    │       │
//!                 │                      ▼                        ▼       │
//!   Reply bytes   │               ┌────────────┐   ┌──────────┐ ┌───────┐ │
//!   ◀─────────────┼───────────────│   batch    │   │ chunked  │ │buffer-│ │
//!                 │               │ dispatcher │   │ streamer │ │  ed   │ │
//!                 │               └────────────┘   └──────────┘ └───────┘ │
//!                 └───────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use minihttpd::config::{load_config, validate_config, ServerConfig};
use minihttpd::lifecycle::{signals, Shutdown};
use minihttpd::net::Listener;
use minihttpd::observability::init_logging;
use minihttpd::HttpServer;

#[derive(Parser)]
#[command(name = "minihttpd")]
#[command(about = "Minimal HTTP-like server with chunked streaming and batch requests", long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults are used when omitted.
    #[arg(short, long, env = "MINIHTTPD_CONFIG")]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,

    /// Override observability.log_level.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    validate_config(&config).map_err(minihttpd::config::ConfigError::Validation)?;

    init_logging(&config.observability.log_level)?;

    tracing::info!("minihttpd v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        fragments = config.streaming.fragments.len(),
        chunk_delay_ms = config.streaming.chunk_delay_ms,
        batch_ordering = ?config.batch.ordering,
        "Configuration loaded"
    );

    let listener = Listener::bind(&config.listener).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    signals::install(shutdown.clone());

    let server = HttpServer::new(&config);
    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
