//! Exoplanet explorer proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────┐
//!                      │                EXOPLANET PROXY               │
//!   Browser request    │  ┌────────┐   ┌───────────┐   ┌──────────┐   │
//!  ────────────────────┼─▶│  http  │──▶│  handler  │──▶│  cache   │   │
//!                      │  │ server │   │ archive / │   │ (TTL map)│   │
//!                      │  └────────┘   │ predict / │   └────┬─────┘   │
//!                      │               │ chat      │        │ miss    │
//!                      │               └───────────┘        ▼         │
//!   Browser response   │                              ┌──────────┐    │
//!  ◀───────────────────┼──────────────────────────────│ upstream │◀───┼── Archive / model /
//!                      │                              │  client  │    │   completion service
//!                      │                              └──────────┘    │
//!                      │  config · observability · lifecycle          │
//!                      └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use exoplanet_proxy::config::loader::apply_bind_override;
use exoplanet_proxy::config::{load_config, ConfigWatcher, ProxyConfig};
use exoplanet_proxy::lifecycle::{signals, Shutdown};
use exoplanet_proxy::observability::{logging, metrics};
use exoplanet_proxy::HttpServer;

#[derive(Parser)]
#[command(name = "exoplanet-proxy")]
#[command(about = "Caching proxy for the exoplanet explorer front-end", long_about = None)]
struct Cli {
    /// TOML configuration file, watched for changes.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding config and PORT.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::from_env()?,
    };
    apply_bind_override(&mut config, cli.bind.as_deref());

    logging::init_logging(&config.observability.log_level);

    tracing::info!("exoplanet-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream_timeout_secs = config.timeouts.upstream_secs,
        archive_cache_ttl_secs = config.archive.cache_ttl_secs,
        chat_configured = config.chat.credentials().is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, config.clone());
            match watcher.with_bind_override(cli.bind.clone()).run() {
                Ok(handle) => (Some(handle), updates),
                Err(e) => {
                    tracing::warn!(error = %e, "Config hot reload unavailable");
                    (None, updates)
                }
            }
        }
        None => (None, mpsc::unbounded_channel().1),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        signals::shutdown_on_signal(&signal_shutdown).await;
    });

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
