//! Admission-gated reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │               ADMISSION PROXY                │
//!   Client Request       │  ┌─────────┐   ┌────────────┐                │
//!   ─────────────────────┼─▶│  http   │──▶│ admission  │── GET /queues/{host}[/enable] ──▶ Admission
//!                        │  │ server  │   │   gate     │◀─ 200 / 429 + Set-Cookie ─────── Service
//!                        │  └─────────┘   └─────┬──────┘                │
//!                        │          Continue    │    Block(503)         │
//!                        │             ▼        └──────────┐            │
//!                        │  ┌────────────────┐             │            │
//!                        │  │ proxy handler  │─────────────┼────────────┼──▶ Origin
//!                        │  └────────────────┘             │            │
//!   Client Response      │                                 ▼            │
//!   ◀────────────────────┼──────── origin response  |  503 + queue hdrs │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use admission_proxy::config::loader::load_config;
use admission_proxy::config::watcher::ConfigWatcher;
use admission_proxy::config::ProxyConfig;
use admission_proxy::http::HttpServer;
use admission_proxy::lifecycle::{signals, Shutdown};
use admission_proxy::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "admission-proxy")]
#[command(about = "Reverse proxy gated by an external admission service", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!("admission-proxy v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.address,
        admission_enabled = config.admission.enabled,
        service_url = %config.admission.service_url,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, &config.admission);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        signals::shutdown_on_signal(&shutdown).await;
    });

    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
