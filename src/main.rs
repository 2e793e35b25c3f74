//! dv-proxy
//!
//! A forwarding HTTP proxy whose name resolution is steered by a small
//! network of simulated distance-vector routers.
//!
//! # Architecture Overview
//!
//! ```text
//!                              ┌──────────────────────────────────────────────────────┐
//!                              │                       DV-PROXY                        │
//!                              │                                                       │
//!     Client Request           │  ┌─────────┐    ┌─────────┐    ┌──────────────┐      │
//!     ─────────────────────────┼─▶│   net   │───▶│  proxy  │───▶│   resolve    │      │
//!                              │  │listener │    │ session │    │ table → DNS  │      │
//!                              │  └─────────┘    └────┬────┘    └──────┬───────┘      │
//!                              │                      │                │ reads        │
//!                              │                      │                ▼              │
//!                              │                      │        ┌──────────────┐      │
//!                              │                      │        │    shared    │      │
//!                              │                      │        │  resolution  │      │
//!                              │                      │        └──────▲───────┘      │
//!                              │                      │               │ exports      │
//!     Client Response          │                      │        ┌──────┴───────┐      │
//!     ◀────────────────────────┼──────────────────────┤        │   routers    │◀─UDP─┼──▶ neighbors
//!                              │                      │        │ (dv tables)  │      │
//!                              │                      ▼        └──────────────┘      │
//!                              │               Origin Server                         │
//!                              │                                                       │
//!                              │  ┌───────────────────────────────────────────────┐   │
//!                              │  │ config │ observability │ admin │ lifecycle    │   │
//!                              │  └───────────────────────────────────────────────┘   │
//!                              └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use dv_proxy::config::load_or_default;
use dv_proxy::lifecycle::{self, signals, Shutdown};
use dv_proxy::observability::{logging, metrics};

/// How long the process waits for subsystems after a shutdown signal.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "dv-proxy", version)]
#[command(about = "Forwarding HTTP proxy steered by simulated distance-vector routers", long_about = None)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_or_default(args.config.as_deref())?;
    if let Some(level) = args.log_level {
        config.observability.log_level = level;
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dv-proxy starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        routers = config.routers.len(),
        advertise_interval_ms = config.routing.advertise_interval_ms,
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

    let shutdown = Shutdown::new();
    let node = lifecycle::start(&config, &shutdown).await?;

    signals::wait_for_signal().await;
    shutdown.trigger();

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, node.join()).await.is_err() {
        tracing::warn!("Shutdown timeout reached, exiting anyway");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
