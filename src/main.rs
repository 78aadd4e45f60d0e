//! Deferred response demo server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http::server ──▶ DeferredResponse::new ──▶ registry
//!                    │                   │
//!                    │ apply_policy /    │ clone
//!                    │ set_timeout       ▼
//!                    │            background worker ── resume ──┐
//!                    │                                          ▼
//!                    │            timer::TokioScheduler ─ fire ─▶ first terminator wins
//!                    │                                          ▲
//!                    │            shutdown / cancel endpoint ───┘
//!                    ▼
//!     Client ◀── http::response ◀── wait() outcome
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use deferred_response::config::watcher::ConfigWatcher;
use deferred_response::config::{load_config, ServiceConfig};
use deferred_response::lifecycle::signals::shutdown_signal;
use deferred_response::observability::{logging, metrics};
use deferred_response::{DeferredServer, Shutdown};

#[derive(Parser)]
#[command(name = "deferred-response")]
#[command(about = "Deferred response demo server", long_about = None)]
struct Args {
    /// Path to a TOML configuration file. Watched for changes.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    logging::init(&config.observability)?;
    tracing::info!("deferred-response v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        default_timeout_secs = ?config.timeouts.default_secs,
        routes = config.routes.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    // Keep the watcher alive for the lifetime of the server.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let grace = Duration::from_millis(config.timeouts.shutdown_grace_ms);
    let shutdown = Shutdown::new();
    let server = DeferredServer::new(config);
    let mut server_task = tokio::spawn(server.run(listener, config_updates, shutdown.subscribe()));

    tokio::select! {
        res = &mut server_task => {
            res??;
            return Ok(());
        }
        _ = shutdown_signal() => {}
    }

    shutdown.trigger();
    match tokio::time::timeout(grace, server_task).await {
        Ok(res) => res??,
        Err(_) => tracing::warn!(grace_ms = grace.as_millis() as u64, "Drain exceeded grace period"),
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
