//! # courier-server
//!
//! Courier server binary: loads settings, wires the session service into
//! the WebSocket server and serves until Ctrl-C.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use courier_server::shutdown::DEFAULT_SHUTDOWN_TIMEOUT;
use courier_server::{CourierServer, ServerConfig};
use courier_session::{SessionConfig, SessionService};
use courier_settings::loader;

/// Courier messaging server.
#[derive(Parser, Debug)]
#[command(name = "courier-server", version, about = "Courier messaging server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(short, long)]
    port: Option<u16>,

    /// Settings file (defaults to `~/.courier/settings.json`).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level filter (overrides settings; `RUST_LOG` still wins).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = cli.config.unwrap_or_else(loader::settings_path);
    let settings = loader::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;

    courier_core::logging::init_subscriber(
        cli.log_level.as_deref().unwrap_or(&settings.logging.level),
        settings.logging.json,
    );

    let mut config = ServerConfig::from_settings(&settings);
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    let service = Arc::new(SessionService::new(SessionConfig {
        mailbox_capacity: settings.mailbox.capacity,
        batch_limit: settings.mailbox.batch_limit,
    }));
    let server = CourierServer::new(config, service);

    let (addr, handle) = server
        .listen()
        .await
        .with_context(|| format!("Failed to bind {}", server.config().bind_addr()))?;
    tracing::info!(
        %addr,
        version = courier_core::constants::VERSION,
        mailbox_capacity = settings.mailbox.capacity,
        batch_limit = settings.mailbox.batch_limit,
        "courier server ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("shutdown requested");

    let drained = server
        .shutdown()
        .drain(vec![handle], Some(DEFAULT_SHUTDOWN_TIMEOUT))
        .await;
    tracing::info!(
        drained,
        sessions = server.service().session_count(),
        "server stopped"
    );
    Ok(())
}
