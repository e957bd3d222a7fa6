//! # geoentry-server
//!
//! HTTP host for the geoentry home proximity system.
//!
//! The server embeds the proximity engine and provides:
//! - REST API for zones, detection state, history and settings
//! - An endpoint for the device to report location fixes
//! - The background watch and presence poller
//! - Structured logging to file and stdout
//!
//! ## Running
//!
//! ```bash
//! # Development
//! cargo run --package geoentry-server
//!
//! # With an explicit config file
//! ./geoentry-server /etc/geoentry/config.toml
//! ```
//!
//! The config path may also be given in `GEOENTRY_CONFIG`.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use geoentry_core::GeoentryConfig;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use geoentry_server::{api, logging, state::AppState};

const CONFIG_PATH_ENV: &str = "GEOENTRY_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
        .unwrap_or_else(GeoentryConfig::default_path);

    let config = GeoentryConfig::load_or_default(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    logging::init(config.server.production)?;
    info!(config = %config_path.display(), "Starting geoentry-server");

    let addr: SocketAddr = config
        .server
        .bind_address
        .parse()
        .with_context(|| format!("invalid bind address {}", config.server.bind_address))?;

    let state = AppState::new(config)?;
    if let Err(e) = state.start_background().await {
        warn!(error = %e, "Location watch not started");
    }

    let app = api::create_router(state.clone())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.shutdown();
    info!("geoentry-server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
