//! stream-control console entry point.
//!
//! Opens the configured control channels and serves the console REST API
//! and WebSocket event feed until interrupted.

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use stream_control::api;
use stream_control::app_state::AppState;
use stream_control::channel::{ChannelRegistry, WsConnector};
use stream_control::config::ConsoleConfig;
use stream_control::domain::EventBus;
use stream_control::ws::handler::ws_handler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConsoleConfig::from_env().context("loading configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(addr = %config.listen_addr, channels = config.channels.len(), "starting stream-control console");

    // Build channel layer
    let event_bus = EventBus::new(config.event_bus_capacity);
    let registry = Arc::new(ChannelRegistry::new(
        Arc::new(WsConnector::new()),
        event_bus.clone(),
    ));
    for settings in config.channels {
        registry
            .open(settings)
            .await
            .context("opening configured channel")?;
    }

    let app_state = AppState {
        registry: Arc::clone(&registry),
        event_bus,
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.shutdown_all().await;
    tracing::info!("all channels shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
    tracing::info!("shutdown requested");
}
