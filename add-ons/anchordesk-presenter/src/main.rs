//! Anchordesk presenter host.
//!
//! Loads `PresenterConfig`, spawns the presenter task, and serves the ingress
//! WebSocket plus the state/control endpoints until CTRL-C.

mod http;

use anchordesk_core::{spawn_presenter, DeskError, DeskResult, PresenterConfig};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env::var calls)
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[anchordesk-presenter] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "presenter exited with error");
        std::process::exit(1);
    }
}

async fn run() -> DeskResult<()> {
    let config = PresenterConfig::load()?;
    config.validate()?;

    let engine = config.speech.build_engine()?;
    let voices = Arc::new(config.voice_catalog());
    let (presenter, task) = spawn_presenter(config.controller_config(), engine, voices.clone());

    let app = http::router(http::AppState {
        presenter: presenter.clone(),
        voices,
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(
        addr = %config.bind_addr,
        engine = ?config.speech.engine,
        voices = config.voices.len(),
        "Anchordesk presenter listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    presenter.shutdown()?;
    task.await
        .map_err(|e| DeskError::ChannelReceive(e.to_string()))?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for CTRL-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("CTRL-C received; shutting down presenter");
}
