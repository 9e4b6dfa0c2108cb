//! Tianguis HTTP server.
//!
//! # Environment Variables
//!
//! - `TIANGUIS_CONFIG`: optional path to a TOML config file
//! - `GEMINI_API_KEY`, `GEMINI_API_KEY_BACKUP`, `GEMINI_API_KEY_BACKUP_2` …
//!   `GEMINI_API_KEY_BACKUP_10`: generation credentials
//! - `RUST_LOG`: overrides the configured log filter

use std::net::SocketAddr;

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use tianguis_llm::KeyRotationPool;
use tianguis_server::{AppState, config, router, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config::load_config(|name| std::env::var(name).ok())?;
    telemetry::init(&config.logging)?;

    let addr: SocketAddr = config
        .server
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address {}", config.server.bind_addr))?;

    let orchestrator = config::build_orchestrator(&config, KeyRotationPool::from_env())?;
    tracing::info!(
        model = %config.generation.model,
        credentials = orchestrator.generator().pool().len(),
        min_rounds = config.session.min_rounds,
        max_rounds = config.session.max_rounds,
        persistence = %config.persistence.backend,
        "Starting tianguis server"
    );

    let app = router(AppState::new(orchestrator))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        },
    }
}
