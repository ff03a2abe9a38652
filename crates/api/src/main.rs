use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use stemdeck_api::config::{LogFormat, ServerConfig};
use stemdeck_api::router::build_app_router;
use stemdeck_api::state::AppState;
use stemdeck_engine::EngineApi;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let mut config = ServerConfig::from_env();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "stemdeck_api=debug,stemdeck_engine=debug,tower_http=debug".into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Storage ---
    // Engines report absolute output paths, so pin the roots down once.
    for dir in [&mut config.storage.upload_dir, &mut config.storage.output_dir] {
        tokio::fs::create_dir_all(&*dir)
            .await
            .unwrap_or_else(|e| panic!("Failed to create storage dir {}: {e}", dir.display()));
        *dir = tokio::fs::canonicalize(&*dir)
            .await
            .unwrap_or_else(|e| panic!("Failed to resolve storage dir {}: {e}", dir.display()));
    }
    tracing::info!(
        upload_dir = %config.storage.upload_dir.display(),
        output_dir = %config.storage.output_dir.display(),
        "Storage directories ready"
    );

    // --- Engine client ---
    let engine = Arc::new(EngineApi::new(
        config.engine.url.clone(),
        config.engine.timeouts,
    ));
    tracing::info!(url = %engine.api_url(), "Engine client configured");

    // --- App state ---
    let state = AppState::new(config.clone(), engine);
    let orchestrator = Arc::clone(&state.orchestrator);
    tracing::info!(
        max_concurrent_jobs = config.max_concurrent_jobs,
        "Processing orchestrator started"
    );

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    if orchestrator.shutdown(grace).await {
        tracing::info!("All job tasks finished");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
