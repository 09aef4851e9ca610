//! Taskgate Server - Main entry point

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use taskgate_core::{
    api::{self, AppState},
    auth::{PasswordHasher, RefreshTokenCleanup, TokenConfig, TokenService},
    config::{Config, StoreBackend},
    db::{MemoryStore, PgStore, Store},
    rbac::PolicyStore,
    telemetry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // A missing or placeholder signing secret is fatal.
    let config = Config::load().context("invalid configuration")?;

    let telemetry = telemetry::init_telemetry(&config.observability, "taskgate-server")?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = ?config.database.backend,
        "Starting Taskgate Server"
    );

    let store: Arc<dyn Store> = match config.database.backend {
        StoreBackend::Postgres => {
            let url = config
                .database
                .url
                .as_deref()
                .context("database.url is required for the postgres backend")?;
            let store = PgStore::connect(
                url,
                config.database.max_connections,
                config.database.min_connections,
            )
            .await?;
            store.migrate().await?;
            tracing::info!("Connected to database and applied migrations");
            Arc::new(store)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; all state is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let policy = PolicyStore::new(store.clone());
    policy.seed_defaults().await?;
    tracing::info!("Predefined roles seeded");

    let hasher = PasswordHasher::new(&config.auth.password_hashing)?;
    let tokens = TokenService::new(TokenConfig::try_from(&config.auth)?, store.clone(), policy);

    let cleanup = RefreshTokenCleanup::new(
        tokens.clone(),
        Duration::from_secs(config.auth.cleanup_interval_secs),
    )
    .spawn();

    let app_state = AppState::new(store, tokens, hasher, telemetry.metrics.clone())?;
    let app = api::build_router(app_state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.server.host, config.server.port))?;
    tracing::info!(address = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup
    cleanup.shutdown().await;
    telemetry.shutdown();
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
