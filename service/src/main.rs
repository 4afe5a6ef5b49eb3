#![deny(
    clippy::expect_used,
    clippy::panic,
    clippy::print_stdout,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used
)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use edgehub_api::{
    config::Config,
    db::setup_database,
    edge::{spawn_nonce_purge, Clock, EdgeAuthState, EdgeRepo, PgEdgeRepo, SystemClock},
    http::build_router,
};
use eh_crypto::SecretSealer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Load and validate configuration first (fail-fast)
    let config = Config::load().map_err(|e| anyhow::anyhow!("{e}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.logging.level)?)
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "edgehub-api starting up"
    );

    tracing::info!("Connecting to database...");
    let pool = setup_database(&config.database).await?;

    let sealer = Arc::new(SecretSealer::from_base64url(&config.edge_auth.secret_key)?);
    let repo: Arc<dyn EdgeRepo> = Arc::new(PgEdgeRepo::new(pool));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let edge_auth = &config.edge_auth;
    tracing::info!(
        timestamp_tolerance_secs = edge_auth.timestamp_tolerance_secs,
        nonce_retention_secs = edge_auth.nonce_retention_secs,
        purge_interval_secs = edge_auth.purge_interval_secs,
        trusted_proxies = ?edge_auth.trusted_proxies,
        "Edge authentication configured"
    );

    let purge_task = spawn_nonce_purge(
        repo.clone(),
        clock.clone(),
        chrono::Duration::seconds(edge_auth.nonce_retention_secs),
        Duration::from_secs(edge_auth.purge_interval_secs),
    );

    let app = build_router(EdgeAuthState::new(repo, sealer, clock, edge_auth));

    let listener =
        tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    tracing::info!("Starting server at http://{}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    purge_task.abort();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
