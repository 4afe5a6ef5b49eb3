use sqlx_core::migrate::Migrator;
use sqlx_postgres::{PgPool, PgPoolOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::DatabaseConfig;

/// Connect to the database, retrying while it comes up, and run migrations.
///
/// # Errors
///
/// Returns an error if the database stays unreachable for the whole retry
/// budget or a migration fails.
pub async fn setup_database(config: &DatabaseConfig) -> Result<PgPool, anyhow::Error> {
    let retry_deadline = Duration::from_secs(60); // overall retry budget
    let max_interval = Duration::from_secs(30); // cap single waits
    let mut delay = Duration::from_millis(500);
    let start = Instant::now();
    let database_url = config.connection_url();

    let pool = loop {
        info!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            "Attempting to connect to Postgres..."
        );

        match PgPoolOptions::new()
            .max_connections(config.max_connections)
            // Allow extra time to acquire a connection during startup bursts
            .acquire_timeout(Duration::from_secs(30))
            .connect(&database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(err) => {
                if start.elapsed() >= retry_deadline {
                    warn!(error = %err, "Postgres not ready; retries exhausted");
                    return Err(err.into());
                }

                warn!(error = %err, "Postgres not ready yet; retrying");
                sleep(delay).await;
                delay = (delay.saturating_mul(2)).min(max_interval);
            }
        }
    };

    let migrations_path = migrations_dir(config);
    let migrator = Migrator::new(migrations_path.as_path()).await?;
    migrator.run(&pool).await?;
    info!(path = %migrations_path.display(), "Migrations applied");
    Ok(pool)
}

/// Migrations directory: the configured override, else the crate's `migrations/`.
fn migrations_dir(config: &DatabaseConfig) -> PathBuf {
    config.migrations_dir.as_ref().map_or_else(
        || Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/migrations")).to_path_buf(),
        PathBuf::from,
    )
}
