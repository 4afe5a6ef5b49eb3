#![deny(
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::unwrap_used
)]
#![allow(clippy::print_stdout)]

//! Edge credential administration.
//!
//! Database commands read the same configuration as the server
//! (`config.yaml` plus `EH_` environment variables).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use edgehub_api::{
    config::Config,
    db::setup_database,
    edge::{purge_expired_nonces, repo::NewEdgeCredential, EdgeRepo, PgEdgeRepo, SystemClock},
};
use eh_crypto::{
    encode_base64url, random_bytes, random_hex, sign, signing_string, SecretSealer,
    MASTER_KEY_LEN,
};
use uuid::Uuid;

/// Bytes of randomness in a generated public key.
const PUBLIC_KEY_BYTES: usize = 8;
/// Bytes of randomness in a generated shared secret.
const SECRET_BYTES: usize = 32;

#[derive(Debug, Parser)]
#[command(name = "edge-ops", version, about = "Administer edge device credentials")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a credential and print its key and secret (shown once).
    Register {
        #[arg(long)]
        tenant: Uuid,
        #[arg(long)]
        name: String,
    },
    /// Reject all further requests from a credential.
    Disable {
        #[arg(long)]
        key: String,
    },
    /// Re-enable a disabled credential.
    Enable {
        #[arg(long)]
        key: String,
    },
    /// Delete nonce ledger rows older than the configured retention.
    PurgeNonces,
    /// Sign a request offline and print the headers an edge device would send.
    Sign {
        #[arg(long)]
        secret: String,
        #[arg(long, default_value = "POST")]
        method: String,
        #[arg(long)]
        path: String,
        /// Request body; empty when omitted.
        #[arg(long)]
        body_file: Option<PathBuf>,
        /// Unix seconds; defaults to now.
        #[arg(long)]
        timestamp: Option<i64>,
    },
    /// Generate a master key for `edge_auth.secret_key`.
    GenerateKey,
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Sign {
            secret,
            method,
            path,
            body_file,
            timestamp,
        } => sign_request(&secret, &method, &path, body_file, timestamp),
        Command::GenerateKey => {
            println!("{}", encode_base64url(&random_bytes(MASTER_KEY_LEN)));
            Ok(())
        }
        Command::Register { tenant, name } => {
            let config = load_config()?;
            let sealer = SecretSealer::from_base64url(&config.edge_auth.secret_key)?;
            let repo = connect(&config).await?;
            register(repo.as_ref(), &sealer, tenant, name).await
        }
        Command::Disable { key } => set_enabled(&key, false).await,
        Command::Enable { key } => set_enabled(&key, true).await,
        Command::PurgeNonces => {
            let config = load_config()?;
            let repo = connect(&config).await?;
            let retention = chrono::Duration::seconds(config.edge_auth.nonce_retention_secs);
            let deleted = purge_expired_nonces(repo.as_ref(), &SystemClock, retention).await?;
            println!("Purged {deleted} nonce(s)");
            Ok(())
        }
    }
}

fn load_config() -> Result<Config, anyhow::Error> {
    Config::load().map_err(|e| anyhow::anyhow!("{e}"))
}

async fn connect(config: &Config) -> Result<Arc<dyn EdgeRepo>, anyhow::Error> {
    let pool = setup_database(&config.database).await?;
    Ok(Arc::new(PgEdgeRepo::new(pool)))
}

async fn register(
    repo: &dyn EdgeRepo,
    sealer: &SecretSealer,
    tenant_id: Uuid,
    name: String,
) -> Result<(), anyhow::Error> {
    let public_key = format!("edge-{}", random_hex(PUBLIC_KEY_BYTES));
    let secret = random_hex(SECRET_BYTES);
    let sealed_secret = sealer.seal(secret.as_bytes())?;

    let record = repo
        .create_credential(&NewEdgeCredential {
            tenant_id,
            public_key,
            name,
            sealed_secret: Some(sealed_secret),
        })
        .await
        .context("failed to create edge credential")?;

    println!("device_id:  {}", record.id);
    println!("tenant_id:  {}", record.tenant_id);
    println!("public_key: {}", record.public_key);
    println!("secret:     {secret}");
    println!();
    println!("Store the secret on the device now; it cannot be shown again.");
    Ok(())
}

async fn set_enabled(key: &str, enabled: bool) -> Result<(), anyhow::Error> {
    let config = load_config()?;
    let repo = connect(&config).await?;
    repo.set_credential_enabled(key, enabled)
        .await
        .with_context(|| format!("failed to update edge credential '{key}'"))?;
    println!("{key} {}", if enabled { "enabled" } else { "disabled" });
    Ok(())
}

fn sign_request(
    secret: &str,
    method: &str,
    path: &str,
    body_file: Option<PathBuf>,
    timestamp: Option<i64>,
) -> Result<(), anyhow::Error> {
    let body = match body_file {
        Some(file) => std::fs::read(&file)
            .with_context(|| format!("failed to read body file {}", file.display()))?,
        None => Vec::new(),
    };
    let timestamp = timestamp
        .unwrap_or_else(|| chrono::Utc::now().timestamp())
        .to_string();

    let canonical = signing_string(method, path, &timestamp, &body);
    let signature = sign(secret.as_bytes(), &canonical)?;

    println!("signing string:   {canonical}");
    println!("X-EDGE-TIMESTAMP: {timestamp}");
    println!("X-EDGE-NONCE:     {}", random_hex(16));
    println!("X-EDGE-SIGNATURE: {signature}");
    Ok(())
}
