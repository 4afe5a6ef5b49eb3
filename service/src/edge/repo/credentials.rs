//! Edge credential repository
//!
//! Maps the public `X-EDGE-KEY` identifier to the owning tenant, the device
//! record, and the sealed shared secret.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::Row;
use uuid::Uuid;

/// Record returned from credential queries
#[derive(Debug, Clone)]
pub struct EdgeCredentialRecord {
    /// Device identifier attached to authenticated requests.
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub public_key: String,
    pub name: String,
    /// Encrypted shared secret; `None` until an operator configures one.
    pub sealed_secret: Option<Vec<u8>>,
    pub enabled: bool,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl EdgeCredentialRecord {
    /// The sealed secret, if one is configured and non-empty.
    #[must_use]
    pub fn configured_secret(&self) -> Option<&[u8]> {
        self.sealed_secret.as_deref().filter(|s| !s.is_empty())
    }
}

/// Input for registering a new credential.
#[derive(Debug, Clone)]
pub struct NewEdgeCredential {
    pub tenant_id: Uuid,
    pub public_key: String,
    pub name: String,
    pub sealed_secret: Option<Vec<u8>>,
}

/// Error types for credential operations
#[derive(Debug, thiserror::Error)]
pub enum CredentialRepoError {
    #[error("edge credential not found")]
    NotFound,
    #[error("edge public key already registered")]
    DuplicateKey,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn map_credential_row(row: &PgRow) -> Result<EdgeCredentialRecord, sqlx::Error> {
    Ok(EdgeCredentialRecord {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        public_key: row.try_get("public_key")?,
        name: row.try_get("name")?,
        sealed_secret: row.try_get("sealed_secret")?,
        enabled: row.try_get("enabled")?,
        last_seen_at: row.try_get("last_seen_at")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Insert a credential.
///
/// # Errors
///
/// Returns `CredentialRepoError::DuplicateKey` if the public key is already registered.
pub async fn create_credential_with_executor<'e, E>(
    executor: E,
    new: &NewEdgeCredential,
) -> Result<EdgeCredentialRecord, CredentialRepoError>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let id = Uuid::new_v4();
    let now = Utc::now();

    let result = sqlx::query(
        r"
        INSERT INTO edge_credentials (id, tenant_id, public_key, name, sealed_secret, enabled, created_at)
        VALUES ($1, $2, $3, $4, $5, TRUE, $6)
        ",
    )
    .bind(id)
    .bind(new.tenant_id)
    .bind(&new.public_key)
    .bind(&new.name)
    .bind(new.sealed_secret.as_deref())
    .bind(now)
    .execute(executor)
    .await;

    match result {
        Ok(_) => Ok(EdgeCredentialRecord {
            id,
            tenant_id: new.tenant_id,
            public_key: new.public_key.clone(),
            name: new.name.clone(),
            sealed_secret: new.sealed_secret.clone(),
            enabled: true,
            last_seen_at: None,
            created_at: now,
        }),
        Err(e) => {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("uq_edge_credentials_public_key") {
                    return Err(CredentialRepoError::DuplicateKey);
                }
            }
            Err(CredentialRepoError::Database(e))
        }
    }
}

/// Get a credential by its public key.
///
/// # Errors
///
/// Returns `CredentialRepoError::NotFound` if no credential matches.
pub async fn get_credential_by_public_key<'e, E>(
    executor: E,
    public_key: &str,
) -> Result<EdgeCredentialRecord, CredentialRepoError>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let row = sqlx::query(
        r"
        SELECT id, tenant_id, public_key, name, sealed_secret, enabled,
               last_seen_at, created_at
        FROM edge_credentials
        WHERE public_key = $1
        ",
    )
    .bind(public_key)
    .fetch_optional(executor)
    .await?
    .ok_or(CredentialRepoError::NotFound)?;

    Ok(map_credential_row(&row)?)
}

/// Enable or disable a credential.
///
/// # Errors
///
/// Returns `CredentialRepoError::NotFound` if no credential matches.
pub async fn set_credential_enabled<'e, E>(
    executor: E,
    public_key: &str,
    enabled: bool,
) -> Result<(), CredentialRepoError>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let result = sqlx::query("UPDATE edge_credentials SET enabled = $2 WHERE public_key = $1")
        .bind(public_key)
        .bind(enabled)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CredentialRepoError::NotFound);
    }
    Ok(())
}

/// Record that a credential was just used.
///
/// # Errors
///
/// Returns `CredentialRepoError::NotFound` if no credential matches.
pub async fn touch_credential<'e, E>(
    executor: E,
    id: Uuid,
    seen_at: DateTime<Utc>,
) -> Result<(), CredentialRepoError>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let result = sqlx::query("UPDATE edge_credentials SET last_seen_at = $2 WHERE id = $1")
        .bind(id)
        .bind(seen_at)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CredentialRepoError::NotFound);
    }
    Ok(())
}
