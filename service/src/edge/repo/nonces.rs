//! Nonce ledger for replay prevention
//!
//! Stores every nonce presented by an edge device. Reservation relies on the
//! table's primary key: `INSERT ... ON CONFLICT DO NOTHING` affecting no rows
//! means the nonce was already used. No read-then-write, no application locks,
//! so it holds across any number of service instances.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

/// A nonce as stored in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonceRecord {
    pub nonce: String,
    pub public_key: String,
    pub origin_addr: Option<String>,
    pub reserved_at: DateTime<Utc>,
}

/// Input for a reservation attempt.
#[derive(Debug, Clone, Copy)]
pub struct NonceReservation<'a> {
    pub nonce: &'a str,
    pub public_key: &'a str,
    pub origin_addr: Option<&'a str>,
    pub reserved_at: DateTime<Utc>,
}

/// Errors from nonce operations.
#[derive(Debug, thiserror::Error)]
pub enum NonceRepoError {
    /// The nonce is already in the ledger. `first_reserved_at` is when it was
    /// first seen, if that lookup succeeded.
    #[error("request replay detected")]
    Replay {
        first_reserved_at: Option<DateTime<Utc>>,
    },
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

/// Atomically reserve a nonce. Returns `NonceRepoError::Replay` if already seen.
///
/// # Errors
///
/// - [`NonceRepoError::Replay`] if the nonce was already recorded
/// - [`NonceRepoError::Database`] on connection or query failure
pub async fn reserve_nonce(
    pool: &PgPool,
    reservation: &NonceReservation<'_>,
) -> Result<(), NonceRepoError> {
    let result = sqlx::query(
        r"
        INSERT INTO edge_nonces (nonce, public_key, origin_addr, reserved_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (nonce) DO NOTHING
        ",
    )
    .bind(reservation.nonce)
    .bind(reservation.public_key)
    .bind(reservation.origin_addr)
    .bind(reservation.reserved_at)
    .execute(pool)
    .await
    .map_err(NonceRepoError::Database)?;

    if result.rows_affected() == 0 {
        // Informational only; the replay verdict stands even if this fails.
        let first_reserved_at = get_nonce(pool, reservation.nonce)
            .await
            .ok()
            .flatten()
            .map(|record| record.reserved_at);
        return Err(NonceRepoError::Replay { first_reserved_at });
    }
    Ok(())
}

/// Look up a nonce in the ledger.
///
/// # Errors
///
/// Returns [`NonceRepoError::Database`] on connection or query failure.
pub async fn get_nonce(pool: &PgPool, nonce: &str) -> Result<Option<NonceRecord>, NonceRepoError> {
    let row = sqlx::query(
        "SELECT nonce, public_key, origin_addr, reserved_at FROM edge_nonces WHERE nonce = $1",
    )
    .bind(nonce)
    .fetch_optional(pool)
    .await
    .map_err(NonceRepoError::Database)?;

    row.map(|row| -> Result<NonceRecord, sqlx::Error> {
        Ok(NonceRecord {
            nonce: row.try_get("nonce")?,
            public_key: row.try_get("public_key")?,
            origin_addr: row.try_get("origin_addr")?,
            reserved_at: row.try_get("reserved_at")?,
        })
    })
    .transpose()
    .map_err(NonceRepoError::Database)
}

/// Delete nonces reserved before `cutoff`. Returns count of deleted rows.
///
/// # Errors
///
/// Returns [`NonceRepoError::Database`] on connection or query failure.
pub async fn purge_nonces_reserved_before(
    pool: &PgPool,
    cutoff: DateTime<Utc>,
) -> Result<u64, NonceRepoError> {
    let result = sqlx::query("DELETE FROM edge_nonces WHERE reserved_at < $1")
        .bind(cutoff)
        .execute(pool)
        .await
        .map_err(NonceRepoError::Database)?;

    Ok(result.rows_affected())
}
