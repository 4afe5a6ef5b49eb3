//! Nonce ledger maintenance.
//!
//! Rows older than the retention window are deleted periodically. A request
//! stamped up to `tolerance` seconds ahead of its reservation stays fresh
//! until `2 * tolerance` seconds after it, so configuration requires the
//! retention to be at least that long. The cutoff is truncated to whole
//! seconds to match the freshness check, which compares Unix seconds.

use std::sync::Arc;
use std::time::Duration;

use chrono::SubsecRound;
use tokio::task::JoinHandle;

use super::clock::Clock;
use super::repo::{EdgeRepo, NonceRepoError};

/// Delete ledger rows reserved before `now - retention`, with `now`
/// truncated to whole seconds.
///
/// # Errors
///
/// Returns the storage error if the delete fails.
pub async fn purge_expired_nonces(
    repo: &dyn EdgeRepo,
    clock: &dyn Clock,
    retention: chrono::Duration,
) -> Result<u64, NonceRepoError> {
    let cutoff = clock.now().trunc_subsecs(0) - retention;
    let deleted = repo.purge_nonces_reserved_before(cutoff).await?;
    if deleted > 0 {
        tracing::info!(deleted, cutoff = %cutoff, "Purged expired edge nonces");
    } else {
        tracing::debug!(cutoff = %cutoff, "No expired edge nonces to purge");
    }
    Ok(deleted)
}

/// Run [`purge_expired_nonces`] every `interval` until the task is aborted.
///
/// Failures are logged and the loop keeps going.
pub fn spawn_nonce_purge(
    repo: Arc<dyn EdgeRepo>,
    clock: Arc<dyn Clock>,
    retention: chrono::Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            timer.tick().await;
            if let Err(e) = purge_expired_nonces(repo.as_ref(), clock.as_ref(), retention).await {
                tracing::error!(error = %e, "Edge nonce purge failed");
            }
        }
    })
}
