//! Consolidated edge repository trait
//!
//! [`EdgeRepo`] is the storage seam for edge authentication: the credential
//! store plus the nonce ledger. [`PgEdgeRepo`] backs it with Postgres.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::credentials::{
    create_credential_with_executor, get_credential_by_public_key, set_credential_enabled,
    touch_credential, CredentialRepoError, EdgeCredentialRecord, NewEdgeCredential,
};
use super::nonces::{
    purge_nonces_reserved_before, reserve_nonce, NonceRecord, NonceRepoError, NonceReservation,
};

/// Repository trait for edge credentials and the nonce ledger.
#[async_trait]
pub trait EdgeRepo: Send + Sync {
    // Credential operations

    async fn create_credential(
        &self,
        new: &NewEdgeCredential,
    ) -> Result<EdgeCredentialRecord, CredentialRepoError>;

    async fn get_credential_by_public_key(
        &self,
        public_key: &str,
    ) -> Result<EdgeCredentialRecord, CredentialRepoError>;

    async fn set_credential_enabled(
        &self,
        public_key: &str,
        enabled: bool,
    ) -> Result<(), CredentialRepoError>;

    async fn touch_credential(
        &self,
        id: Uuid,
        seen_at: DateTime<Utc>,
    ) -> Result<(), CredentialRepoError>;

    // Nonce ledger (replay prevention)

    /// Atomically reserve a nonce. Returns `NonceRepoError::Replay` if already seen.
    async fn reserve_nonce(&self, reservation: &NonceReservation<'_>) -> Result<(), NonceRepoError>;

    /// Delete nonces reserved before `cutoff`. Returns count of deleted rows.
    async fn purge_nonces_reserved_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, NonceRepoError>;
}

/// `PostgreSQL` implementation of [`EdgeRepo`].
pub struct PgEdgeRepo {
    pool: PgPool,
}

impl PgEdgeRepo {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EdgeRepo for PgEdgeRepo {
    async fn create_credential(
        &self,
        new: &NewEdgeCredential,
    ) -> Result<EdgeCredentialRecord, CredentialRepoError> {
        create_credential_with_executor(&self.pool, new).await
    }

    async fn get_credential_by_public_key(
        &self,
        public_key: &str,
    ) -> Result<EdgeCredentialRecord, CredentialRepoError> {
        get_credential_by_public_key(&self.pool, public_key).await
    }

    async fn set_credential_enabled(
        &self,
        public_key: &str,
        enabled: bool,
    ) -> Result<(), CredentialRepoError> {
        set_credential_enabled(&self.pool, public_key, enabled).await
    }

    async fn touch_credential(
        &self,
        id: Uuid,
        seen_at: DateTime<Utc>,
    ) -> Result<(), CredentialRepoError> {
        touch_credential(&self.pool, id, seen_at).await
    }

    async fn reserve_nonce(&self, reservation: &NonceReservation<'_>) -> Result<(), NonceRepoError> {
        reserve_nonce(&self.pool, reservation).await
    }

    async fn purge_nonces_reserved_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, NonceRepoError> {
        purge_nonces_reserved_before(&self.pool, cutoff).await
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    //! In-memory edge repo for unit and HTTP tests.
    //!
    //! Nonce reservation is an insert-if-absent under one lock acquisition,
    //! matching the uniqueness guarantee of the Postgres table. Storage
    //! failures can be injected per operation.

    use super::{
        async_trait, CredentialRepoError, DateTime, EdgeCredentialRecord, EdgeRepo,
        NewEdgeCredential, NonceRecord, NonceRepoError, NonceReservation, Utc, Uuid,
    };
    use std::collections::hash_map::Entry;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Mutex, MutexGuard, PoisonError};

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mock edge repo backed by hash maps.
    #[derive(Default)]
    pub struct MockEdgeRepo {
        credentials: Mutex<HashMap<String, EdgeCredentialRecord>>,
        nonces: Mutex<HashMap<String, NonceRecord>>,
        fail_credential_lookup: AtomicBool,
        fail_nonce_reservation: AtomicBool,
    }

    impl MockEdgeRepo {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Store a credential as-is, replacing any with the same public key.
        pub fn insert_credential(&self, record: EdgeCredentialRecord) {
            lock(&self.credentials).insert(record.public_key.clone(), record);
        }

        #[must_use]
        pub fn credential(&self, public_key: &str) -> Option<EdgeCredentialRecord> {
            lock(&self.credentials).get(public_key).cloned()
        }

        #[must_use]
        pub fn nonce(&self, nonce: &str) -> Option<NonceRecord> {
            lock(&self.nonces).get(nonce).cloned()
        }

        #[must_use]
        pub fn nonce_count(&self) -> usize {
            lock(&self.nonces).len()
        }

        /// Make credential lookups fail with a database error.
        pub fn fail_credential_lookup(&self, fail: bool) {
            self.fail_credential_lookup.store(fail, Ordering::SeqCst);
        }

        /// Make nonce reservations fail with a database error.
        pub fn fail_nonce_reservation(&self, fail: bool) {
            self.fail_nonce_reservation.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl EdgeRepo for MockEdgeRepo {
        async fn create_credential(
            &self,
            new: &NewEdgeCredential,
        ) -> Result<EdgeCredentialRecord, CredentialRepoError> {
            let mut credentials = lock(&self.credentials);
            match credentials.entry(new.public_key.clone()) {
                Entry::Occupied(_) => Err(CredentialRepoError::DuplicateKey),
                Entry::Vacant(slot) => {
                    let record = EdgeCredentialRecord {
                        id: Uuid::new_v4(),
                        tenant_id: new.tenant_id,
                        public_key: new.public_key.clone(),
                        name: new.name.clone(),
                        sealed_secret: new.sealed_secret.clone(),
                        enabled: true,
                        last_seen_at: None,
                        created_at: Utc::now(),
                    };
                    slot.insert(record.clone());
                    Ok(record)
                }
            }
        }

        async fn get_credential_by_public_key(
            &self,
            public_key: &str,
        ) -> Result<EdgeCredentialRecord, CredentialRepoError> {
            if self.fail_credential_lookup.load(Ordering::SeqCst) {
                return Err(CredentialRepoError::Database(sqlx::Error::PoolTimedOut));
            }
            lock(&self.credentials)
                .get(public_key)
                .cloned()
                .ok_or(CredentialRepoError::NotFound)
        }

        async fn set_credential_enabled(
            &self,
            public_key: &str,
            enabled: bool,
        ) -> Result<(), CredentialRepoError> {
            let mut credentials = lock(&self.credentials);
            let record = credentials
                .get_mut(public_key)
                .ok_or(CredentialRepoError::NotFound)?;
            record.enabled = enabled;
            Ok(())
        }

        async fn touch_credential(
            &self,
            id: Uuid,
            seen_at: DateTime<Utc>,
        ) -> Result<(), CredentialRepoError> {
            let mut credentials = lock(&self.credentials);
            let record = credentials
                .values_mut()
                .find(|r| r.id == id)
                .ok_or(CredentialRepoError::NotFound)?;
            record.last_seen_at = Some(seen_at);
            Ok(())
        }

        async fn reserve_nonce(
            &self,
            reservation: &NonceReservation<'_>,
        ) -> Result<(), NonceRepoError> {
            if self.fail_nonce_reservation.load(Ordering::SeqCst) {
                return Err(NonceRepoError::Database(sqlx::Error::PoolTimedOut));
            }
            let mut nonces = lock(&self.nonces);
            match nonces.entry(reservation.nonce.to_string()) {
                Entry::Occupied(existing) => Err(NonceRepoError::Replay {
                    first_reserved_at: Some(existing.get().reserved_at),
                }),
                Entry::Vacant(slot) => {
                    slot.insert(NonceRecord {
                        nonce: reservation.nonce.to_string(),
                        public_key: reservation.public_key.to_string(),
                        origin_addr: reservation.origin_addr.map(str::to_string),
                        reserved_at: reservation.reserved_at,
                    });
                    Ok(())
                }
            }
        }

        async fn purge_nonces_reserved_before(
            &self,
            cutoff: DateTime<Utc>,
        ) -> Result<u64, NonceRepoError> {
            let mut nonces = lock(&self.nonces);
            let before = nonces.len();
            nonces.retain(|_, record| record.reserved_at >= cutoff);
            Ok((before - nonces.len()) as u64)
        }
    }
}
