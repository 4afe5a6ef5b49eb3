//! Edge credential factory.

use chrono::Utc;
use edgehub_api::edge::repo::{
    create_credential_with_executor, CredentialRepoError, EdgeCredentialRecord, NewEdgeCredential,
};
use eh_crypto::SecretSealer;
use uuid::Uuid;

use super::next_id;

/// Master key used to seal secrets in tests.
pub const TEST_MASTER_KEY: [u8; 32] = [0x5a; 32];

pub fn test_sealer() -> SecretSealer {
    SecretSealer::new(&TEST_MASTER_KEY).expect("test sealer")
}

/// How the credential's secret column is populated.
enum SecretState {
    Sealed(String),
    Missing,
    Raw(Vec<u8>),
}

/// Builder for edge credentials with sensible defaults.
///
/// Defaults: random tenant, unique `edge-test-N` key, secret `s3cr3t`, enabled.
pub struct CredentialFactory {
    tenant_id: Uuid,
    public_key: Option<String>,
    secret: SecretState,
    enabled: bool,
}

impl CredentialFactory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            tenant_id: Uuid::new_v4(),
            public_key: None,
            secret: SecretState::Sealed("s3cr3t".to_string()),
            enabled: true,
        }
    }

    #[must_use]
    pub fn with_tenant(mut self, tenant_id: Uuid) -> Self {
        self.tenant_id = tenant_id;
        self
    }

    #[must_use]
    pub fn with_public_key(mut self, public_key: &str) -> Self {
        self.public_key = Some(public_key.to_string());
        self
    }

    #[must_use]
    pub fn with_secret(mut self, secret: &str) -> Self {
        self.secret = SecretState::Sealed(secret.to_string());
        self
    }

    /// Leave the secret column NULL.
    #[must_use]
    pub fn without_secret(mut self) -> Self {
        self.secret = SecretState::Missing;
        self
    }

    /// Store these bytes verbatim instead of a sealed secret.
    #[must_use]
    pub fn with_raw_sealed_secret(mut self, bytes: &[u8]) -> Self {
        self.secret = SecretState::Raw(bytes.to_vec());
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    fn into_new(self, sealer: &SecretSealer) -> (NewEdgeCredential, bool) {
        let public_key = self
            .public_key
            .unwrap_or_else(|| format!("edge-test-{}", next_id()));
        let sealed_secret = match self.secret {
            SecretState::Sealed(secret) => Some(sealer.seal(secret.as_bytes()).expect("seal")),
            SecretState::Missing => None,
            SecretState::Raw(bytes) => Some(bytes),
        };
        let new = NewEdgeCredential {
            tenant_id: self.tenant_id,
            public_key,
            name: "test device".to_string(),
            sealed_secret,
        };
        (new, self.enabled)
    }

    /// Build an in-memory record for the mock repository.
    #[must_use]
    pub fn build(self, sealer: &SecretSealer) -> EdgeCredentialRecord {
        let (new, enabled) = self.into_new(sealer);
        EdgeCredentialRecord {
            id: Uuid::new_v4(),
            tenant_id: new.tenant_id,
            public_key: new.public_key,
            name: new.name,
            sealed_secret: new.sealed_secret,
            enabled,
            last_seen_at: None,
            created_at: Utc::now(),
        }
    }

    /// Insert the credential into the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails (e.g., duplicate public key).
    pub async fn create<'e, E>(
        self,
        executor: E,
        sealer: &SecretSealer,
    ) -> Result<EdgeCredentialRecord, CredentialRepoError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres> + Copy,
    {
        let (new, enabled) = self.into_new(sealer);
        let mut record = create_credential_with_executor(executor, &new).await?;
        if !enabled {
            edgehub_api::edge::repo::set_credential_enabled(executor, &record.public_key, false)
                .await?;
            record.enabled = false;
        }
        Ok(record)
    }
}

impl Default for CredentialFactory {
    fn default() -> Self {
        Self::new()
    }
}
