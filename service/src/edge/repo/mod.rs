//! Repository layer for edge credentials and the nonce ledger

pub mod credentials;
pub mod nonces;
pub mod store;

pub use credentials::{
    create_credential_with_executor, get_credential_by_public_key, set_credential_enabled,
    touch_credential, CredentialRepoError, EdgeCredentialRecord, NewEdgeCredential,
};
pub use nonces::{
    get_nonce, purge_nonces_reserved_before, reserve_nonce, NonceRecord, NonceRepoError,
    NonceReservation,
};
pub use store::{EdgeRepo, PgEdgeRepo};

#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    pub use super::store::mock::MockEdgeRepo;
}
