//! Test data factories for edge credentials and signed requests.
//!
//! ```ignore
//! use common::factories::{CredentialFactory, SignedRequest, test_sealer};
//!
//! let credential = CredentialFactory::new().with_secret("s3cr3t").build(&test_sealer());
//! let request = SignedRequest::post("/api/v1/edge/events", "{}")
//!     .key(&credential.public_key)
//!     .secret("s3cr3t")
//!     .build();
//! ```

mod credential;
mod request;

pub use credential::{test_sealer, CredentialFactory, TEST_MASTER_KEY};
pub use request::{SignedRequest, DEFAULT_TIMESTAMP};

use std::sync::atomic::{AtomicU64, Ordering};

/// Global counter for generating unique test data.
static FACTORY_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Returns a unique ID for generating test data.
pub fn next_id() -> u64 {
    FACTORY_COUNTER.fetch_add(1, Ordering::SeqCst)
}
