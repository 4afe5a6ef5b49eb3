//! Test app builder that mirrors main.rs wiring with injectable deps/mocks.
//!
//! ```ignore
//! let app = TestAppBuilder::new()
//!     .with_credential(CredentialFactory::new().with_public_key("edge-42"))
//!     .build();
//! let response = app.router.clone().oneshot(request).await?;
//! ```

use std::sync::Arc;

use axum::Router;
use edgehub_api::{
    config::EdgeAuthConfig,
    edge::{repo::mock::MockEdgeRepo, EdgeAuthState, FixedClock},
    http::build_router,
};
use eh_crypto::{encode_base64url, SecretSealer};

use super::factories::{test_sealer, CredentialFactory, DEFAULT_TIMESTAMP, TEST_MASTER_KEY};

/// A router plus handles on its mock dependencies.
pub struct TestApp {
    pub router: Router,
    pub repo: Arc<MockEdgeRepo>,
    pub clock: Arc<FixedClock>,
    pub sealer: Arc<SecretSealer>,
}

/// Builder for test applications that mirrors main.rs wiring.
pub struct TestAppBuilder {
    config: EdgeAuthConfig,
    repo: Arc<MockEdgeRepo>,
    clock: Arc<FixedClock>,
    credentials: Vec<CredentialFactory>,
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAppBuilder {
    /// Empty credential store, clock pinned to the default request timestamp.
    #[must_use]
    pub fn new() -> Self {
        let config = EdgeAuthConfig {
            secret_key: encode_base64url(&TEST_MASTER_KEY),
            ..EdgeAuthConfig::default()
        };
        Self {
            config,
            repo: Arc::new(MockEdgeRepo::new()),
            clock: Arc::new(FixedClock::at_unix(DEFAULT_TIMESTAMP)),
            credentials: Vec::new(),
        }
    }

    /// App with the `edge-42` / `s3cr3t` credential registered.
    #[must_use]
    pub fn with_default_credential() -> Self {
        Self::new().with_credential(CredentialFactory::new().with_public_key("edge-42"))
    }

    #[must_use]
    pub fn with_credential(mut self, credential: CredentialFactory) -> Self {
        self.credentials.push(credential);
        self
    }

    #[must_use]
    pub fn with_max_body_bytes(mut self, limit: usize) -> Self {
        self.config.max_body_bytes = limit;
        self
    }

    #[must_use]
    pub fn with_trusted_proxies(mut self, proxies: &[&str]) -> Self {
        self.config.trusted_proxies = proxies.iter().map(ToString::to_string).collect();
        self
    }

    #[must_use]
    pub fn with_repo(mut self, repo: Arc<MockEdgeRepo>) -> Self {
        self.repo = repo;
        self
    }

    pub fn build(self) -> TestApp {
        self.config.validate().expect("valid edge auth config");

        let sealer = Arc::new(test_sealer());
        for credential in self.credentials {
            self.repo.insert_credential(credential.build(&sealer));
        }

        let state = EdgeAuthState::new(
            self.repo.clone(),
            sealer.clone(),
            self.clock.clone(),
            &self.config,
        );

        TestApp {
            router: build_router(state),
            repo: self.repo,
            clock: self.clock,
            sealer,
        }
    }
}
