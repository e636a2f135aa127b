//! Test infrastructure for repo-pulse.
//!
//! Provides an in-memory [`WebhookStore`], wiremock-backed stand-ins for the
//! GitHub and deployment APIs, and payload fixtures. Nothing here touches a
//! real database, so dispatcher and router tests run without PostgreSQL.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::sync::Arc;

use pulse_core::WebhookStore;

pub mod fixtures;
pub mod http;
pub mod store;

pub use http::UpstreamMocks;
pub use store::MemoryStore;

/// Owner of the repository the mocks serve.
pub const TEST_OWNER: &str = "acme";

/// Name of the repository the mocks serve.
pub const TEST_REPO: &str = "tree-viewer";

/// Test environment wiring an in-memory store to mocked upstream APIs.
pub struct TestEnv {
    /// Store that records every write.
    pub store: Arc<MemoryStore>,
    /// Mock server answering GitHub and deployment API calls.
    pub upstream: UpstreamMocks,
}

impl TestEnv {
    /// Creates an environment with an empty store and a fresh mock server.
    pub async fn new() -> Self {
        Self { store: Arc::new(MemoryStore::new()), upstream: UpstreamMocks::start().await }
    }

    /// Returns the store as the trait object handed to the dispatcher.
    pub fn store_handle(&self) -> Arc<dyn WebhookStore> {
        self.store.clone()
    }

    /// Repository slug matching the mocked GitHub endpoint.
    pub fn repository_slug(&self) -> String {
        format!("{TEST_OWNER}/{TEST_REPO}")
    }
}
