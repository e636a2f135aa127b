//! Mocked upstream APIs for dispatcher and router tests.

use std::time::Duration;

use serde_json::Value;
use wiremock::{
    matchers::{header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use crate::{fixtures, TEST_OWNER, TEST_REPO};

/// Path of the deployment listing on the mock server.
pub const DEPLOYMENTS_PATH: &str = "/v6/deployments";

/// Mock server standing in for both the GitHub and the deployment API.
pub struct UpstreamMocks {
    server: MockServer,
}

impl UpstreamMocks {
    /// Starts a mock server on a random port.
    pub async fn start() -> Self {
        Self { server: MockServer::start().await }
    }

    /// Base URL to use as the GitHub API URL.
    pub fn github_api_url(&self) -> String {
        self.server.uri()
    }

    /// Full URL to use as the deployments API URL.
    pub fn deployments_url(&self) -> String {
        format!("{}{DEPLOYMENTS_PATH}", self.server.uri())
    }

    /// Serves repository counters for the test repository.
    pub async fn mock_repository(&self, stars: i64, forks: i64) {
        Mock::given(method("GET"))
            .and(path(format!("/repos/{TEST_OWNER}/{TEST_REPO}")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(fixtures::repository(stars, forks)),
            )
            .mount(&self.server)
            .await;
    }

    /// Serves repository counters only when the bearer token matches.
    pub async fn mock_repository_with_token(&self, token: &str, stars: i64, forks: i64) {
        Mock::given(method("GET"))
            .and(path(format!("/repos/{TEST_OWNER}/{TEST_REPO}")))
            .and(header("authorization", format!("Bearer {token}").as_str()))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(fixtures::repository(stars, forks)),
            )
            .mount(&self.server)
            .await;
    }

    /// Serves repository counters after `delay`.
    pub async fn mock_repository_delayed(&self, delay: Duration, stars: i64, forks: i64) {
        Mock::given(method("GET"))
            .and(path(format!("/repos/{TEST_OWNER}/{TEST_REPO}")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(fixtures::repository(stars, forks))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }

    /// Makes the repository endpoint answer with `status`.
    pub async fn mock_repository_failure(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(format!("/repos/{TEST_OWNER}/{TEST_REPO}")))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Serves `body` as the deployment listing.
    pub async fn mock_deployments(&self, body: Value) {
        Mock::given(method("GET"))
            .and(path(DEPLOYMENTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Serves `body` only for the given project, team and bearer token.
    pub async fn mock_deployments_for_project(
        &self,
        project_id: &str,
        team_id: &str,
        token: &str,
        body: Value,
    ) {
        Mock::given(method("GET"))
            .and(path(DEPLOYMENTS_PATH))
            .and(query_param("projectId", project_id))
            .and(query_param("teamId", team_id))
            .and(header("authorization", format!("Bearer {token}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Makes the deployment listing answer with `status`.
    pub async fn mock_deployments_failure(&self, status: u16) {
        Mock::given(method("GET"))
            .and(path(DEPLOYMENTS_PATH))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// Number of requests the mock server has received.
    pub async fn request_count(&self) -> usize {
        self.server.received_requests().await.map_or(0, |requests| requests.len())
    }
}
