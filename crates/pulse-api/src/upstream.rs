//! Clients for the GitHub repository API and the deployment listing API.
//!
//! Both clients share one `reqwest::Client`, so they share its connection
//! pool and timeout. A call is made once: failures surface as errors and are
//! never retried.

use std::time::Duration;

use pulse_core::{events::DeploymentList, PulseError, StatType, StatsRecord};
use reqwest::{header::ACCEPT, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};
use tracing::{debug, instrument, warn};

const GITHUB_SERVICE: &str = "github";
const DEPLOYMENTS_SERVICE: &str = "deployments";
const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// Configuration shared by the outbound clients.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Timeout for each outbound request.
    pub timeout: Duration,
    /// User agent sent with every request. GitHub rejects requests without one.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: format!("repo-pulse/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Builds the HTTP client used by both upstream clients.
    ///
    /// # Errors
    ///
    /// Returns `PulseError::Http` if the TLS backend cannot be initialized.
    pub fn build_client(&self) -> Result<reqwest::Client, PulseError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()?;
        Ok(client)
    }
}

/// Counters read from `GET /repos/{owner}/{repo}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RepositoryStats {
    /// Number of stargazers.
    pub stargazers_count: i64,
    /// Number of forks.
    pub forks_count: i64,
}

impl RepositoryStats {
    /// Stats rows to upsert, stars first.
    pub fn to_records(self) -> Vec<StatsRecord> {
        vec![
            StatsRecord::new(StatType::Stars, self.stargazers_count),
            StatsRecord::new(StatType::Forks, self.forks_count),
        ]
    }
}

/// Client for the GitHub repository API.
#[derive(Debug, Clone)]
pub struct GithubClient {
    client: reqwest::Client,
    repository_url: String,
    token: Option<String>,
}

impl GithubClient {
    /// Creates a client for `{api_url}/repos/{owner}/{repo}`.
    pub fn new(
        client: reqwest::Client,
        api_url: &str,
        owner: &str,
        repo: &str,
        token: Option<String>,
    ) -> Self {
        let repository_url = format!("{}/repos/{owner}/{repo}", api_url.trim_end_matches('/'));
        Self { client, repository_url, token }
    }

    /// Fetches the current star and fork counts.
    ///
    /// # Errors
    ///
    /// Returns `Http` on transport failure, `UpstreamStatus` on a non-2xx
    /// answer, and `UpstreamFormat` when the counters are missing.
    #[instrument(name = "github_repository", skip(self), fields(url = %self.repository_url))]
    pub async fn fetch_repository_stats(&self) -> Result<RepositoryStats, PulseError> {
        let request = self.client.get(&self.repository_url).header(ACCEPT, GITHUB_ACCEPT);
        let response = send(with_bearer(request, self.token.as_deref()), GITHUB_SERVICE).await?;
        let stats: RepositoryStats = read_json(response, GITHUB_SERVICE).await?;

        debug!(stars = stats.stargazers_count, forks = stats.forks_count, "Fetched repository stats");
        Ok(stats)
    }
}

/// Client for the deployment listing API.
#[derive(Debug, Clone)]
pub struct DeploymentsClient {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    project_id: Option<String>,
    team_id: Option<String>,
}

impl DeploymentsClient {
    /// Creates a client for the listing at `url`.
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into(), token: None, project_id: None, team_id: None }
    }

    /// Sends `Authorization: Bearer <token>` with every request.
    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Restricts the listing to one project.
    #[must_use]
    pub fn with_project(mut self, project_id: Option<String>) -> Self {
        self.project_id = project_id;
        self
    }

    /// Lists deployments of a team instead of the personal account.
    #[must_use]
    pub fn with_team(mut self, team_id: Option<String>) -> Self {
        self.team_id = team_id;
        self
    }

    /// Fetches the deployment listing, newest first.
    ///
    /// # Errors
    ///
    /// Returns `Http` on transport failure, `UpstreamStatus` on a non-2xx
    /// answer, and `UpstreamFormat` when the body has no `deployments` list.
    #[instrument(name = "deployments_list", skip(self), fields(url = %self.url))]
    pub async fn fetch_deployments(&self) -> Result<DeploymentList, PulseError> {
        let mut request = self.client.get(&self.url);
        if let Some(project_id) = &self.project_id {
            request = request.query(&[("projectId", project_id)]);
        }
        if let Some(team_id) = &self.team_id {
            request = request.query(&[("teamId", team_id)]);
        }

        let response =
            send(with_bearer(request, self.token.as_deref()), DEPLOYMENTS_SERVICE).await?;
        let list: DeploymentList = read_json(response, DEPLOYMENTS_SERVICE).await?;

        debug!(count = list.deployments.len(), "Fetched deployments");
        Ok(list)
    }
}

fn with_bearer(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

async fn send(request: RequestBuilder, service: &'static str) -> Result<Response, PulseError> {
    let response = request.send().await.map_err(|e| {
        warn!(service, timeout = e.is_timeout(), "Upstream request failed: {}", e);
        PulseError::Http(e)
    })?;

    let status = response.status();
    if !status.is_success() {
        warn!(service, status = status.as_u16(), "Upstream returned error status");
        return Err(PulseError::UpstreamStatus { service, status: status.as_u16() });
    }

    Ok(response)
}

async fn read_json<T: DeserializeOwned>(
    response: Response,
    service: &'static str,
) -> Result<T, PulseError> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| PulseError::upstream_format(service, e.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{header, method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    fn http_client() -> reqwest::Client {
        ClientConfig { timeout: Duration::from_secs(2), ..ClientConfig::default() }
            .build_client()
            .unwrap()
    }

    #[tokio::test]
    async fn github_client_sends_expected_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/tree-viewer"))
            .and(header("accept", GITHUB_ACCEPT))
            .and(header("authorization", "Bearer ghp_test"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "stargazers_count": 12, "forks_count": 3 })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = GithubClient::new(
            http_client(),
            &server.uri(),
            "acme",
            "tree-viewer",
            Some("ghp_test".to_string()),
        );

        let stats = client.fetch_repository_stats().await.unwrap();
        assert_eq!(stats, RepositoryStats { stargazers_count: 12, forks_count: 3 });
        assert_eq!(stats.to_records()[0], StatsRecord::new(StatType::Stars, 12));
    }

    #[tokio::test]
    async fn github_client_reports_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let client = GithubClient::new(http_client(), &server.uri(), "acme", "tree-viewer", None);

        let err = client.fetch_repository_stats().await.unwrap_err();
        assert!(matches!(err, PulseError::UpstreamStatus { service: "github", status: 403 }));
    }

    #[tokio::test]
    async fn github_client_rejects_body_without_counters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1 })))
            .mount(&server)
            .await;

        let client = GithubClient::new(http_client(), &server.uri(), "acme", "tree-viewer", None);

        let err = client.fetch_repository_stats().await.unwrap_err();
        assert_eq!(err.code(), "P2002");
    }

    #[tokio::test]
    async fn deployments_client_passes_project_and_team() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v6/deployments"))
            .and(query_param("projectId", "prj_1"))
            .and(query_param("teamId", "team_1"))
            .and(header("authorization", "Bearer vc_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "deployments": [{ "uid": "dpl_1", "state": "READY", "created": 0 }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = DeploymentsClient::new(http_client(), format!("{}/v6/deployments", server.uri()))
            .with_token(Some("vc_token".to_string()))
            .with_project(Some("prj_1".to_string()))
            .with_team(Some("team_1".to_string()));

        let list = client.fetch_deployments().await.unwrap();
        assert_eq!(list.deployments.len(), 1);
        assert_eq!(list.deployments[0].uid.as_deref(), Some("dpl_1"));
    }

    #[tokio::test]
    async fn deployments_client_requires_deployments_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": "nope" })))
            .mount(&server)
            .await;

        let client = DeploymentsClient::new(http_client(), server.uri());

        let err = client.fetch_deployments().await.unwrap_err();
        assert!(matches!(err, PulseError::UpstreamFormat { service: "deployments", .. }));
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "deployments": [] }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = ClientConfig { timeout: Duration::from_millis(50), ..ClientConfig::default() }
            .build_client()
            .unwrap();
        let client = DeploymentsClient::new(client, server.uri());

        let err = client.fetch_deployments().await.unwrap_err();
        assert_eq!(err.code(), "P2003");
    }
}
