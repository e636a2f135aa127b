//! Configuration management for the repo-pulse service.

use std::{fmt, net::SocketAddr, str::FromStr, time::Duration};

use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::upstream::ClientConfig;

const CONFIG_FILE: &str = "config.toml";

/// Complete service configuration with defaults, file, and environment
/// overrides.
///
/// Configuration is loaded in priority order:
/// 1. Environment variables (highest priority)
/// 2. Configuration file (`config.toml`)
/// 3. Built-in defaults (lowest priority)
///
/// Tokens and the webhook secret never appear in `Debug` output.
///
/// # Example
///
/// ```no_run
/// use pulse_api::Config;
///
/// let config = Config::load().expect("Failed to load configuration");
///
/// println!("Server will bind to {}:{}", config.host, config.port);
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    // Database
    /// PostgreSQL connection URL.
    ///
    /// Environment variable: `DATABASE_URL`
    #[serde(default = "default_database_url", alias = "DATABASE_URL")]
    pub database_url: String,
    /// Maximum number of database connections in the pool.
    ///
    /// Environment variable: `DATABASE_MAX_CONNECTIONS`
    #[serde(default = "default_max_connections", alias = "DATABASE_MAX_CONNECTIONS")]
    pub database_max_connections: u32,
    /// Minimum number of connections to maintain in the pool.
    ///
    /// Environment variable: `DATABASE_MIN_CONNECTIONS`
    #[serde(default = "default_min_connections", alias = "DATABASE_MIN_CONNECTIONS")]
    pub database_min_connections: u32,
    /// Database connection acquire timeout in seconds.
    ///
    /// Environment variable: `DATABASE_CONNECTION_TIMEOUT`
    #[serde(default = "default_acquire_timeout", alias = "DATABASE_CONNECTION_TIMEOUT")]
    pub database_connection_timeout: u64,
    /// Database connection idle timeout in seconds.
    ///
    /// Environment variable: `DATABASE_IDLE_TIMEOUT`
    #[serde(default = "default_idle_timeout", alias = "DATABASE_IDLE_TIMEOUT")]
    pub database_idle_timeout: u64,
    /// Maximum lifetime of database connections in seconds.
    ///
    /// Environment variable: `DATABASE_MAX_LIFETIME`
    #[serde(default = "default_max_lifetime", alias = "DATABASE_MAX_LIFETIME")]
    pub database_max_lifetime: u64,

    // Server
    /// Server bind address.
    ///
    /// Environment variable: `HOST`
    #[serde(default = "default_host", alias = "HOST")]
    pub host: String,
    /// Server bind port.
    ///
    /// Environment variable: `PORT`
    #[serde(default = "default_port", alias = "PORT")]
    pub port: u16,
    /// HTTP request timeout in seconds.
    ///
    /// Environment variable: `REQUEST_TIMEOUT`
    #[serde(default = "default_request_timeout", alias = "REQUEST_TIMEOUT")]
    pub request_timeout: u64,
    /// Largest accepted webhook body in bytes.
    ///
    /// Environment variable: `MAX_PAYLOAD_BYTES`
    #[serde(default = "default_max_payload_bytes", alias = "MAX_PAYLOAD_BYTES")]
    pub max_payload_bytes: usize,

    // GitHub
    /// Base URL of the GitHub REST API.
    ///
    /// Environment variable: `GITHUB_API_URL`
    #[serde(default = "default_github_api_url", alias = "GITHUB_API_URL")]
    pub github_api_url: String,
    /// Repository whose counters are tracked, as `owner/name`.
    ///
    /// Environment variable: `GITHUB_REPOSITORY`
    #[serde(default = "default_github_repository", alias = "GITHUB_REPOSITORY")]
    pub github_repository: String,
    /// Token sent to the GitHub API.
    ///
    /// Environment variable: `GITHUB_TOKEN`
    #[serde(default, alias = "GITHUB_TOKEN")]
    pub github_token: Option<String>,
    /// Secret shared with the GitHub webhook. Signature checks are skipped
    /// when unset.
    ///
    /// Environment variable: `GITHUB_WEBHOOK_SECRET`
    #[serde(default, alias = "GITHUB_WEBHOOK_SECRET")]
    pub github_webhook_secret: Option<String>,

    // Deployments
    /// URL of the deployment listing endpoint.
    ///
    /// Environment variable: `DEPLOYMENTS_API_URL`
    #[serde(default = "default_deployments_api_url", alias = "DEPLOYMENTS_API_URL")]
    pub deployments_api_url: String,
    /// Bearer token for the deployment listing.
    ///
    /// Environment variable: `DEPLOYMENTS_TOKEN`
    #[serde(default, alias = "DEPLOYMENTS_TOKEN")]
    pub deployments_token: Option<String>,
    /// Project whose deployments are listed.
    ///
    /// Environment variable: `DEPLOYMENTS_PROJECT_ID`
    #[serde(default, alias = "DEPLOYMENTS_PROJECT_ID")]
    pub deployments_project_id: Option<String>,
    /// Team owning the project.
    ///
    /// Environment variable: `DEPLOYMENTS_TEAM_ID`
    #[serde(default, alias = "DEPLOYMENTS_TEAM_ID")]
    pub deployments_team_id: Option<String>,

    // Client
    /// Timeout for each outbound API call in seconds.
    ///
    /// Environment variable: `UPSTREAM_TIMEOUT_SECONDS`
    #[serde(default = "default_upstream_timeout", alias = "UPSTREAM_TIMEOUT_SECONDS")]
    pub upstream_timeout_seconds: u64,

    // Logging
    /// Log level configuration.
    ///
    /// Environment variable: `RUST_LOG`
    #[serde(default = "default_log_level", alias = "RUST_LOG")]
    pub rust_log: String,
    /// Log output format, `pretty` or `json`.
    ///
    /// Environment variable: `LOG_FORMAT`
    #[serde(default = "default_log_format", alias = "LOG_FORMAT")]
    pub log_format: LogFormat,
}

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines with file and line numbers.
    Pretty,
    /// One JSON object per event.
    Json,
}

impl Config {
    /// Load configuration from defaults, config file, and environment variable
    /// overrides.
    pub fn load() -> Result<Self> {
        let figment = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(CONFIG_FILE))
            .merge(Env::prefixed(""));

        let config: Self = figment.extract().context("Failed to load configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Convert to the outbound client configuration.
    pub fn to_client_config(&self) -> ClientConfig {
        ClientConfig {
            timeout: Duration::from_secs(self.upstream_timeout_seconds),
            user_agent: format!("repo-pulse/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Server-side request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Splits `github_repository` into owner and name.
    pub fn repository_parts(&self) -> Result<(&str, &str)> {
        parse_repository(&self.github_repository)
    }

    /// Parse server socket address from host and port configuration.
    pub fn parse_server_addr(&self) -> Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.host, self.port);
        SocketAddr::from_str(&addr_str).context("Invalid server address")
    }

    /// Get database URL with password masked for logging.
    pub fn database_url_masked(&self) -> String {
        if let Some(at_pos) = self.database_url.find('@') {
            if let Some(colon_pos) = self.database_url[..at_pos].rfind(':') {
                let mut masked = self.database_url.clone();
                masked.replace_range(colon_pos + 1..at_pos, "***");
                return masked;
            }
        }
        self.database_url.clone()
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port must be greater than 0");
        }

        if self.database_max_connections == 0 {
            anyhow::bail!("database max_connections must be greater than 0");
        }

        if self.database_min_connections > self.database_max_connections {
            anyhow::bail!("database min_connections cannot exceed max_connections");
        }

        if self.max_payload_bytes == 0 {
            anyhow::bail!("max_payload_bytes must be greater than 0");
        }

        if self.upstream_timeout_seconds == 0 {
            anyhow::bail!("upstream_timeout_seconds must be greater than 0");
        }

        if self.request_timeout == 0 {
            anyhow::bail!("request_timeout must be greater than 0");
        }

        // A status event makes one upstream call, which must fit in the request.
        if self.request_timeout < self.upstream_timeout_seconds {
            anyhow::bail!(
                "request_timeout ({}s) cannot be shorter than upstream_timeout_seconds ({}s)",
                self.request_timeout,
                self.upstream_timeout_seconds
            );
        }

        parse_repository(&self.github_repository)?;

        for (name, url) in
            [("github_api_url", &self.github_api_url), ("deployments_api_url", &self.deployments_api_url)]
        {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                anyhow::bail!("{name} must be an http(s) URL, got: {url}");
            }
        }

        Ok(())
    }
}

fn parse_repository(slug: &str) -> Result<(&str, &str)> {
    match slug.split_once('/') {
        Some((owner, name))
            if !owner.is_empty() && !name.is_empty() && !name.contains('/') =>
        {
            Ok((owner, name))
        },
        _ => anyhow::bail!("github_repository must look like owner/name, got: {slug:?}"),
    }
}

fn redact(value: Option<&String>) -> Option<&'static str> {
    value.map(|_| "***")
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &self.database_url_masked())
            .field("database_max_connections", &self.database_max_connections)
            .field("database_min_connections", &self.database_min_connections)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("request_timeout", &self.request_timeout)
            .field("max_payload_bytes", &self.max_payload_bytes)
            .field("github_api_url", &self.github_api_url)
            .field("github_repository", &self.github_repository)
            .field("github_token", &redact(self.github_token.as_ref()))
            .field("github_webhook_secret", &redact(self.github_webhook_secret.as_ref()))
            .field("deployments_api_url", &self.deployments_api_url)
            .field("deployments_token", &redact(self.deployments_token.as_ref()))
            .field("deployments_project_id", &self.deployments_project_id)
            .field("deployments_team_id", &self.deployments_team_id)
            .field("upstream_timeout_seconds", &self.upstream_timeout_seconds)
            .field("rust_log", &self.rust_log)
            .field("log_format", &self.log_format)
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            database_max_connections: default_max_connections(),
            database_min_connections: default_min_connections(),
            database_connection_timeout: default_acquire_timeout(),
            database_idle_timeout: default_idle_timeout(),
            database_max_lifetime: default_max_lifetime(),
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            max_payload_bytes: default_max_payload_bytes(),
            github_api_url: default_github_api_url(),
            github_repository: default_github_repository(),
            github_token: None,
            github_webhook_secret: None,
            deployments_api_url: default_deployments_api_url(),
            deployments_token: None,
            deployments_project_id: None,
            deployments_team_id: None,
            upstream_timeout_seconds: default_upstream_timeout(),
            rust_log: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_database_url() -> String {
    "postgresql://localhost/repo_pulse".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_acquire_timeout() -> u64 {
    10
}

fn default_idle_timeout() -> u64 {
    600
}

fn default_max_lifetime() -> u64 {
    1800
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    60
}

fn default_max_payload_bytes() -> usize {
    // GitHub caps webhook payloads at 25 MB.
    25 * 1024 * 1024
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_github_repository() -> String {
    "AlgoFoe/tree-visualizer".to_string()
}

fn default_deployments_api_url() -> String {
    "https://api.vercel.com/v6/deployments".to_string()
}

fn default_upstream_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info,repo_pulse=debug,pulse_api=debug,tower_http=debug".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}
