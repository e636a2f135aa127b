//! HTTP server configuration and request routing.
//!
//! Requests flow through middleware in order:
//! 1. Request ID generation
//! 2. Request/response logging
//! 3. Timeout enforcement
//! 4. Body size limit
//! 5. Handler execution
//!
//! # Graceful Shutdown
//!
//! On SIGINT or SIGTERM the server stops accepting connections and waits for
//! in-flight requests before returning.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    extract::{DefaultBodyLimit, Request},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use pulse_core::WebhookStore;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dispatch::Dispatcher,
    handlers,
    upstream::{DeploymentsClient, GithubClient},
    Config,
};

/// Path GitHub deliveries are posted to.
pub const WEBHOOK_PATH: &str = "/api/github-webhook";

/// Misspelled path registered on existing hooks, kept as an alias.
pub const LEGACY_WEBHOOK_PATH: &str = "/api/github-webbhuk";

/// Limits applied to every request.
#[derive(Debug, Clone, Copy)]
pub struct RequestLimits {
    /// Time allowed for a request, upstream calls included. Requests that
    /// run over are answered with 500.
    pub timeout: Duration,
    /// Largest accepted body.
    pub max_body_bytes: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self { timeout: Duration::from_secs(60), max_body_bytes: 25 * 1024 * 1024 }
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Store used for writes and health checks.
    pub store: Arc<dyn WebhookStore>,
    /// Event dispatcher.
    pub dispatcher: Arc<Dispatcher>,
    /// Secret for signature verification; `None` accepts unsigned deliveries.
    pub webhook_secret: Option<Arc<str>>,
    /// Timeout and body limit.
    pub limits: RequestLimits,
}

impl AppState {
    /// Creates state with default limits and no signature verification.
    pub fn new(store: Arc<dyn WebhookStore>, dispatcher: Dispatcher) -> Self {
        Self {
            store,
            dispatcher: Arc::new(dispatcher),
            webhook_secret: None,
            limits: RequestLimits::default(),
        }
    }

    /// Requires deliveries to be signed with `secret`.
    #[must_use]
    pub fn with_webhook_secret(mut self, secret: Option<String>) -> Self {
        self.webhook_secret = secret.filter(|s| !s.is_empty()).map(Arc::from);
        self
    }

    /// Replaces the request limits.
    #[must_use]
    pub fn with_limits(mut self, limits: RequestLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Builds the upstream clients and dispatcher described by `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the repository slug is malformed or the HTTP client
    /// cannot be built.
    pub fn from_config(config: &Config, store: Arc<dyn WebhookStore>) -> anyhow::Result<Self> {
        let http = config.to_client_config().build_client()?;
        let (owner, repo) = config.repository_parts()?;

        let github =
            GithubClient::new(http.clone(), &config.github_api_url, owner, repo, config.github_token.clone());
        let deployments = DeploymentsClient::new(http, config.deployments_api_url.clone())
            .with_token(config.deployments_token.clone())
            .with_project(config.deployments_project_id.clone())
            .with_team(config.deployments_team_id.clone());

        let dispatcher = Dispatcher::new(store.clone(), github, deployments);

        Ok(Self::new(store, dispatcher)
            .with_webhook_secret(config.github_webhook_secret.clone())
            .with_limits(RequestLimits {
                timeout: config.request_timeout(),
                max_body_bytes: config.max_payload_bytes,
            }))
    }
}

/// Creates the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use pulse_api::{create_router, AppState, Config};
/// use pulse_core::WebhookStore;
///
/// fn build(store: Arc<dyn WebhookStore>) -> anyhow::Result<axum::Router> {
///     let state = AppState::from_config(&Config::load()?, store)?;
///     Ok(create_router(state))
/// }
/// ```
pub fn create_router(state: AppState) -> Router {
    let limits = state.limits;

    let health_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/live", get(handlers::liveness_check));

    let webhook_routes = Router::new()
        .route(WEBHOOK_PATH, post(handlers::receive_github_webhook))
        .route(LEGACY_WEBHOOK_PATH, post(handlers::receive_github_webhook))
        .layer(DefaultBodyLimit::max(limits.max_body_bytes));

    Router::new()
        .merge(health_routes)
        .merge(webhook_routes)
        .layer(TimeoutLayer::with_status_code(StatusCode::INTERNAL_SERVER_ERROR, limits.timeout))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(inject_request_id))
        .with_state(state)
}

/// Middleware to inject request ID into all responses.
///
/// Adds X-Request-Id header for tracing requests across services.
async fn inject_request_id(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let mut req = req;
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-Id", header_value);
    }

    response
}

/// Starts the HTTP server with graceful shutdown support.
///
/// # Errors
///
/// Returns `std::io::Error` if the address cannot be bound.
pub async fn start_server(state: AppState, addr: SocketAddr) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    serve(listener, state).await
}

/// Serves on an already bound listener until a shutdown signal arrives.
///
/// # Errors
///
/// Returns `std::io::Error` if the listener fails.
pub async fn serve(listener: tokio::net::TcpListener, state: AppState) -> Result<(), std::io::Error> {
    let app = create_router(state);

    info!("HTTP server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("HTTP server stopped gracefully");
    Ok(())
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C, starting graceful shutdown");
        },
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    warn!("Waiting for in-flight requests to complete");
}
