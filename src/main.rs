//! repo-pulse webhook receiver.
//!
//! Loads configuration, connects to PostgreSQL, ensures the schema exists
//! and serves GitHub webhooks until SIGINT or SIGTERM.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use pulse_api::{AppState, Config, LogFormat};
use pulse_core::Storage;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};

const DEFAULT_FILTER: &str = "info,repo_pulse=debug,pulse_api=debug,tower_http=debug";

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_tracing(&config);

    info!(
        database_url = %config.database_url_masked(),
        host = %config.host,
        port = config.port,
        repository = %config.github_repository,
        "Configuration loaded"
    );

    if config.github_webhook_secret.is_none() {
        warn!("GITHUB_WEBHOOK_SECRET is not set; webhook signatures will not be verified");
    }

    let pool = create_database_pool(&config).await?;
    info!("Database connection pool established");

    let storage = Storage::new(pool.clone());
    storage.migrate().await.context("Failed to create database schema")?;
    info!("Database schema ready");

    let state = AppState::from_config(&config, Arc::new(storage))?;
    let addr = config.parse_server_addr()?;

    pulse_api::start_server(state, addr).await.context("HTTP server failed")?;

    pool.close().await;
    info!("Database connections closed");

    Ok(())
}

/// Initializes tracing from the configured filter and output format.
fn init_tracing(config: &Config) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_new(&config.rust_log)
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(fmt::layer().json().with_current_span(true)).init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_file(true).with_line_number(true))
            .init(),
    }
}

/// Creates the database connection pool with retry logic.
async fn create_database_pool(config: &Config) -> Result<sqlx::PgPool> {
    const MAX_RETRIES: u32 = 5;
    const RETRY_DELAY: Duration = Duration::from_secs(2);

    let mut retries = 0;

    loop {
        match PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connection_timeout))
            .idle_timeout(Duration::from_secs(config.database_idle_timeout))
            .max_lifetime(Duration::from_secs(config.database_max_lifetime))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => return Ok(pool),
            Err(e) if retries < MAX_RETRIES => {
                retries += 1;
                warn!(
                    attempt = retries,
                    max_retries = MAX_RETRIES,
                    error = %e,
                    "Database connection failed, retrying"
                );
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("Failed to create database connection pool after retries");
            },
        }
    }
}
