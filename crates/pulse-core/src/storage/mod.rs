//! Database access layer for stats, commits and deployments.
//!
//! Each table has its own repository sharing one connection pool. The
//! dispatcher never talks to the repositories directly; it goes through the
//! [`WebhookStore`] trait so request handling can be exercised against an
//! in-memory store in tests.

use std::{future::Future, pin::Pin, sync::Arc};

use sqlx::PgPool;
use tracing::debug;

pub mod commits;
pub mod deployments;
pub mod stats;

use crate::{
    error::Result,
    models::{CommitColor, CommitRecord, DeploymentRecord, StatsRecord},
};

/// Boxed future returned by [`WebhookStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Store operations performed while handling a webhook.
///
/// Production uses [`Storage`] backed by PostgreSQL. None of the operations
/// span a transaction: each one commits on its own.
pub trait WebhookStore: Send + Sync + 'static {
    /// Upserts stats rows, replacing the count of any row with the same type.
    fn upsert_stats(&self, records: Vec<StatsRecord>) -> StoreFuture<'_, ()>;

    /// Inserts a commit. Duplicate commits are not detected.
    fn insert_commit(&self, commit: CommitRecord) -> StoreFuture<'_, ()>;

    /// Upserts a deployment keyed by its deployment id.
    fn upsert_deployment(&self, deployment: DeploymentRecord) -> StoreFuture<'_, ()>;

    /// Sets the color of every commit with the given sha.
    ///
    /// Returns the number of commits updated.
    fn recolor_commits(&self, sha: String, color: CommitColor) -> StoreFuture<'_, u64>;

    /// Verifies the store is reachable.
    fn health_check(&self) -> StoreFuture<'_, ()>;
}

/// Container for all repository instances providing unified database access.
#[derive(Clone)]
pub struct Storage {
    /// Repository for repository counters.
    pub stats: Arc<stats::Repository>,

    /// Repository for recorded commits.
    pub commits: Arc<commits::Repository>,

    /// Repository for deployments.
    pub deployments: Arc<deployments::Repository>,

    pool: Arc<PgPool>,
}

impl Storage {
    /// Creates a new storage instance with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        let pool = Arc::new(pool);

        Self {
            stats: Arc::new(stats::Repository::new(pool.clone())),
            commits: Arc::new(commits::Repository::new(pool.clone())),
            deployments: Arc::new(deployments::Repository::new(pool.clone())),
            pool,
        }
    }

    /// Executes `SELECT 1` to verify database connectivity.
    pub async fn ping(&self) -> Result<()> {
        let _: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&*self.pool).await?;
        Ok(())
    }

    /// Creates the tables and indexes used by the service if missing.
    pub async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&*self.pool).await?;
        }
        debug!(statements = SCHEMA.len(), "Schema ensured");
        Ok(())
    }
}

const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS stats (
        type TEXT PRIMARY KEY,
        count BIGINT NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS commits (
        id BIGSERIAL PRIMARY KEY,
        message TEXT NOT NULL,
        author TEXT NOT NULL,
        timestamp TEXT NOT NULL,
        sha TEXT NOT NULL,
        color TEXT,
        inserted_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS deployments (
        deployment_id TEXT PRIMARY KEY,
        state TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        sha TEXT,
        updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    ",
    r"
    CREATE INDEX IF NOT EXISTS idx_commits_sha ON commits(sha)
    ",
];

impl WebhookStore for Storage {
    fn upsert_stats(&self, records: Vec<StatsRecord>) -> StoreFuture<'_, ()> {
        let stats = self.stats.clone();
        Box::pin(async move { stats.upsert_many(&records).await.map(|_| ()) })
    }

    fn insert_commit(&self, commit: CommitRecord) -> StoreFuture<'_, ()> {
        let commits = self.commits.clone();
        Box::pin(async move { commits.insert(&commit).await.map(|_| ()) })
    }

    fn upsert_deployment(&self, deployment: DeploymentRecord) -> StoreFuture<'_, ()> {
        let deployments = self.deployments.clone();
        Box::pin(async move { deployments.upsert(&deployment).await })
    }

    fn recolor_commits(&self, sha: String, color: CommitColor) -> StoreFuture<'_, u64> {
        let commits = self.commits.clone();
        Box::pin(async move { commits.update_color_by_sha(&sha, color).await })
    }

    fn health_check(&self) -> StoreFuture<'_, ()> {
        Box::pin(self.ping())
    }
}
