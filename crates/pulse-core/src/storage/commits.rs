//! Repository for recorded commits.
//!
//! Commits are appended on push and merge events and recolored in place
//! when a deployment for their sha is reported.

use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    error::Result,
    models::{CommitColor, CommitRecord},
};

/// Repository for commit database operations.
pub struct Repository {
    pool: Arc<PgPool>,
}

impl Repository {
    /// Creates a new repository instance.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Inserts a commit and returns its row id.
    ///
    /// # Errors
    ///
    /// Returns error if insert fails.
    pub async fn insert(&self, commit: &CommitRecord) -> Result<i64> {
        let id = sqlx::query_scalar(
            r"
            INSERT INTO commits (message, author, timestamp, sha, color)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            ",
        )
        .bind(&commit.message)
        .bind(&commit.author)
        .bind(&commit.timestamp)
        .bind(&commit.sha)
        .bind(commit.color.map(CommitColor::as_str))
        .fetch_one(&*self.pool)
        .await?;

        Ok(id)
    }

    /// Sets the color of every commit with the given sha.
    ///
    /// Returns the number of rows updated; zero when no commit matches.
    ///
    /// # Errors
    ///
    /// Returns error if update fails.
    pub async fn update_color_by_sha(&self, sha: &str, color: CommitColor) -> Result<u64> {
        let result = sqlx::query(
            r"
            UPDATE commits
            SET color = $2
            WHERE sha = $1
            ",
        )
        .bind(sha)
        .bind(color.as_str())
        .execute(&*self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Finds all commits with the given sha, oldest first.
    ///
    /// # Errors
    ///
    /// Returns error if query fails.
    pub async fn find_by_sha(&self, sha: &str) -> Result<Vec<CommitRecord>> {
        let commits = sqlx::query_as::<_, CommitRecord>(
            r"
            SELECT message, author, timestamp, sha, color
            FROM commits
            WHERE sha = $1
            ORDER BY id ASC
            ",
        )
        .bind(sha)
        .fetch_all(&*self.pool)
        .await?;

        Ok(commits)
    }
}
