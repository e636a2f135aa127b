//! Repository for deployments reported by the deployment platform.

use std::sync::Arc;

use sqlx::PgPool;

use crate::{error::Result, models::DeploymentRecord};

/// Repository for deployment database operations.
pub struct Repository {
    pool: Arc<PgPool>,
}

impl Repository {
    /// Creates a new repository instance.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Upserts a deployment, conflict key `deployment_id`.
    ///
    /// # Errors
    ///
    /// Returns error if the statement fails.
    pub async fn upsert(&self, deployment: &DeploymentRecord) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO deployments (deployment_id, state, created_at, sha)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (deployment_id) DO UPDATE
            SET state = EXCLUDED.state,
                created_at = EXCLUDED.created_at,
                sha = EXCLUDED.sha,
                updated_at = NOW()
            ",
        )
        .bind(&deployment.deployment_id)
        .bind(deployment.state.as_str())
        .bind(deployment.created_at)
        .bind(deployment.sha.as_deref())
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    /// Finds a deployment by its platform id.
    ///
    /// # Errors
    ///
    /// Returns error if query fails.
    pub async fn find_by_id(&self, deployment_id: &str) -> Result<Option<DeploymentRecord>> {
        let deployment = sqlx::query_as::<_, DeploymentRecord>(
            r"
            SELECT deployment_id, state, created_at, sha
            FROM deployments
            WHERE deployment_id = $1
            ",
        )
        .bind(deployment_id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(deployment)
    }
}
