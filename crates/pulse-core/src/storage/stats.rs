//! Repository for repository counters.
//!
//! The `stats` table holds one row per counter type. Writes always upsert on
//! `type`, so the table never grows beyond one row per counter.

use std::sync::Arc;

use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    error::Result,
    models::{StatType, StatsRecord},
};

/// Repository for stats database operations.
pub struct Repository {
    pool: Arc<PgPool>,
}

impl Repository {
    /// Creates a new repository instance.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Upserts all records in a single statement, conflict key `type`.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns error if the statement fails.
    pub async fn upsert_many(&self, records: &[StatsRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("INSERT INTO stats (type, count) ");
        builder.push_values(records, |mut row, record| {
            row.push_bind(record.stat_type.as_str()).push_bind(record.count);
        });
        builder.push(" ON CONFLICT (type) DO UPDATE SET count = EXCLUDED.count, updated_at = NOW()");

        let result = builder.build().execute(&*self.pool).await?;
        Ok(result.rows_affected())
    }

    /// Finds the record for one counter type.
    ///
    /// # Errors
    ///
    /// Returns error if query fails.
    pub async fn find_by_type(&self, stat_type: StatType) -> Result<Option<StatsRecord>> {
        let record = sqlx::query_as::<_, StatsRecord>(
            r"
            SELECT type, count
            FROM stats
            WHERE type = $1
            ",
        )
        .bind(stat_type.as_str())
        .fetch_optional(&*self.pool)
        .await?;

        Ok(record)
    }

    /// Returns every stats row ordered by type.
    ///
    /// # Errors
    ///
    /// Returns error if query fails.
    pub async fn find_all(&self) -> Result<Vec<StatsRecord>> {
        let records = sqlx::query_as::<_, StatsRecord>(
            r"
            SELECT type, count
            FROM stats
            ORDER BY type
            ",
        )
        .fetch_all(&*self.pool)
        .await?;

        Ok(records)
    }
}
