//! In-memory webhook store.
//!
//! Mirrors the PostgreSQL conflict semantics: stats are keyed by type,
//! deployments by id, and commits are appended without deduplication.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use pulse_core::{
    error::CoreError,
    storage::{StoreFuture, WebhookStore},
    CommitColor, CommitRecord, DeploymentRecord, StatType, StatsRecord,
};
use tokio::sync::RwLock;

/// Store that keeps everything in memory and counts writes.
#[derive(Default)]
pub struct MemoryStore {
    stats: RwLock<HashMap<StatType, i64>>,
    commits: RwLock<Vec<CommitRecord>>,
    deployments: RwLock<HashMap<String, DeploymentRecord>>,
    writes: AtomicUsize,
    failing: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent operation fail with a database error.
    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Number of write operations that reached the store.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Current value of a counter, if it was ever written.
    pub async fn stat(&self, stat_type: StatType) -> Option<i64> {
        self.stats.read().await.get(&stat_type).copied()
    }

    /// Number of distinct stats rows.
    pub async fn stats_len(&self) -> usize {
        self.stats.read().await.len()
    }

    /// All commits in insertion order.
    pub async fn commits(&self) -> Vec<CommitRecord> {
        self.commits.read().await.clone()
    }

    /// Seeds a commit without counting it as a write.
    pub async fn seed_commit(&self, commit: CommitRecord) {
        self.commits.write().await.push(commit);
    }

    /// The deployment stored under `deployment_id`.
    pub async fn deployment(&self, deployment_id: &str) -> Option<DeploymentRecord> {
        self.deployments.read().await.get(deployment_id).cloned()
    }

    /// Number of distinct deployments.
    pub async fn deployments_len(&self) -> usize {
        self.deployments.read().await.len()
    }

    fn check(&self) -> pulse_core::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CoreError::Database("memory store configured to fail".to_string()));
        }
        Ok(())
    }

    fn record_write(&self) -> pulse_core::Result<()> {
        self.check()?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl WebhookStore for MemoryStore {
    fn upsert_stats(&self, records: Vec<StatsRecord>) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.record_write()?;
            let mut stats = self.stats.write().await;
            for record in records {
                stats.insert(record.stat_type, record.count);
            }
            Ok(())
        })
    }

    fn insert_commit(&self, commit: CommitRecord) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.record_write()?;
            self.commits.write().await.push(commit);
            Ok(())
        })
    }

    fn upsert_deployment(&self, deployment: DeploymentRecord) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.record_write()?;
            self.deployments.write().await.insert(deployment.deployment_id.clone(), deployment);
            Ok(())
        })
    }

    fn recolor_commits(&self, sha: String, color: CommitColor) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            self.record_write()?;
            let mut commits = self.commits.write().await;
            let mut updated = 0;
            for commit in commits.iter_mut().filter(|commit| commit.sha == sha) {
                commit.color = Some(color);
                updated += 1;
            }
            Ok(updated)
        })
    }

    fn health_check(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move { self.check() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(sha: &str) -> CommitRecord {
        CommitRecord {
            message: "msg".into(),
            author: "octocat".into(),
            timestamp: "2024-05-01T10:00:00Z".into(),
            sha: sha.into(),
            color: Some(CommitColor::Yellow),
        }
    }

    #[tokio::test]
    async fn stats_upsert_replaces_counts() {
        let store = MemoryStore::new();
        store.upsert_stats(vec![StatsRecord::new(StatType::Stars, 1)]).await.unwrap();
        store.upsert_stats(vec![StatsRecord::new(StatType::Stars, 5)]).await.unwrap();

        assert_eq!(store.stat(StatType::Stars).await, Some(5));
        assert_eq!(store.stats_len().await, 1);
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn recolor_touches_only_matching_sha() {
        let store = MemoryStore::new();
        store.seed_commit(commit("a")).await;
        store.seed_commit(commit("b")).await;
        store.seed_commit(commit("a")).await;

        let updated = store.recolor_commits("a".into(), CommitColor::Red).await.unwrap();

        assert_eq!(updated, 2);
        let commits = store.commits().await;
        assert_eq!(commits[1].color, Some(CommitColor::Yellow));
        assert_eq!(commits[2].color, Some(CommitColor::Red));
    }

    #[tokio::test]
    async fn failing_store_rejects_writes() {
        let store = MemoryStore::new();
        store.fail_all();

        assert!(store.insert_commit(commit("a")).await.is_err());
        assert!(store.health_check().await.is_err());
        assert_eq!(store.write_count(), 0);
    }
}
