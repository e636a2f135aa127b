//! PostgreSQL repository tests.
//!
//! These need a reachable database and run only when asked for:
//! `DATABASE_URL=postgres://... cargo test -p pulse-core -- --ignored`.

use chrono::{TimeZone, Utc};
use pulse_core::{
    CommitColor, CommitRecord, DeploymentRecord, DeploymentState, StatType, StatsRecord, Storage,
    WebhookStore,
};
use sqlx::PgPool;
use uuid::Uuid;

async fn storage() -> Storage {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for storage tests");
    let pool = PgPool::connect(&url).await.expect("failed to connect to database");
    let storage = Storage::new(pool);
    storage.migrate().await.expect("failed to create schema");
    storage
}

fn unique(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn stats_upsert_keeps_one_row_per_type() {
    let storage = storage().await;

    storage
        .upsert_stats(vec![
            StatsRecord::new(StatType::Stars, 10),
            StatsRecord::new(StatType::Forks, 2),
        ])
        .await
        .unwrap();
    storage
        .upsert_stats(vec![
            StatsRecord::new(StatType::Stars, 11),
            StatsRecord::new(StatType::Forks, 3),
        ])
        .await
        .unwrap();

    let stars = storage.stats.find_by_type(StatType::Stars).await.unwrap().unwrap();
    assert_eq!(stars.count, 11);

    let all = storage.stats.find_all().await.unwrap();
    assert_eq!(all.iter().filter(|r| r.stat_type == StatType::Forks).count(), 1);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn recolor_updates_every_commit_with_sha() {
    let storage = storage().await;
    let sha = unique("sha");

    let commit = CommitRecord {
        message: "Fix tree layout".into(),
        author: "octocat".into(),
        timestamp: "2024-05-01T10:00:00Z".into(),
        sha: sha.clone(),
        color: Some(CommitColor::Yellow),
    };
    storage.insert_commit(commit.clone()).await.unwrap();
    storage.insert_commit(commit).await.unwrap();

    let updated = storage.recolor_commits(sha.clone(), CommitColor::Green).await.unwrap();
    assert_eq!(updated, 2);

    let commits = storage.commits.find_by_sha(&sha).await.unwrap();
    assert!(commits.iter().all(|c| c.color == Some(CommitColor::Green)));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn deployment_upsert_replaces_state() {
    let storage = storage().await;
    let id = unique("dpl");

    let mut deployment = DeploymentRecord {
        deployment_id: id.clone(),
        state: DeploymentState::Building,
        created_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
        sha: None,
    };
    storage.upsert_deployment(deployment.clone()).await.unwrap();

    deployment.state = DeploymentState::Ready;
    deployment.sha = Some("9f2c1e0".into());
    storage.upsert_deployment(deployment.clone()).await.unwrap();

    let stored = storage.deployments.find_by_id(&id).await.unwrap().unwrap();
    assert_eq!(stored, deployment);
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn health_check_succeeds_against_live_database() {
    let storage = storage().await;
    storage.health_check().await.unwrap();
}
