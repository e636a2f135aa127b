//! Routes one classified webhook to the work it implies.
//!
//! Each event type maps to at most one upstream fetch followed by one or two
//! store writes, performed in sequence. Nothing is wrapped in a transaction:
//! if a later step fails, earlier writes stay committed.

use std::{fmt, sync::Arc};

use pulse_core::{
    events::{extract_latest_deployment, extract_merged_pull_request, extract_push_commit},
    EventType, PulseError, WebhookStore,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::upstream::{DeploymentsClient, GithubClient};

/// What handling a webhook amounted to.
///
/// Only logged; the sender always receives the same success response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Star and fork counts were refreshed.
    StatsUpdated {
        /// Stargazer count written.
        stars: i64,
        /// Fork count written.
        forks: i64,
    },
    /// A commit row was inserted.
    CommitRecorded {
        /// Sha of the recorded commit.
        sha: String,
    },
    /// The latest deployment was upserted.
    DeploymentRecorded {
        /// Platform id of the deployment.
        deployment_id: String,
        /// Commits whose color was updated; zero when the deployment has no sha.
        commits_recolored: u64,
    },
    /// A handled event lacked something needed to write.
    Skipped(&'static str),
    /// The event type is not handled.
    Ignored,
}

impl fmt::Display for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StatsUpdated { stars, forks } => {
                write!(f, "stats updated (stars={stars}, forks={forks})")
            },
            Self::CommitRecorded { sha } => write!(f, "commit {sha} recorded"),
            Self::DeploymentRecorded { deployment_id, commits_recolored } => write!(
                f,
                "deployment {deployment_id} recorded, {commits_recolored} commit(s) recolored"
            ),
            Self::Skipped(reason) => write!(f, "skipped: {reason}"),
            Self::Ignored => f.write_str("ignored"),
        }
    }
}

/// Performs the fetches and writes for each event type.
pub struct Dispatcher {
    store: Arc<dyn WebhookStore>,
    github: GithubClient,
    deployments: DeploymentsClient,
}

impl Dispatcher {
    /// Creates a dispatcher writing to `store`.
    pub fn new(
        store: Arc<dyn WebhookStore>,
        github: GithubClient,
        deployments: DeploymentsClient,
    ) -> Self {
        Self { store, github, deployments }
    }

    /// Handles one webhook.
    ///
    /// # Errors
    ///
    /// Returns the first upstream or store failure. Incomplete payloads are
    /// not errors; they yield [`DispatchOutcome::Skipped`].
    pub async fn dispatch(
        &self,
        event: &EventType,
        payload: &Value,
    ) -> Result<DispatchOutcome, PulseError> {
        match event {
            EventType::Watch | EventType::Fork => self.refresh_stats().await,
            EventType::Push => match extract_push_commit(payload) {
                Some(commit) => {
                    let sha = commit.sha.clone();
                    self.store.insert_commit(commit).await?;
                    Ok(DispatchOutcome::CommitRecorded { sha })
                },
                None => Ok(DispatchOutcome::Skipped("push without complete head commit")),
            },
            EventType::PullRequest => match extract_merged_pull_request(payload) {
                Some(commit) => {
                    let sha = commit.sha.clone();
                    self.store.insert_commit(commit).await?;
                    Ok(DispatchOutcome::CommitRecorded { sha })
                },
                None => Ok(DispatchOutcome::Skipped("pull request not merged or incomplete")),
            },
            EventType::Status => self.record_latest_deployment().await,
            EventType::Other(token) => {
                debug!(event = %token, "Unhandled event type");
                Ok(DispatchOutcome::Ignored)
            },
        }
    }

    async fn refresh_stats(&self) -> Result<DispatchOutcome, PulseError> {
        let stats = self.github.fetch_repository_stats().await?;
        self.store.upsert_stats(stats.to_records()).await?;

        info!(stars = stats.stargazers_count, forks = stats.forks_count, "Repository stats updated");
        Ok(DispatchOutcome::StatsUpdated { stars: stats.stargazers_count, forks: stats.forks_count })
    }

    async fn record_latest_deployment(&self) -> Result<DispatchOutcome, PulseError> {
        let list = self.deployments.fetch_deployments().await?;
        let deployment = extract_latest_deployment(&list)?;

        let deployment_id = deployment.deployment_id.clone();
        let color = deployment.commit_color();
        let sha = deployment.sha.clone();

        self.store.upsert_deployment(deployment).await?;

        let commits_recolored = match sha {
            Some(sha) => self.store.recolor_commits(sha, color).await?,
            None => 0,
        };

        info!(%deployment_id, %color, commits_recolored, "Deployment recorded");
        Ok(DispatchOutcome::DeploymentRecorded { deployment_id, commits_recolored })
    }
}
