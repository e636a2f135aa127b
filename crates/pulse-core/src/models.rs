//! Core domain models for the records written by the webhook receiver.
//!
//! Defines repository stats, commits and deployments together with the
//! enumerations stored in their text columns. Enumerations decode from
//! PostgreSQL text so repositories can use `sqlx::FromRow` directly.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

type PgDb = sqlx::Postgres;
type PgValueRef<'r> = sqlx::postgres::PgValueRef<'r>;
type PgTypeInfo = sqlx::postgres::PgTypeInfo;
type BoxDynError = sqlx::error::BoxDynError;

/// Color recorded on commits that have just been pushed or merged.
///
/// A deployment is expected to follow, so new commits start out as pending.
pub const RECORDED_COMMIT_COLOR: CommitColor = CommitColor::Yellow;

/// Kind of repository counter kept in the `stats` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatType {
    /// Number of stargazers.
    Stars,
    /// Number of forks.
    Forks,
}

impl StatType {
    /// Returns the value stored in the `type` column.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stars => "stars",
            Self::Forks => "forks",
        }
    }
}

impl fmt::Display for StatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stars" => Ok(Self::Stars),
            "forks" => Ok(Self::Forks),
            _ => Err(format!("invalid stat type: {s}")),
        }
    }
}

impl sqlx::Type<PgDb> for StatType {
    fn type_info() -> PgTypeInfo {
        <&str as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for StatType {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <&str as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(s.parse()?)
    }
}

/// One row of the `stats` table, keyed uniquely by `stat_type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct StatsRecord {
    /// Which counter this row holds.
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub stat_type: StatType,
    /// Current value of the counter.
    pub count: i64,
}

impl StatsRecord {
    /// Creates a stats record.
    pub const fn new(stat_type: StatType, count: i64) -> Self {
        Self { stat_type, count }
    }
}

/// Display color attached to a commit, derived from its deployment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitColor {
    /// Build queued or in progress.
    Yellow,
    /// Deployment is live.
    Green,
    /// Deployment failed or was canceled.
    Red,
}

impl CommitColor {
    /// Maps a deployment state onto the color shown for its commit.
    ///
    /// `BUILDING` and `QUEUED` are yellow, `READY` is green, and every other
    /// state is red.
    pub fn for_deployment_state(state: &DeploymentState) -> Self {
        match state {
            DeploymentState::Building | DeploymentState::Queued => Self::Yellow,
            DeploymentState::Ready => Self::Green,
            _ => Self::Red,
        }
    }

    /// Returns the value stored in the `color` column.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Red => "red",
        }
    }
}

impl fmt::Display for CommitColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommitColor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yellow" => Ok(Self::Yellow),
            "green" => Ok(Self::Green),
            "red" => Ok(Self::Red),
            _ => Err(format!("invalid commit color: {s}")),
        }
    }
}

impl sqlx::Type<PgDb> for CommitColor {
    fn type_info() -> PgTypeInfo {
        <&str as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for CommitColor {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <&str as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(s.parse()?)
    }
}

/// A commit recorded from a push or a merged pull request.
///
/// Commits are not uniquely keyed; a redelivered push produces a second row.
/// Only `color` is ever changed after insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CommitRecord {
    /// Commit message, or `PR merged: <title>` for merges.
    pub message: String,
    /// Pusher name or pull request author login.
    pub author: String,
    /// ISO-8601 timestamp exactly as GitHub sent it.
    pub timestamp: String,
    /// Commit sha used to match deployments.
    pub sha: String,
    /// Display color, derived from the latest matching deployment.
    pub color: Option<CommitColor>,
}

/// Deployment state reported by the deployment platform.
///
/// Unknown states are kept verbatim in `Other` so new platform states never
/// fail a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeploymentState {
    /// Waiting for a build slot.
    Queued,
    /// Preparing the build.
    Initializing,
    /// Build running.
    Building,
    /// Deployment is live.
    Ready,
    /// Build or deployment failed.
    Error,
    /// Deployment was canceled.
    Canceled,
    /// Any state this service does not know about.
    Other(String),
}

impl DeploymentState {
    /// Returns the upper-case name used by the platform.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "QUEUED",
            Self::Initializing => "INITIALIZING",
            Self::Building => "BUILDING",
            Self::Ready => "READY",
            Self::Error => "ERROR",
            Self::Canceled => "CANCELED",
            Self::Other(state) => state,
        }
    }
}

impl From<&str> for DeploymentState {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "QUEUED" => Self::Queued,
            "INITIALIZING" => Self::Initializing,
            "BUILDING" => Self::Building,
            "READY" => Self::Ready,
            "ERROR" => Self::Error,
            "CANCELED" => Self::Canceled,
            _ => Self::Other(s.to_string()),
        }
    }
}

impl From<String> for DeploymentState {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<DeploymentState> for String {
    fn from(state: DeploymentState) -> Self {
        state.as_str().to_string()
    }
}

impl fmt::Display for DeploymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl sqlx::Type<PgDb> for DeploymentState {
    fn type_info() -> PgTypeInfo {
        <&str as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for DeploymentState {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <&str as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self::from(s))
    }
}

/// One row of the `deployments` table, keyed uniquely by `deployment_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeploymentRecord {
    /// Platform identifier of the deployment.
    pub deployment_id: String,
    /// State at the time the status event was processed.
    pub state: DeploymentState,
    /// When the platform created the deployment.
    pub created_at: DateTime<Utc>,
    /// Commit the deployment was built from, when the platform reports it.
    pub sha: Option<String>,
}

impl DeploymentRecord {
    /// Color that commits built by this deployment should show.
    pub fn commit_color(&self) -> CommitColor {
        CommitColor::for_deployment_state(&self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_follows_deployment_state() {
        assert_eq!(CommitColor::for_deployment_state(&DeploymentState::Queued), CommitColor::Yellow);
        assert_eq!(
            CommitColor::for_deployment_state(&DeploymentState::Building),
            CommitColor::Yellow
        );
        assert_eq!(CommitColor::for_deployment_state(&DeploymentState::Ready), CommitColor::Green);
        assert_eq!(CommitColor::for_deployment_state(&DeploymentState::Error), CommitColor::Red);
        assert_eq!(
            CommitColor::for_deployment_state(&DeploymentState::Initializing),
            CommitColor::Red
        );
        assert_eq!(
            CommitColor::for_deployment_state(&DeploymentState::Other("PAUSED".into())),
            CommitColor::Red
        );
    }

    #[test]
    fn deployment_state_parsing_is_case_insensitive() {
        assert_eq!(DeploymentState::from("ready"), DeploymentState::Ready);
        assert_eq!(DeploymentState::from(" Building "), DeploymentState::Building);
        assert_eq!(DeploymentState::from("PAUSED"), DeploymentState::Other("PAUSED".into()));
    }

    #[test]
    fn unknown_deployment_state_keeps_original_text() {
        let state = DeploymentState::from("Paused");
        assert_eq!(state.to_string(), "Paused");
    }

    #[test]
    fn stats_record_serializes_type_key() {
        let json = serde_json::to_value(StatsRecord::new(StatType::Stars, 42)).unwrap();
        assert_eq!(json, serde_json::json!({"type": "stars", "count": 42}));
    }

    #[test]
    fn enum_text_round_trips() {
        for stat in [StatType::Stars, StatType::Forks] {
            assert_eq!(stat.as_str().parse::<StatType>().unwrap(), stat);
        }
        for color in [CommitColor::Yellow, CommitColor::Green, CommitColor::Red] {
            assert_eq!(color.as_str().parse::<CommitColor>().unwrap(), color);
        }
        assert!("purple".parse::<CommitColor>().is_err());
    }
}
