//! Core domain models and payload handling for repo-pulse.
//!
//! Provides the records written for each GitHub webhook, the pure functions
//! that extract them from event payloads, the error taxonomy, and the
//! PostgreSQL repositories behind the [`storage::WebhookStore`] trait.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod models;
pub mod storage;

pub use error::{CoreError, PulseError, Result};
pub use events::{DeploymentList, EventType};
pub use models::{
    CommitColor, CommitRecord, DeploymentRecord, DeploymentState, StatType, StatsRecord,
};
pub use storage::{Storage, WebhookStore};
