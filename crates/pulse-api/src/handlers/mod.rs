//! HTTP request handlers for the repo-pulse API.
//!
//! - `webhook` receives GitHub deliveries
//! - `health` serves liveness, readiness and health probes

pub mod health;
pub mod webhook;

pub use health::{health_check, liveness_check, readiness_check};
pub use webhook::receive_github_webhook;
