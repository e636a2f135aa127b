//! Inbound webhook classification and payload extraction.
//!
//! GitHub identifies each delivery with an `x-github-event` token. The
//! functions here turn a parsed body into the record it should produce, or
//! `None` when a field the record needs is absent. Absence is never an
//! error: incomplete payloads are skipped, not rejected.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    error::PulseError,
    models::{CommitRecord, DeploymentRecord, DeploymentState, RECORDED_COMMIT_COLOR},
};

const DEPLOYMENTS_SERVICE: &str = "deployments";

/// Event type announced in the `x-github-event` header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventType {
    /// Someone starred the repository.
    Watch,
    /// Someone forked the repository.
    Fork,
    /// Commits were pushed.
    Push,
    /// Pull request activity.
    PullRequest,
    /// Commit status changed, typically from a deployment.
    Status,
    /// Any other event, kept lower-cased for logging.
    Other(String),
}

impl EventType {
    /// Classifies an event token, ignoring case and surrounding whitespace.
    pub fn parse(token: &str) -> Self {
        let token = token.trim().to_ascii_lowercase();
        match token.as_str() {
            "watch" => Self::Watch,
            "fork" => Self::Fork,
            "push" => Self::Push,
            "pull_request" => Self::PullRequest,
            "status" => Self::Status,
            _ => Self::Other(token),
        }
    }

    /// Returns the canonical lower-case token.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Watch => "watch",
            Self::Fork => "fork",
            Self::Push => "push",
            Self::PullRequest => "pull_request",
            Self::Status => "status",
            Self::Other(token) => token,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the commit recorded for a `push` event.
///
/// Needs `head_commit.message`, `pusher.name`, `head_commit.timestamp` and a
/// sha taken from `head_commit.id`, or `head_commit.sha` when the id is
/// absent. Empty strings count as absent.
pub fn extract_push_commit(payload: &Value) -> Option<CommitRecord> {
    let message = text_at(payload, "/head_commit/message")?;
    let author = text_at(payload, "/pusher/name")?;
    let timestamp = text_at(payload, "/head_commit/timestamp")?;
    let sha = text_at(payload, "/head_commit/id").or_else(|| text_at(payload, "/head_commit/sha"))?;

    Some(CommitRecord {
        message: message.to_string(),
        author: author.to_string(),
        timestamp: timestamp.to_string(),
        sha: sha.to_string(),
        color: Some(RECORDED_COMMIT_COLOR),
    })
}

/// Builds the commit recorded for a merged pull request.
///
/// Returns `None` unless `action` is `closed` and `pull_request.merged` is
/// `true`, or when title, author login, merge time or merge sha is absent.
pub fn extract_merged_pull_request(payload: &Value) -> Option<CommitRecord> {
    if payload.get("action").and_then(Value::as_str) != Some("closed") {
        return None;
    }
    if payload.pointer("/pull_request/merged").and_then(Value::as_bool) != Some(true) {
        return None;
    }

    let title = text_at(payload, "/pull_request/title")?;
    let author = text_at(payload, "/pull_request/user/login")?;
    let merged_at = text_at(payload, "/pull_request/merged_at")?;
    let sha = text_at(payload, "/pull_request/merge_commit_sha")?;

    Some(CommitRecord {
        message: format!("PR merged: {title}"),
        author: author.to_string(),
        timestamp: merged_at.to_string(),
        sha: sha.to_string(),
        color: Some(RECORDED_COMMIT_COLOR),
    })
}

/// Response body of the deployment listing API, newest deployment first.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploymentList {
    /// Deployments ordered from most to least recent.
    pub deployments: Vec<DeploymentEntry>,
}

/// One entry of the deployment listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploymentEntry {
    /// Platform identifier.
    pub uid: Option<String>,
    /// Platform state such as `READY` or `ERROR`.
    pub state: Option<String>,
    /// Creation time as epoch milliseconds or a date string.
    pub created: Option<Value>,
    /// Git metadata attached by the platform.
    #[serde(default)]
    pub meta: Option<DeploymentMeta>,
}

/// Git metadata of a deployment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploymentMeta {
    /// Sha of the commit the deployment was built from.
    #[serde(rename = "githubCommitSha")]
    pub github_commit_sha: Option<String>,
}

/// Turns the most recent deployment of a listing into a record.
///
/// # Errors
///
/// An empty listing, or a first entry without an id, state or usable
/// creation time, is an upstream format error.
pub fn extract_latest_deployment(list: &DeploymentList) -> Result<DeploymentRecord, PulseError> {
    let latest = list
        .deployments
        .first()
        .ok_or_else(|| PulseError::upstream_format(DEPLOYMENTS_SERVICE, "no deployments listed"))?;

    let deployment_id = latest
        .uid
        .as_deref()
        .filter(|uid| !uid.is_empty())
        .ok_or_else(|| PulseError::upstream_format(DEPLOYMENTS_SERVICE, "latest deployment has no uid"))?;

    let state = latest
        .state
        .as_deref()
        .filter(|state| !state.is_empty())
        .map(DeploymentState::from)
        .ok_or_else(|| {
            PulseError::upstream_format(DEPLOYMENTS_SERVICE, "latest deployment has no state")
        })?;

    let created_at = latest
        .created
        .as_ref()
        .and_then(parse_created)
        .ok_or_else(|| {
            PulseError::upstream_format(
                DEPLOYMENTS_SERVICE,
                "latest deployment has no usable creation time",
            )
        })?;

    let sha = latest
        .meta
        .as_ref()
        .and_then(|meta| meta.github_commit_sha.clone())
        .filter(|sha| !sha.is_empty());

    Ok(DeploymentRecord { deployment_id: deployment_id.to_string(), state, created_at, sha })
}

/// Parses a deployment creation time.
///
/// Accepts epoch milliseconds as a number or numeric string, then RFC 3339
/// and RFC 2822 date strings.
#[allow(clippy::cast_possible_truncation)]
pub fn parse_created(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(number) => {
            let millis = number.as_i64().or_else(|| number.as_f64().map(|f| f as i64))?;
            DateTime::from_timestamp_millis(millis)
        },
        Value::String(text) => {
            let text = text.trim();
            if let Ok(millis) = text.parse::<i64>() {
                return DateTime::from_timestamp_millis(millis);
            }
            DateTime::parse_from_rfc3339(text)
                .or_else(|_| DateTime::parse_from_rfc2822(text))
                .ok()
                .map(|date| date.with_timezone(&Utc))
        },
        _ => None,
    }
}

fn text_at<'a>(payload: &'a Value, pointer: &str) -> Option<&'a str> {
    payload.pointer(pointer).and_then(Value::as_str).filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::models::CommitColor;

    fn push_payload() -> Value {
        json!({
            "ref": "refs/heads/main",
            "head_commit": {
                "id": "9f2c1e0",
                "message": "Fix tree layout",
                "timestamp": "2024-05-01T10:00:00+02:00"
            },
            "pusher": { "name": "octocat", "email": "octocat@example.com" }
        })
    }

    #[test]
    fn event_tokens_are_case_insensitive() {
        assert_eq!(EventType::parse("push"), EventType::Push);
        assert_eq!(EventType::parse("PUSH"), EventType::Push);
        assert_eq!(EventType::parse(" Pull_Request "), EventType::PullRequest);
        assert_eq!(EventType::parse("Watch"), EventType::Watch);
        assert_eq!(EventType::parse("issues"), EventType::Other("issues".into()));
        assert_eq!(EventType::parse(""), EventType::Other(String::new()));
    }

    #[test]
    fn push_with_all_fields_yields_commit() {
        let commit = extract_push_commit(&push_payload()).unwrap();

        assert_eq!(commit.message, "Fix tree layout");
        assert_eq!(commit.author, "octocat");
        assert_eq!(commit.timestamp, "2024-05-01T10:00:00+02:00");
        assert_eq!(commit.sha, "9f2c1e0");
        assert_eq!(commit.color, Some(CommitColor::Yellow));
    }

    #[test]
    fn push_falls_back_to_head_commit_sha() {
        let mut payload = push_payload();
        payload["head_commit"].as_object_mut().unwrap().remove("id");
        payload["head_commit"]["sha"] = json!("abc123");

        assert_eq!(extract_push_commit(&payload).unwrap().sha, "abc123");
    }

    #[test]
    fn push_without_head_commit_is_skipped() {
        let payload = json!({ "pusher": { "name": "octocat" }, "head_commit": null });
        assert!(extract_push_commit(&payload).is_none());
    }

    #[test]
    fn push_with_empty_message_is_skipped() {
        let mut payload = push_payload();
        payload["head_commit"]["message"] = json!("");
        assert!(extract_push_commit(&payload).is_none());
    }

    #[test]
    fn merged_pull_request_yields_commit() {
        let payload = json!({
            "action": "closed",
            "pull_request": {
                "title": "Add zoom controls",
                "merged": true,
                "merged_at": "2024-05-02T08:30:00Z",
                "merge_commit_sha": "d34db33f",
                "user": { "login": "hubot" }
            }
        });

        let commit = extract_merged_pull_request(&payload).unwrap();
        assert_eq!(commit.message, "PR merged: Add zoom controls");
        assert_eq!(commit.author, "hubot");
        assert_eq!(commit.timestamp, "2024-05-02T08:30:00Z");
        assert_eq!(commit.sha, "d34db33f");
    }

    #[test]
    fn closed_unmerged_pull_request_is_skipped() {
        let payload = json!({
            "action": "closed",
            "pull_request": { "title": "Nope", "merged": false, "user": { "login": "hubot" } }
        });
        assert!(extract_merged_pull_request(&payload).is_none());
    }

    #[test]
    fn opened_pull_request_is_skipped() {
        let payload = json!({
            "action": "opened",
            "pull_request": {
                "title": "Draft",
                "merged": true,
                "merged_at": "2024-05-02T08:30:00Z",
                "merge_commit_sha": "d34db33f",
                "user": { "login": "hubot" }
            }
        });
        assert!(extract_merged_pull_request(&payload).is_none());
    }

    #[test]
    fn latest_deployment_uses_first_entry() {
        let list: DeploymentList = serde_json::from_value(json!({
            "deployments": [
                { "uid": "dpl_new", "state": "READY", "created": 1_714_550_400_000_i64,
                  "meta": { "githubCommitSha": "9f2c1e0" } },
                { "uid": "dpl_old", "state": "ERROR", "created": 1_714_464_000_000_i64 }
            ]
        }))
        .unwrap();

        let record = extract_latest_deployment(&list).unwrap();
        assert_eq!(record.deployment_id, "dpl_new");
        assert_eq!(record.state, DeploymentState::Ready);
        assert_eq!(record.sha.as_deref(), Some("9f2c1e0"));
        assert_eq!(record.created_at, Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());
        assert_eq!(record.commit_color(), CommitColor::Green);
    }

    #[test]
    fn empty_deployment_list_is_a_format_error() {
        let list = DeploymentList { deployments: Vec::new() };
        let err = extract_latest_deployment(&list).unwrap_err();
        assert!(matches!(err, PulseError::UpstreamFormat { service: "deployments", .. }));
    }

    #[test]
    fn deployment_without_uid_is_a_format_error() {
        let list = DeploymentList {
            deployments: vec![DeploymentEntry {
                state: Some("READY".into()),
                created: Some(json!(0)),
                ..DeploymentEntry::default()
            }],
        };
        let err = extract_latest_deployment(&list).unwrap_err();
        assert_eq!(err.code(), "P2002");
    }

    #[test]
    fn deployment_without_sha_is_still_recorded() {
        let list = DeploymentList {
            deployments: vec![DeploymentEntry {
                uid: Some("dpl_1".into()),
                state: Some("BUILDING".into()),
                created: Some(json!("2024-05-01T08:00:00Z")),
                meta: None,
            }],
        };
        let record = extract_latest_deployment(&list).unwrap();
        assert!(record.sha.is_none());
        assert_eq!(record.state, DeploymentState::Building);
    }

    #[test]
    fn created_accepts_several_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();

        assert_eq!(parse_created(&json!(1_714_550_400_000_i64)), Some(expected));
        assert_eq!(parse_created(&json!("1714550400000")), Some(expected));
        assert_eq!(parse_created(&json!("2024-05-01T08:00:00Z")), Some(expected));
        assert_eq!(parse_created(&json!("Wed, 01 May 2024 08:00:00 +0000")), Some(expected));
        assert_eq!(parse_created(&json!("yesterday")), None);
        assert_eq!(parse_created(&json!(null)), None);
    }
}
