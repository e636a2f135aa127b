//! GitHub webhook payloads and upstream response bodies.

use serde_json::{json, Value};

/// Body of `GET /repos/{owner}/{repo}` with the given counters.
pub fn repository(stars: i64, forks: i64) -> Value {
    json!({
        "id": 1_296_269,
        "full_name": "acme/tree-viewer",
        "stargazers_count": stars,
        "forks_count": forks,
        "watchers_count": stars
    })
}

/// `watch` event payload.
pub fn watch_event() -> Value {
    json!({
        "action": "started",
        "repository": { "full_name": "acme/tree-viewer" },
        "sender": { "login": "octocat" }
    })
}

/// `push` event payload whose head commit has `sha`.
pub fn push_event(sha: &str) -> Value {
    json!({
        "ref": "refs/heads/main",
        "head_commit": {
            "id": sha,
            "message": "Fix tree layout",
            "timestamp": "2024-05-01T10:00:00+02:00"
        },
        "pusher": { "name": "octocat", "email": "octocat@example.com" }
    })
}

/// `push` event for a branch deletion, which carries no head commit.
pub fn branch_delete_push_event() -> Value {
    json!({
        "ref": "refs/heads/old-feature",
        "deleted": true,
        "head_commit": null,
        "pusher": { "name": "octocat" }
    })
}

/// `pull_request` event payload.
pub fn pull_request_event(action: &str, merged: bool, sha: &str) -> Value {
    let merged_at = if merged { json!("2024-05-02T08:30:00Z") } else { Value::Null };
    json!({
        "action": action,
        "number": 42,
        "pull_request": {
            "title": "Add zoom controls",
            "merged": merged,
            "merged_at": merged_at,
            "merge_commit_sha": sha,
            "user": { "login": "hubot" }
        }
    })
}

/// `status` event payload for `sha`.
pub fn status_event(sha: &str) -> Value {
    json!({
        "sha": sha,
        "state": "success",
        "context": "deployment",
        "description": "Deployment has completed"
    })
}

/// Deployment listing whose latest entry has the given id, state and sha.
pub fn deployment_list(uid: &str, state: &str, sha: Option<&str>) -> Value {
    let meta = sha.map_or_else(|| json!({}), |sha| json!({ "githubCommitSha": sha }));
    json!({
        "deployments": [
            { "uid": uid, "state": state, "created": 1_714_550_400_000_i64, "meta": meta },
            {
                "uid": "dpl_previous",
                "state": "READY",
                "created": 1_714_464_000_000_i64,
                "meta": { "githubCommitSha": "0000000" }
            }
        ],
        "pagination": { "count": 2 }
    })
}

/// Deployment listing with no entries.
pub fn empty_deployment_list() -> Value {
    json!({ "deployments": [] })
}
