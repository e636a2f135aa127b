#![no_main]

//! Fuzz target for webhook payload extraction.
//!
//! Feeds arbitrary bytes through JSON parsing and every extractor. Whatever
//! GitHub or the deployment API send, extraction must return a value or an
//! error and never panic.

use libfuzzer_sys::fuzz_target;
use pulse_core::{
    events::{
        extract_latest_deployment, extract_merged_pull_request, extract_push_commit,
        parse_created, DeploymentList,
    },
    EventType,
};
use serde_json::Value;

fuzz_target!(|data: &[u8]| {
    if let Ok(token) = std::str::from_utf8(data) {
        let event = EventType::parse(token);
        assert_eq!(EventType::parse(event.as_str()), event);
    }

    let Ok(payload) = serde_json::from_slice::<Value>(data) else { return };

    if let Some(commit) = extract_push_commit(&payload) {
        assert!(!commit.sha.is_empty());
    }
    if let Some(commit) = extract_merged_pull_request(&payload) {
        assert!(commit.message.starts_with("PR merged: "));
    }

    let _ = parse_created(&payload);

    if let Ok(list) = serde_json::from_value::<DeploymentList>(payload) {
        if let Ok(record) = extract_latest_deployment(&list) {
            assert!(!record.deployment_id.is_empty());
        }
    }
});
