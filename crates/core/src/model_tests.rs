// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

use super::*;
use chrono::TimeZone;

fn command_node(id: &str) -> Node {
    Node {
        id: id.to_string(),
        depends_on: Vec::new(),
        critical: false,
        name: id.to_string(),
        description: None,
        prompt_before: String::new(),
        prompt_after: String::new(),
        skip: false,
        when: DEFAULT_WHEN.to_string(),
        timeout: DEFAULT_TIMEOUT_SECS,
        kind: NodeKind::Command {
            command: "true".to_string(),
            interactive: false,
        },
    }
}

fn runbook_with(nodes: Vec<Node>) -> Result<Runbook, ModelError> {
    let map: IndexMap<String, Node> = nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
    Runbook::new(
        "test".to_string(),
        "a test".to_string(),
        "0.1.0".to_string(),
        "tester".to_string(),
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        map,
    )
}

#[test]
fn critical_and_skip_is_rejected() {
    let mut node = command_node("a");
    node.critical = true;
    node.skip = true;
    let err = runbook_with(vec![node]).unwrap_err();
    assert!(matches!(err, ModelError::CriticalSkipped(id) if id == "a"));
}

#[test]
fn manual_node_requires_prompt_after() {
    let mut node = command_node("approve");
    node.kind = NodeKind::Manual;
    node.prompt_after = String::new();
    let err = runbook_with(vec![node]).unwrap_err();
    assert!(matches!(err, ModelError::EmptyManualPrompt(id) if id == "approve"));
}

#[test]
fn nodes_preserve_declaration_order() {
    let runbook = runbook_with(vec![
        command_node("first"),
        command_node("second"),
        command_node("third"),
    ])
    .unwrap();
    let ids: Vec<&String> = runbook.nodes.keys().collect();
    assert_eq!(ids, ["first", "second", "third"]);
}

#[test]
fn statuses_serialize_lowercase() {
    assert_eq!(
        serde_json::to_string(&NodeStatus::Nok).unwrap(),
        "\"nok\""
    );
    assert_eq!(
        serde_json::to_string(&RunStatus::Aborted).unwrap(),
        "\"aborted\""
    );
    assert_eq!(serde_json::to_string(&Trigger::Resume).unwrap(), "\"resume\"");
}

#[test]
fn run_status_round_trips_from_str() {
    for status in [
        RunStatus::Running,
        RunStatus::Ok,
        RunStatus::Nok,
        RunStatus::Aborted,
    ] {
        let parsed: RunStatus = status.as_str().parse().unwrap();
        assert_eq!(parsed, status);
    }
    assert!("bogus".parse::<RunStatus>().is_err());
}

#[test]
fn finish_computes_duration() {
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let mut execution = NodeExecution::running("wf", 1, "a", 1, start);
    execution.finish(NodeStatus::Ok, start + chrono::Duration::milliseconds(1500));
    assert_eq!(execution.status, NodeStatus::Ok);
    assert_eq!(execution.duration_ms, Some(1500));
    assert!(execution.end_time.is_some());
}

#[test]
fn skipped_attempt_is_terminal_with_rationale() {
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    let execution = NodeExecution::skipped("wf", 1, "a", 1, start, "not needed");
    assert_eq!(execution.status, NodeStatus::Skipped);
    assert!(execution.status.is_terminal());
    assert_eq!(execution.result_text.as_deref(), Some("not needed"));
    assert_eq!(execution.duration_ms, Some(0));
}
