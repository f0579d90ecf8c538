// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

use super::*;
use pb_core::ports::{IoHandler, ProcessRunner};

#[test]
fn scripted_prompts_then_default_approve() {
    let io = FakeIoHandler::scripted([false, true]);
    assert!(!io.prompt("a", "a", "first?"));
    assert!(io.prompt("b", "b", "second?"));
    // script exhausted: defaults to approve
    assert!(io.prompt("c", "c", "third?"));
    assert_eq!(io.prompt_count(), 3);
}

#[test]
fn io_events_are_recorded_in_order() {
    let io = FakeIoHandler::approving();
    io.description("n", "n", "desc");
    io.command_output("n", "n", None, "out", "err");
    io.function_output("n", "n", None, "result");

    let events = io.events();
    assert_eq!(events.len(), 3);
    assert!(matches!(&events[0], IoEvent::Description { text, .. } if text == "desc"));
    assert!(matches!(&events[1], IoEvent::CommandOutput { stdout, .. } if stdout == "out"));
    assert!(matches!(&events[2], IoEvent::FunctionOutput { result, .. } if result == "result"));
}

#[test]
fn fake_runner_defaults_true_and_false() {
    let runner = FakeProcessRunner::new();
    let ok = runner
        .run("true", std::time::Duration::from_secs(1), false)
        .unwrap();
    assert_eq!(ok.exit_code, 0);

    let failed = runner
        .run("false", std::time::Duration::from_secs(1), false)
        .unwrap();
    assert_eq!(failed.exit_code, 1);

    assert_eq!(runner.invocations(), ["true", "false"]);
}

#[test]
fn fake_runner_uses_configured_outcomes() {
    let runner = FakeProcessRunner::new();
    runner.set_outcome(
        "deploy",
        CommandOutput {
            exit_code: 2,
            stdout: "partial".to_string(),
            stderr: "disk full".to_string(),
        },
    );
    let output = runner
        .run("deploy", std::time::Duration::from_secs(1), false)
        .unwrap();
    assert_eq!(output.exit_code, 2);
    assert_eq!(output.stderr, "disk full");
}
