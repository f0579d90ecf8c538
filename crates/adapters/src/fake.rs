// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

//! Scripted fake adapters for engine and integration tests

use pb_core::ports::{CommandOutput, IoHandler, ProcessError, ProcessRunner};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// What the fake IO handler observed, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoEvent {
    Prompt {
        node_id: String,
        text: String,
        decision: bool,
    },
    Description {
        node_id: String,
        text: String,
    },
    CommandOutput {
        node_id: String,
        stdout: String,
        stderr: String,
    },
    FunctionOutput {
        node_id: String,
        result: String,
    },
}

/// IO handler answering prompts from a script (default: approve) and
/// recording everything it is shown
#[derive(Default)]
pub struct FakeIoHandler {
    responses: Mutex<VecDeque<bool>>,
    events: Mutex<Vec<IoEvent>>,
}

impl FakeIoHandler {
    /// Approves every prompt
    pub fn approving() -> Self {
        Self::default()
    }

    /// Answers prompts from the queue, then approves
    pub fn scripted(responses: impl IntoIterator<Item = bool>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            events: Mutex::new(Vec::new()),
        }
    }

    /// Everything shown so far
    pub fn events(&self) -> Vec<IoEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of prompts asked
    pub fn prompt_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, IoEvent::Prompt { .. }))
            .count()
    }

    fn record(&self, event: IoEvent) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).push(event);
    }
}

impl IoHandler for FakeIoHandler {
    fn prompt(&self, node_id: &str, _node_name: &str, text: &str) -> bool {
        let decision = self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or(true);
        self.record(IoEvent::Prompt {
            node_id: node_id.to_string(),
            text: text.to_string(),
            decision,
        });
        decision
    }

    fn description(&self, node_id: &str, _node_name: &str, text: &str) {
        self.record(IoEvent::Description {
            node_id: node_id.to_string(),
            text: text.to_string(),
        });
    }

    fn command_output(
        &self,
        node_id: &str,
        _node_name: &str,
        _description: Option<&str>,
        stdout: &str,
        stderr: &str,
    ) {
        self.record(IoEvent::CommandOutput {
            node_id: node_id.to_string(),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        });
    }

    fn function_output(
        &self,
        node_id: &str,
        _node_name: &str,
        _description: Option<&str>,
        result: &str,
    ) {
        self.record(IoEvent::FunctionOutput {
            node_id: node_id.to_string(),
            result: result.to_string(),
        });
    }
}

/// Process runner resolving commands from a table instead of a shell.
///
/// Unconfigured commands succeed with empty output, except the literal
/// `false`, which fails with exit code 1 (so fixtures can use the
/// conventional `true`/`false` commands).
#[derive(Default)]
pub struct FakeProcessRunner {
    outcomes: Mutex<HashMap<String, CommandOutput>>,
    invocations: Mutex<Vec<String>>,
}

impl FakeProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the outcome for a command string
    pub fn set_outcome(&self, command: &str, output: CommandOutput) {
        self.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(command.to_string(), output);
    }

    /// Commands run so far, in order
    pub fn invocations(&self) -> Vec<String> {
        self.invocations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl ProcessRunner for FakeProcessRunner {
    fn run(
        &self,
        command: &str,
        _timeout: Duration,
        _interactive: bool,
    ) -> Result<CommandOutput, ProcessError> {
        self.invocations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(command.to_string());

        if let Some(output) = self
            .outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(command)
        {
            return Ok(output.clone());
        }

        let exit_code = if command == "false" { 1 } else { 0 };
        Ok(CommandOutput {
            exit_code,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
