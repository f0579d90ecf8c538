// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

//! Shell command execution through `sh -c`.
//!
//! Commands run in their own process group; on timeout the whole group
//! is killed and the runner yields a non-zero exit code with a timeout
//! message on stderr. The engine stays synchronous: the tokio runtime
//! here is an internal detail, blocked on per call.

use pb_core::ports::{CommandOutput, ProcessError, ProcessRunner};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Process runner executing commands through the system shell
pub struct ShellProcessRunner {
    runtime: tokio::runtime::Runtime,
}

impl ShellProcessRunner {
    pub fn new() -> Result<Self, ProcessError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ProcessError::Internal(e.to_string()))?;
        Ok(Self { runtime })
    }
}

impl ProcessRunner for ShellProcessRunner {
    fn run(
        &self,
        command: &str,
        timeout: Duration,
        interactive: bool,
    ) -> Result<CommandOutput, ProcessError> {
        tracing::debug!(command, ?timeout, interactive, "running command");
        self.runtime.block_on(run_command(command, timeout, interactive))
    }
}

async fn run_command(
    command: &str,
    timeout: Duration,
    interactive: bool,
) -> Result<CommandOutput, ProcessError> {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd.kill_on_drop(true);
    #[cfg(unix)]
    cmd.process_group(0);

    if interactive {
        // Interactive commands inherit the terminal; output is not captured
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let mut child = cmd.spawn().map_err(|e| ProcessError::Spawn(e.to_string()))?;
        let pid = child.id();
        match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => {
                let status = status.map_err(|e| ProcessError::Internal(e.to_string()))?;
                Ok(CommandOutput {
                    exit_code: status.code().unwrap_or(-1),
                    stdout: String::new(),
                    stderr: String::new(),
                })
            }
            Err(_) => {
                kill_group(pid);
                Ok(timeout_output(timeout))
            }
        }
    } else {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = cmd.spawn().map_err(|e| ProcessError::Spawn(e.to_string()))?;
        let pid = child.id();
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output.map_err(|e| ProcessError::Internal(e.to_string()))?;
                Ok(CommandOutput {
                    exit_code: output.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                })
            }
            Err(_) => {
                // The child was dropped (and killed) by the elapsed
                // timeout; take the rest of its process group with it
                kill_group(pid);
                Ok(timeout_output(timeout))
            }
        }
    }
}

fn timeout_output(timeout: Duration) -> CommandOutput {
    CommandOutput {
        exit_code: 1,
        stdout: String::new(),
        stderr: format!("command timed out after {} seconds", timeout.as_secs()),
    }
}

#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = pid {
        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            tracing::debug!(pid, error = %e, "process group already gone");
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
