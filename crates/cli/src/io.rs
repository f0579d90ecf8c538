// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

//! Console implementation of the engine's IO port

use pb_core::ports::IoHandler;
use std::io::{BufRead, Write};

/// IO handler talking to the terminal. With `assume_yes` every prompt
/// is approved without reading input.
pub struct ConsoleIoHandler {
    assume_yes: bool,
}

impl ConsoleIoHandler {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl IoHandler for ConsoleIoHandler {
    fn prompt(&self, _node_id: &str, node_name: &str, text: &str) -> bool {
        println!("\n[{node_name}] {text}");
        if self.assume_yes {
            println!("Approve? [y/N] y (auto-approved)");
            return true;
        }
        confirm("Approve? [y/N] ")
    }

    fn description(&self, _node_id: &str, node_name: &str, text: &str) {
        println!("\n[{node_name}] {text}");
    }

    fn command_output(
        &self,
        _node_id: &str,
        node_name: &str,
        _description: Option<&str>,
        stdout: &str,
        stderr: &str,
    ) {
        if !stdout.trim().is_empty() {
            println!("[{node_name}] output:\n{stdout}");
        }
        if !stderr.trim().is_empty() {
            eprintln!("[{node_name}] stderr:\n{stderr}");
        }
    }

    fn function_output(
        &self,
        _node_id: &str,
        node_name: &str,
        _description: Option<&str>,
        result: &str,
    ) {
        if !result.trim().is_empty() {
            println!("[{node_name}] result:\n{result}");
        }
    }
}

/// Ask a yes/no question on the terminal; empty input means no
pub fn confirm(prompt: &str) -> bool {
    matches!(
        read_answer(prompt).as_str(),
        "y" | "yes" | "Y" | "Yes" | "YES"
    )
}

/// Ask for one of a set of single-letter choices, with a default
pub fn ask_choice(prompt: &str, choices: &[&str], default: &str) -> String {
    loop {
        let answer = read_answer(prompt);
        if answer.is_empty() {
            return default.to_string();
        }
        if choices.contains(&answer.as_str()) {
            return answer;
        }
        println!("Please answer one of: {}", choices.join(", "));
    }
}

/// Read a free-form line
pub fn read_line(prompt: &str) -> String {
    read_answer(prompt)
}

fn read_answer(prompt: &str) -> String {
    print!("{prompt}");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    if std::io::stdin().lock().read_line(&mut line).is_err() {
        return String::new();
    }
    line.trim().to_string()
}
