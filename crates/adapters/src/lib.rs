// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters behind the engine's ports: real shell execution and
//! scripted fakes for tests

mod process;

#[cfg(any(test, feature = "test-support"))]
mod fake;

pub use process::ShellProcessRunner;

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeIoHandler, FakeProcessRunner, IoEvent};
