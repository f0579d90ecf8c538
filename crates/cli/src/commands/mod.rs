// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

pub mod export_dot;
pub mod run;
pub mod set_status;
pub mod show;
pub mod validate;
