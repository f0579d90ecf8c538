// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Runbook parsing: variables, templating, conditions, and the TOML parser

mod conditions;
mod parser;
mod template;
mod variables;

pub use conditions::{
    evaluate_condition, fold_dependencies, ConditionContext, ConditionalDependency, DepCondition,
    InvalidCondition,
};
pub use parser::{ParseError, RunbookParser, RUNBOOK_EXTENSION};
pub use template::{TemplateEngine, TemplateError};
pub use variables::{VariableManager, VariableError, DEFAULT_ENV_PREFIX};
