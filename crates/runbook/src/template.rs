// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

//! Sandboxed Jinja-style template engine.
//!
//! Runbook strings use `{{ expr }}` for substitution and `{% stmt %}`
//! for control flow. The environment is restricted by construction:
//! undefined variables are hard errors, and the only callable beyond
//! the builtin filters (`default`, `upper`, `lower`, `join`, ...) is
//! `env(name, default)` reading a process environment variable.

use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use thiserror::Error;

/// Errors that can occur during template rendering
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Template syntax error
    #[error("template syntax error: {0}")]
    Syntax(String),

    /// Undefined variable reference
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),

    /// Any other render failure
    #[error("render error: {0}")]
    Render(String),
}

impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        use minijinja::ErrorKind;
        match err.kind() {
            ErrorKind::UndefinedError => TemplateError::UndefinedVariable(err.to_string()),
            ErrorKind::SyntaxError => TemplateError::Syntax(err.to_string()),
            _ => TemplateError::Render(err.to_string()),
        }
    }
}

/// Restricted template engine for runbook strings
#[derive(Debug, Clone, Default)]
pub struct TemplateEngine;

impl TemplateEngine {
    pub fn new() -> Self {
        Self
    }

    /// Build the sandboxed environment: strict undefined plus the `env`
    /// accessor. Callers may add further functions before rendering.
    pub fn environment(&self) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.add_function("env", env_var);
        env.add_filter("env", env_var);
        env
    }

    /// Render a template string against a serializable context
    pub fn render<S: Serialize>(&self, template: &str, context: &S) -> Result<String, TemplateError> {
        self.render_in(&self.environment(), template, context)
    }

    /// Render within a caller-extended environment
    pub fn render_in<S: Serialize>(
        &self,
        env: &Environment<'_>,
        template: &str,
        context: &S,
    ) -> Result<String, TemplateError> {
        let tmpl = env.template_from_str(template)?;
        Ok(tmpl.render(context)?)
    }

    /// Check that a template parses, without rendering it
    pub fn check_syntax(&self, template: &str) -> Result<(), TemplateError> {
        self.environment().template_from_str(template)?;
        Ok(())
    }
}

fn env_var(name: String, default: Option<String>) -> String {
    std::env::var(&name).unwrap_or_else(|_| default.unwrap_or_default())
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
