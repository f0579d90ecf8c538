// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

//! Workflow variable handling: multi-source loading, fixed-priority
//! merging, type validation, and template substitution.
//!
//! Priority, strictly decreasing: command-line overrides > file-loaded
//! variables > prefixed environment variables > runbook defaults.

use crate::template::{TemplateEngine, TemplateError};
use indexmap::IndexMap;
use pb_core::value::VariableDefinition;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default environment variable prefix, stripped on load
pub const DEFAULT_ENV_PREFIX: &str = "PLAYBOOK_VAR_";

/// Variable loading and validation errors
#[derive(Debug, Error)]
pub enum VariableError {
    #[error("variable file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("cannot parse variable file {path}: {message}")]
    FileFormat { path: PathBuf, message: String },
    #[error("unknown variable file format: {0} (use .toml, .json, .yaml, or .env)")]
    UnknownFormat(PathBuf),
    #[error("invalid variable '{0}' (expected KEY=VALUE)")]
    InvalidCliVar(String),
    #[error("invalid definition for variable '{name}': {message}")]
    Definition { name: String, message: String },
    #[error("variable validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("missing required variables: {}", .0.join(", "))]
    MissingRequired(Vec<String>),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Loads, merges, validates, and substitutes workflow variables
#[derive(Debug, Clone, Default)]
pub struct VariableManager {
    engine: TemplateEngine,
}

impl VariableManager {
    pub fn new() -> Self {
        Self {
            engine: TemplateEngine::new(),
        }
    }

    /// Load variables from a file, format detected by extension:
    /// TOML, JSON, YAML, or `.env` (KEY=value lines, `#` comments,
    /// surrounding quotes stripped).
    pub fn load_file(&self, path: &Path) -> Result<Map<String, Value>, VariableError> {
        if !path.exists() {
            return Err(VariableError::FileNotFound(path.to_path_buf()));
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| VariableError::FileFormat {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let format_error = |message: String| VariableError::FileFormat {
            path: path.to_path_buf(),
            message,
        };

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("toml") => {
                let table: toml::Table =
                    toml::from_str(&content).map_err(|e| format_error(e.to_string()))?;
                Ok(table
                    .into_iter()
                    .map(|(k, v)| (k, toml_to_json(v)))
                    .collect())
            }
            Some("json") => {
                let value: Value =
                    serde_json::from_str(&content).map_err(|e| format_error(e.to_string()))?;
                match value {
                    Value::Object(map) => Ok(map),
                    _ => Err(format_error("top level must be an object".to_string())),
                }
            }
            Some("yaml") | Some("yml") => {
                let value: Value =
                    serde_yaml::from_str(&content).map_err(|e| format_error(e.to_string()))?;
                match value {
                    Value::Object(map) => Ok(map),
                    Value::Null => Ok(Map::new()),
                    _ => Err(format_error("top level must be a mapping".to_string())),
                }
            }
            Some("env") => Ok(parse_env_format(&content)),
            _ => Err(VariableError::UnknownFormat(path.to_path_buf())),
        }
    }

    /// Load variables from process environment variables carrying the
    /// given prefix. The prefix is stripped; values starting with `[` or
    /// `{` are tried as JSON and kept as strings when that fails.
    pub fn load_env(&self, prefix: &str) -> Map<String, Value> {
        let mut variables = Map::new();
        for (key, value) in std::env::vars() {
            if let Some(name) = key.strip_prefix(prefix) {
                if name.is_empty() {
                    continue;
                }
                variables.insert(name.to_string(), guess_json(value));
            }
        }
        variables
    }

    /// Parse command-line `KEY=VALUE` overrides
    pub fn parse_cli_vars(&self, vars: &[String]) -> Result<Map<String, Value>, VariableError> {
        let mut variables = Map::new();
        for var in vars {
            let (key, value) = var
                .split_once('=')
                .ok_or_else(|| VariableError::InvalidCliVar(var.clone()))?;
            variables.insert(key.trim().to_string(), guess_json(value.trim().to_string()));
        }
        Ok(variables)
    }

    /// Merge sources lowest priority first: defaults, environment,
    /// file, command line.
    pub fn merge(
        &self,
        cli: Map<String, Value>,
        file: Map<String, Value>,
        env: Map<String, Value>,
        defaults: Map<String, Value>,
    ) -> Map<String, Value> {
        let mut merged = Map::new();
        for source in [defaults, env, file, cli] {
            for (key, value) in source {
                merged.insert(key, value);
            }
        }
        merged
    }

    /// Validate values against their definitions, coercing in place.
    /// Every offending variable is reported in a single error.
    pub fn validate(
        &self,
        variables: &mut Map<String, Value>,
        definitions: &IndexMap<String, VariableDefinition>,
    ) -> Result<(), VariableError> {
        let mut errors = Vec::new();

        for (name, definition) in definitions {
            if definition.required && !variables.contains_key(name) {
                errors.push(format!("required variable '{name}' is missing"));
                continue;
            }
            let Some(value) = variables.get(name) else {
                continue;
            };
            match definition.coerce_and_validate(value.clone()) {
                Ok(coerced) => {
                    variables.insert(name.clone(), coerced);
                }
                Err(e) => errors.push(format!("variable '{name}': {e}")),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(VariableError::Validation(errors))
        }
    }

    /// Required variables with no value after merging
    pub fn missing_required(
        &self,
        definitions: &IndexMap<String, VariableDefinition>,
        provided: &Map<String, Value>,
    ) -> Vec<String> {
        definitions
            .iter()
            .filter(|(name, def)| def.required && !provided.contains_key(*name))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Render a template string with the given variables
    pub fn substitute_str(
        &self,
        template: &str,
        variables: &Map<String, Value>,
    ) -> Result<String, TemplateError> {
        self.engine.render(template, variables)
    }

    /// Recursively substitute into string leaves of a value tree;
    /// non-string leaves pass through unchanged.
    pub fn substitute_value(
        &self,
        value: Value,
        variables: &Map<String, Value>,
    ) -> Result<Value, TemplateError> {
        Ok(match value {
            Value::String(s) => Value::String(self.substitute_str(&s, variables)?),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|item| self.substitute_value(item, variables))
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| Ok((k, self.substitute_value(v, variables)?)))
                    .collect::<Result<_, TemplateError>>()?,
            ),
            other => other,
        })
    }

    pub fn template_engine(&self) -> &TemplateEngine {
        &self.engine
    }
}

/// Parse `.env` content: KEY=value lines, `#` comments, quotes stripped
fn parse_env_format(content: &str) -> Map<String, Value> {
    let mut variables = BTreeMap::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches(|c| c == '"' || c == '\'');
            variables.insert(key.trim().to_string(), Value::String(value.to_string()));
        }
    }
    variables.into_iter().collect()
}

/// Values that look like JSON arrays/objects are parsed as such;
/// everything else stays a string.
fn guess_json(value: String) -> Value {
    if value.starts_with('[') || value.starts_with('{') {
        serde_json::from_str(&value).unwrap_or(Value::String(value))
    } else {
        Value::String(value)
    }
}

/// Convert a TOML value into the JSON value model used for variables
pub(crate) fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Value::from(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

#[cfg(test)]
#[path = "variables_tests.rs"]
mod tests;
