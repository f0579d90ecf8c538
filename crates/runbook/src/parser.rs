// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

//! Two-pass runbook TOML parser.
//!
//! Pass 1 extracts the `[variables]` table, merges caller-supplied
//! values over the defaults, and validates them. Pass 2 renders the
//! source text with those variables (protecting `when` lines, which
//! evaluate at run time), re-parses the TOML, and constructs nodes in
//! declaration order with `depends_on` resolution and conditional
//! dependency folding.

use crate::conditions::{combine_when, fold_dependencies};
use crate::variables::{toml_to_json, VariableError, VariableManager};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use indexmap::IndexMap;
use pb_core::model::{
    ModelError, Node, NodeKind, Runbook, DEFAULT_MANUAL_PROMPT, DEFAULT_TIMEOUT_SECS, DEFAULT_WHEN,
};
use pb_core::value::VariableDefinition;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

/// Conventional extension for runbook source files
pub const RUNBOOK_EXTENSION: &str = ".playbook.toml";

/// Required fields of the `[runbook]` metadata table
const METADATA_FIELDS: [&str; 5] = ["title", "description", "version", "author", "created_at"];

// Lines holding `when` expressions are extracted before substitution
// and restored afterwards; `when` renders at execution time.
#[allow(clippy::expect_used)]
static WHEN_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*when[ \t]*=.*$").expect("constant regex pattern is valid")
});

/// Errors that can occur during runbook parsing
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("runbook file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("runbook file must have a .playbook.toml extension: {0}")]
    WrongExtension(PathBuf),
    #[error("cannot read {path}: {message}")]
    Io { path: PathBuf, message: String },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML parse error after template rendering: {0}")]
    TomlAfterRender(toml::de::Error),
    #[error("missing required [runbook] section")]
    MissingRunbookSection,
    #[error("missing required field in [runbook]: {0}")]
    MissingMetadata(&'static str),
    #[error("invalid created_at timestamp '{0}'")]
    InvalidTimestamp(String),
    #[error("node '{node}' must be a table")]
    NodeNotTable { node: String },
    #[error("missing required field 'type' in node '{0}'")]
    MissingNodeType(String),
    #[error("unknown node type '{node_type}' for node '{node}'")]
    UnknownNodeType { node: String, node_type: String },
    #[error("invalid node '{node}': {message}")]
    InvalidNode { node: String, message: String },
    #[error("invalid depends_on for node '{node}': {message}")]
    InvalidDependency { node: String, message: String },
    #[error(transparent)]
    Variables(#[from] VariableError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Parser for runbook TOML sources with variable support
#[derive(Debug, Clone, Default)]
pub struct RunbookParser {
    variables: VariableManager,
}

impl RunbookParser {
    pub fn new() -> Self {
        Self {
            variables: VariableManager::new(),
        }
    }

    /// Parse a runbook file. `provided` carries the already-merged
    /// caller variables (CLI > file > environment); runbook defaults
    /// sit below them.
    pub fn parse_file(&self, path: &Path, provided: &Map<String, Value>) -> Result<Runbook, ParseError> {
        if !path.to_string_lossy().ends_with(RUNBOOK_EXTENSION) {
            return Err(ParseError::WrongExtension(path.to_path_buf()));
        }
        if !path.exists() {
            return Err(ParseError::FileNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| ParseError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        self.parse_str(&content, provided)
    }

    /// Parse runbook TOML from a string
    pub fn parse_str(&self, content: &str, provided: &Map<String, Value>) -> Result<Runbook, ParseError> {
        // Pass 1: variable definitions and final values
        let definitions = self.variable_definitions(content)?;
        let defaults: Map<String, Value> = definitions
            .iter()
            .filter_map(|(name, def)| def.default.clone().map(|v| (name.clone(), v)))
            .collect();

        let mut merged =
            self.variables
                .merge(provided.clone(), Map::new(), Map::new(), defaults);

        // Missing required variables are reported separately so callers
        // can prompt for them and retry
        let missing = self.variables.missing_required(&definitions, &merged);
        if !missing.is_empty() {
            return Err(VariableError::MissingRequired(missing).into());
        }
        self.variables.validate(&mut merged, &definitions)?;

        // Pass 2: render the source with `when` lines protected
        let (protected, when_lines) = protect_when_lines(content);
        let rendered = self
            .variables
            .substitute_str(&protected, &merged)
            .map_err(VariableError::Template)?;
        let restored = restore_when_lines(rendered, &when_lines);

        let mut table: toml::Table =
            toml::from_str(&restored).map_err(ParseError::TomlAfterRender)?;
        table.remove("variables");

        let metadata = table
            .remove("runbook")
            .ok_or(ParseError::MissingRunbookSection)?;
        let metadata = metadata
            .as_table()
            .ok_or(ParseError::MissingRunbookSection)?
            .clone();
        for field in METADATA_FIELDS {
            if !metadata.contains_key(field) {
                return Err(ParseError::MissingMetadata(field));
            }
        }

        let created_at = parse_timestamp(&metadata["created_at"])?;

        let mut nodes: IndexMap<String, Node> = IndexMap::new();
        let mut declared: Vec<String> = Vec::new();
        for (node_id, value) in table {
            let node = build_node(&node_id, value, &declared)?;
            declared.push(node_id.clone());
            nodes.insert(node_id, node);
        }
        tracing::debug!(nodes = nodes.len(), "parsed runbook");

        Ok(Runbook::new(
            metadata_str(&metadata, "title")?,
            metadata_str(&metadata, "description")?,
            metadata_str(&metadata, "version")?,
            metadata_str(&metadata, "author")?,
            created_at,
            nodes,
        )?)
    }

    /// Extract variable definitions without fully parsing the runbook.
    /// Table entries are full definitions; scalars are bare defaults.
    ///
    /// Sources using `{% %}` control flow may not parse as TOML before
    /// rendering; those simply have no extractable definitions.
    pub fn variable_definitions(
        &self,
        content: &str,
    ) -> Result<IndexMap<String, VariableDefinition>, ParseError> {
        let mut definitions = IndexMap::new();
        let Ok(table) = toml::from_str::<toml::Table>(content) else {
            return Ok(definitions);
        };

        let Some(variables) = table.get("variables").and_then(|v| v.as_table()) else {
            return Ok(definitions);
        };

        for (name, value) in variables {
            let definition = match value {
                toml::Value::Table(_) => {
                    let json = toml_to_json(value.clone());
                    serde_json::from_value::<VariableDefinition>(json).map_err(|e| {
                        VariableError::Definition {
                            name: name.clone(),
                            message: e.to_string(),
                        }
                    })?
                }
                scalar => VariableDefinition::bare_default(toml_to_json(scalar.clone())),
            };
            definition.check().map_err(|e| VariableError::Definition {
                name: name.clone(),
                message: e.to_string(),
            })?;
            definitions.insert(name.clone(), definition);
        }

        Ok(definitions)
    }
}

fn metadata_str(metadata: &toml::Table, field: &'static str) -> Result<String, ParseError> {
    metadata
        .get(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or(ParseError::MissingMetadata(field))
}

fn parse_timestamp(value: &toml::Value) -> Result<DateTime<Utc>, ParseError> {
    let text = match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Datetime(d) => d.to_string(),
        other => return Err(ParseError::InvalidTimestamp(other.to_string())),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(&text, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(ParseError::InvalidTimestamp(text))
}

/// Replace `when = ...` lines with opaque placeholders, returning the
/// protected text and the original lines in order
fn protect_when_lines(content: &str) -> (String, Vec<String>) {
    let mut lines = Vec::new();
    let protected = WHEN_LINE
        .replace_all(content, |caps: &regex::Captures| {
            let index = lines.len();
            lines.push(caps[0].to_string());
            format!("__PB_WHEN_LINE_{index}__")
        })
        .to_string();
    (protected, lines)
}

fn restore_when_lines(mut content: String, lines: &[String]) -> String {
    for (index, line) in lines.iter().enumerate() {
        content = content.replace(&format!("__PB_WHEN_LINE_{index}__"), line);
    }
    content
}

/// Resolve a raw `depends_on` value against the previously declared
/// nodes: missing ⇒ previous node, `"^"` ⇒ previous, `"*"` ⇒ all
/// previous, scalar ⇒ singleton, lists element-wise.
fn resolve_dependencies(
    node_id: &str,
    raw: Option<toml::Value>,
    declared: &[String],
) -> Result<(Vec<String>, Option<String>), ParseError> {
    let invalid = |message: String| ParseError::InvalidDependency {
        node: node_id.to_string(),
        message,
    };

    let mut entries: Vec<String> = Vec::new();
    match raw {
        None => entries.extend(declared.last().cloned()),
        Some(toml::Value::String(s)) => match s.as_str() {
            "^" => entries.extend(declared.last().cloned()),
            "*" => entries.extend(declared.iter().cloned()),
            _ => entries.push(s),
        },
        Some(toml::Value::Array(items)) => {
            for item in items {
                let s = item
                    .as_str()
                    .ok_or_else(|| invalid(format!("expected string entry, got {item}")))?;
                match s {
                    "^" => entries.extend(declared.last().cloned()),
                    "*" => entries.extend(declared.iter().cloned()),
                    _ => entries.push(s.to_string()),
                }
            }
        }
        Some(other) => {
            return Err(invalid(format!(
                "expected string or list of strings, got {other}"
            )))
        }
    }

    let (mut ids, clause) =
        fold_dependencies(&entries).map_err(|e| invalid(e.to_string()))?;

    // `"*"` combined with explicit entries can duplicate
    let mut seen = std::collections::HashSet::new();
    ids.retain(|id| seen.insert(id.clone()));

    Ok((ids, clause))
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawManual {
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    critical: bool,
    #[serde(default)]
    prompt_before: String,
    prompt_after: Option<String>,
    #[serde(default)]
    skip: bool,
    timeout: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCommand {
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    critical: bool,
    #[serde(default)]
    prompt_before: String,
    prompt_after: Option<String>,
    #[serde(default)]
    skip: bool,
    timeout: Option<u64>,
    command_name: String,
    #[serde(default)]
    interactive: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFunction {
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    critical: bool,
    #[serde(default)]
    prompt_before: String,
    prompt_after: Option<String>,
    #[serde(default)]
    skip: bool,
    timeout: Option<u64>,
    plugin: String,
    function: String,
    #[serde(default)]
    function_params: toml::Table,
    #[serde(default)]
    plugin_config: toml::Table,
}

fn build_node(
    node_id: &str,
    value: toml::Value,
    declared: &[String],
) -> Result<Node, ParseError> {
    let mut table = value
        .as_table()
        .cloned()
        .ok_or_else(|| ParseError::NodeNotTable {
            node: node_id.to_string(),
        })?;

    let raw_deps = table.remove("depends_on");
    let (depends_on, clause) = resolve_dependencies(node_id, raw_deps, declared)?;

    let explicit_when = match table.remove("when") {
        None => DEFAULT_WHEN.to_string(),
        Some(toml::Value::String(s)) => s,
        Some(other) => {
            return Err(ParseError::InvalidNode {
                node: node_id.to_string(),
                message: format!("'when' must be a string, got {other}"),
            })
        }
    };
    let when = combine_when(&explicit_when, clause.as_deref());

    let node_type = match table.remove("type") {
        Some(toml::Value::String(s)) => s,
        Some(other) => {
            return Err(ParseError::InvalidNode {
                node: node_id.to_string(),
                message: format!("'type' must be a string, got {other}"),
            })
        }
        None => return Err(ParseError::MissingNodeType(node_id.to_string())),
    };

    let node_error = |e: toml::de::Error| ParseError::InvalidNode {
        node: node_id.to_string(),
        message: e.to_string(),
    };
    let value = toml::Value::Table(table);

    let node = match node_type.as_str() {
        "Manual" => {
            let raw: RawManual = value.try_into().map_err(node_error)?;
            assemble_node(
                node_id,
                depends_on,
                when,
                raw.name,
                raw.description,
                raw.critical,
                raw.prompt_before,
                raw.prompt_after
                    .unwrap_or_else(|| DEFAULT_MANUAL_PROMPT.to_string()),
                raw.skip,
                raw.timeout,
                NodeKind::Manual,
            )
        }
        "Command" => {
            let raw: RawCommand = value.try_into().map_err(node_error)?;
            assemble_node(
                node_id,
                depends_on,
                when,
                raw.name,
                raw.description,
                raw.critical,
                raw.prompt_before,
                raw.prompt_after.unwrap_or_default(),
                raw.skip,
                raw.timeout,
                NodeKind::Command {
                    command: raw.command_name,
                    interactive: raw.interactive,
                },
            )
        }
        "Function" => {
            let raw: RawFunction = value.try_into().map_err(node_error)?;
            let params = table_to_map(raw.function_params);
            let plugin_config = table_to_map(raw.plugin_config);
            assemble_node(
                node_id,
                depends_on,
                when,
                raw.name,
                raw.description,
                raw.critical,
                raw.prompt_before,
                raw.prompt_after.unwrap_or_default(),
                raw.skip,
                raw.timeout,
                NodeKind::Function {
                    plugin: raw.plugin,
                    function: raw.function,
                    params,
                    plugin_config,
                },
            )
        }
        other => {
            return Err(ParseError::UnknownNodeType {
                node: node_id.to_string(),
                node_type: other.to_string(),
            })
        }
    };

    Ok(node)
}

#[allow(clippy::too_many_arguments)]
fn assemble_node(
    node_id: &str,
    depends_on: Vec<String>,
    when: String,
    name: Option<String>,
    description: Option<String>,
    critical: bool,
    prompt_before: String,
    prompt_after: String,
    skip: bool,
    timeout: Option<u64>,
    kind: NodeKind,
) -> Node {
    Node {
        id: node_id.to_string(),
        depends_on,
        critical,
        name: name.unwrap_or_else(|| node_id.to_string()),
        description,
        prompt_before,
        prompt_after,
        skip,
        when,
        timeout: timeout.unwrap_or(DEFAULT_TIMEOUT_SECS),
        kind,
    }
}

fn table_to_map(table: toml::Table) -> Map<String, Value> {
    table
        .into_iter()
        .map(|(k, v)| (k, toml_to_json(v)))
        .collect()
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
