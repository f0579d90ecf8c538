// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

//! Plugin contract and registry for Function nodes.
//!
//! A plugin exposes named functions with typed signatures. Before
//! dispatch, parameters are checked for presence, coerced from strings
//! using the same rules as workflow variables, and validated against
//! choices, numeric ranges, and patterns. The registry caches exactly
//! one initialized instance per plugin name.

use crate::value::{display_value, parse_bool_str};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Parameter and return types for plugin functions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Str,
    Int,
    Float,
    Bool,
    List,
    Dict,
}

impl Default for ParamType {
    fn default() -> Self {
        ParamType::Str
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ParamType::Str => "str",
            ParamType::Int => "int",
            ParamType::Float => "float",
            ParamType::Bool => "bool",
            ParamType::List => "list",
            ParamType::Dict => "dict",
        };
        f.write_str(name)
    }
}

/// Definition of one function parameter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParameterDef {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub required: bool,
    pub description: Option<String>,
    pub default: Option<Value>,
    pub choices: Option<Vec<Value>>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    pub pattern: Option<String>,
}

/// Definition of a function's return value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReturnDef {
    #[serde(rename = "type")]
    pub return_type: ParamType,
    pub description: Option<String>,
}

/// Signature of one plugin function
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionSignature {
    pub description: String,
    pub parameters: HashMap<String, ParameterDef>,
    pub returns: ReturnDef,
}

/// Plugin self-description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginMetadata {
    pub name: String,
    pub version: String,
    pub author: String,
    pub description: String,
    #[serde(default)]
    pub functions: HashMap<String, FunctionSignature>,
}

/// Registry and dispatch errors
#[derive(Debug, Error)]
pub enum PluginError {
    #[error("plugin '{0}' not found")]
    NotFound(String),
    #[error("failed to initialize plugin '{plugin}': {message}")]
    Initialization { plugin: String, message: String },
    #[error("plugin '{plugin}' function '{function}' failed: {message}")]
    Execution {
        plugin: String,
        function: String,
        message: String,
    },
    #[error("function '{function}' not found in plugin '{plugin}'")]
    FunctionNotFound { plugin: String, function: String },
    #[error("parameter '{param}' of function '{function}': {message}")]
    Parameter {
        function: String,
        param: String,
        message: String,
    },
}

/// An externally-registered provider of named functions
pub trait Plugin: Send {
    fn metadata(&self) -> PluginMetadata;

    /// Initialize with merged configuration before first use
    fn initialize(&mut self, config: &Map<String, Value>) -> Result<(), PluginError>;

    /// Execute a function with validated, coerced parameters
    fn execute(&mut self, function: &str, params: &Map<String, Value>)
        -> Result<Value, PluginError>;

    /// Release any held resources
    fn cleanup(&mut self);
}

/// Validate and coerce parameters against a function signature.
///
/// Checks required keys, rejects unknown names, coerces string inputs
/// to the declared type, applies defaults, and validates choices,
/// ranges, and patterns. Failures raise before the plugin runs.
pub fn validate_params(
    metadata: &PluginMetadata,
    function: &str,
    params: &Map<String, Value>,
) -> Result<Map<String, Value>, PluginError> {
    let signature =
        metadata
            .functions
            .get(function)
            .ok_or_else(|| PluginError::FunctionNotFound {
                plugin: metadata.name.clone(),
                function: function.to_string(),
            })?;

    let param_error = |param: &str, message: String| PluginError::Parameter {
        function: function.to_string(),
        param: param.to_string(),
        message,
    };

    for (name, def) in &signature.parameters {
        if def.required && !params.contains_key(name) {
            return Err(param_error(name, "required parameter missing".to_string()));
        }
    }

    let mut validated = Map::new();
    for (name, value) in params {
        let def = signature
            .parameters
            .get(name)
            .ok_or_else(|| param_error(name, "unknown parameter".to_string()))?;
        let coerced = coerce_param(value.clone(), def.param_type)
            .map_err(|message| param_error(name, message))?;
        check_param_constraints(&coerced, def).map_err(|message| param_error(name, message))?;
        validated.insert(name.clone(), coerced);
    }

    // Fill defaults for optional parameters that were not supplied
    for (name, def) in &signature.parameters {
        if !validated.contains_key(name) {
            if let Some(default) = &def.default {
                validated.insert(name.clone(), default.clone());
            }
        }
    }

    Ok(validated)
}

fn coerce_param(value: Value, ty: ParamType) -> Result<Value, String> {
    let mismatch = |value: &Value| format!("cannot convert '{}' to {ty}", display_value(value));

    let already_matches = match ty {
        ParamType::Str => value.is_string(),
        ParamType::Int => value.is_i64() || value.is_u64(),
        ParamType::Float => value.is_number(),
        ParamType::Bool => value.is_boolean(),
        ParamType::List => value.is_array(),
        ParamType::Dict => value.is_object(),
    };
    if already_matches {
        return Ok(value);
    }

    let Value::String(s) = &value else {
        return Err(mismatch(&value));
    };

    match ty {
        ParamType::Str => Ok(value),
        ParamType::Int => s.trim().parse::<i64>().map(Value::from).map_err(|_| mismatch(&value)),
        ParamType::Float => s
            .trim()
            .parse::<f64>()
            .map(Value::from)
            .map_err(|_| mismatch(&value)),
        ParamType::Bool => parse_bool_str(s).map(Value::Bool).ok_or_else(|| mismatch(&value)),
        ParamType::List => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => Ok(Value::Array(items)),
            _ => Err(mismatch(&value)),
        },
        ParamType::Dict => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Ok(Value::Object(map)),
            _ => Err(mismatch(&value)),
        },
    }
}

fn check_param_constraints(value: &Value, def: &ParameterDef) -> Result<(), String> {
    if let Some(choices) = &def.choices {
        if !choices.contains(value) {
            return Err(format!(
                "'{}' not in allowed choices: [{}]",
                display_value(value),
                choices.iter().map(display_value).collect::<Vec<_>>().join(", ")
            ));
        }
    }

    if matches!(def.param_type, ParamType::Int | ParamType::Float) {
        if let Some(n) = value.as_f64() {
            if let Some(min) = def.min_value {
                if n < min {
                    return Err(format!("{n} is below minimum {min}"));
                }
            }
            if let Some(max) = def.max_value {
                if n > max {
                    return Err(format!("{n} is above maximum {max}"));
                }
            }
        }
    }

    if def.param_type == ParamType::Str {
        if let (Some(pattern), Some(s)) = (&def.pattern, value.as_str()) {
            let re = Regex::new(&format!("^(?:{pattern})$"))
                .map_err(|e| format!("invalid pattern '{pattern}': {e}"))?;
            if !re.is_match(s) {
                return Err(format!("'{s}' does not match pattern '{pattern}'"));
            }
        }
    }

    Ok(())
}

/// Factory producing fresh plugin instances
pub type PluginFactory = Box<dyn Fn() -> Box<dyn Plugin> + Send + Sync>;

/// A shared, initialized plugin instance
pub type SharedPlugin = Arc<Mutex<Box<dyn Plugin>>>;

/// Maps plugin names to factories and caches initialized instances.
///
/// Registries are plain values: construct one at startup, register
/// factories, hand it to the engine. Tests build their own.
#[derive(Default)]
pub struct PluginRegistry {
    factories: HashMap<String, PluginFactory>,
    global_config: HashMap<String, Map<String, Value>>,
    instances: Mutex<HashMap<String, SharedPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin factory under a name
    pub fn register(
        &mut self,
        name: impl Into<String>,
        factory: impl Fn() -> Box<dyn Plugin> + Send + Sync + 'static,
    ) {
        let name = name.into();
        tracing::debug!(plugin = %name, "registered plugin");
        self.factories.insert(name, Box::new(factory));
    }

    /// Set the globally-supplied configuration for a plugin
    pub fn set_config(&mut self, name: impl Into<String>, config: Map<String, Value>) {
        self.global_config.insert(name.into(), config);
    }

    /// Registered plugin names
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Metadata for a plugin without initializing it
    pub fn metadata(&self, name: &str) -> Result<PluginMetadata, PluginError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| PluginError::NotFound(name.to_string()))?;
        Ok(factory().metadata())
    }

    /// Get the cached instance for a plugin, initializing it on first
    /// use with `overrides` laid over the plugin's global configuration.
    pub fn get(
        &self,
        name: &str,
        overrides: &Map<String, Value>,
    ) -> Result<SharedPlugin, PluginError> {
        let mut instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(instance) = instances.get(name) {
            return Ok(Arc::clone(instance));
        }

        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| PluginError::NotFound(name.to_string()))?;

        let mut config = self.global_config.get(name).cloned().unwrap_or_default();
        for (key, value) in overrides {
            config.insert(key.clone(), value.clone());
        }

        let mut plugin = factory();
        plugin
            .initialize(&config)
            .map_err(|e| PluginError::Initialization {
                plugin: name.to_string(),
                message: e.to_string(),
            })?;
        tracing::debug!(plugin = name, "initialized plugin");

        let shared: SharedPlugin = Arc::new(Mutex::new(plugin));
        instances.insert(name.to_string(), Arc::clone(&shared));
        Ok(shared)
    }

    /// Tear down every cached instance
    pub fn cleanup_all(&self) {
        let mut instances = self.instances.lock().unwrap_or_else(|e| e.into_inner());
        for (name, instance) in instances.drain() {
            let mut plugin = instance.lock().unwrap_or_else(|e| e.into_inner());
            plugin.cleanup();
            tracing::debug!(plugin = %name, "cleaned up plugin");
        }
    }
}

#[cfg(test)]
#[path = "plugin_tests.rs"]
mod tests;
