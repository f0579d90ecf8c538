// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

//! Typed variable definitions and the shared coercion rules

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Declared type of a workflow variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VarType {
    String,
    Int,
    Float,
    Bool,
    List,
}

impl Default for VarType {
    fn default() -> Self {
        VarType::String
    }
}

impl std::fmt::Display for VarType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            VarType::String => "string",
            VarType::Int => "int",
            VarType::Float => "float",
            VarType::Bool => "bool",
            VarType::List => "list",
        };
        f.write_str(name)
    }
}

impl VarType {
    /// Whether a JSON value already has this type
    fn matches(self, value: &Value) -> bool {
        match self {
            VarType::String => value.is_string(),
            VarType::Int => value.is_i64() || value.is_u64(),
            VarType::Float => value.is_number(),
            VarType::Bool => value.is_boolean(),
            VarType::List => value.is_array(),
        }
    }
}

/// Constraint and coercion failures for a single variable value
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConstraintError {
    #[error("expected {expected}, got {found}")]
    Type { expected: VarType, found: String },
    #[error("value '{value}' not in allowed choices: [{choices}]")]
    Choices { value: String, choices: String },
    #[error("value {value} is below minimum {min}")]
    BelowMin { value: f64, min: f64 },
    #[error("value {value} is above maximum {max}")]
    AboveMax { value: f64, max: f64 },
    #[error("value '{value}' does not match pattern '{pattern}'")]
    Pattern { value: String, pattern: String },
    #[error("invalid pattern '{pattern}': {message}")]
    BadPattern { pattern: String, message: String },
}

/// Definition of a workflow variable from the `[variables]` table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VariableDefinition {
    pub default: Option<Value>,
    pub required: bool,
    #[serde(rename = "type")]
    pub var_type: VarType,
    pub choices: Option<Vec<Value>>,
    pub description: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub pattern: Option<String>,
}

/// Definition-level invariant failures
#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("choice '{choice}' does not match type {var_type}")]
    ChoiceType { choice: String, var_type: VarType },
    #[error("min/max can only be used with int or float types")]
    MinMaxNonNumeric,
    #[error("pattern can only be used with string type")]
    PatternNonString,
}

impl VariableDefinition {
    /// A definition carrying only a default value (bare scalar form)
    pub fn bare_default(value: Value) -> Self {
        Self {
            default: Some(value),
            ..Self::default()
        }
    }

    /// Check definition-level invariants: choices elements match the
    /// declared type, min/max only on numeric types, pattern only on
    /// strings.
    pub fn check(&self) -> Result<(), DefinitionError> {
        if let Some(choices) = &self.choices {
            for choice in choices {
                let ok = match self.var_type {
                    // int choices must be integers, float accepts both
                    VarType::Float => choice.is_number(),
                    other => other.matches(choice),
                };
                if !ok {
                    return Err(DefinitionError::ChoiceType {
                        choice: choice.to_string(),
                        var_type: self.var_type,
                    });
                }
            }
        }
        if (self.min.is_some() || self.max.is_some())
            && !matches!(self.var_type, VarType::Int | VarType::Float)
        {
            return Err(DefinitionError::MinMaxNonNumeric);
        }
        if self.pattern.is_some() && self.var_type != VarType::String {
            return Err(DefinitionError::PatternNonString);
        }
        Ok(())
    }

    /// Coerce a value to this definition's type, then validate its
    /// constraints. Returns the coerced value.
    pub fn coerce_and_validate(&self, value: Value) -> Result<Value, ConstraintError> {
        let coerced = coerce(value, self.var_type)?;
        self.check_constraints(&coerced)?;
        Ok(coerced)
    }

    fn check_constraints(&self, value: &Value) -> Result<(), ConstraintError> {
        if let Some(choices) = &self.choices {
            if !choices.iter().any(|c| values_equal(c, value)) {
                return Err(ConstraintError::Choices {
                    value: display_value(value),
                    choices: choices
                        .iter()
                        .map(display_value)
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
        }

        if matches!(self.var_type, VarType::Int | VarType::Float) {
            if let Some(n) = value.as_f64() {
                if let Some(min) = self.min {
                    if n < min {
                        return Err(ConstraintError::BelowMin { value: n, min });
                    }
                }
                if let Some(max) = self.max {
                    if n > max {
                        return Err(ConstraintError::AboveMax { value: n, max });
                    }
                }
            }
        }

        if self.var_type == VarType::String {
            if let (Some(pattern), Some(s)) = (&self.pattern, value.as_str()) {
                let re = anchored(pattern).map_err(|e| ConstraintError::BadPattern {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                if !re.is_match(s) {
                    return Err(ConstraintError::Pattern {
                        value: s.to_string(),
                        pattern: pattern.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Patterns match the whole value
fn anchored(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{pattern})$"))
}

/// Coerce a value to the declared type.
///
/// String inputs are converted: strict decimal parse for int (booleans
/// are never ints), int-or-float literals for float, the usual
/// true/1/yes/on and false/0/no/off spellings for bool, JSON for lists.
/// Non-string inputs must already match, except float accepting ints
/// and string accepting anything (stringified).
pub fn coerce(value: Value, var_type: VarType) -> Result<Value, ConstraintError> {
    let type_error = |value: &Value| ConstraintError::Type {
        expected: var_type,
        found: type_name(value).to_string(),
    };

    match var_type {
        VarType::String => Ok(match value {
            Value::String(s) => Value::String(s),
            other => Value::String(display_value(&other)),
        }),
        VarType::Int => match &value {
            Value::Bool(_) => Err(type_error(&value)),
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| type_error(&value)),
            _ => Err(type_error(&value)),
        },
        VarType::Float => match &value {
            Value::Bool(_) => Err(type_error(&value)),
            Value::Number(_) => Ok(value),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .map(Value::from)
                .map_err(|_| type_error(&value)),
            _ => Err(type_error(&value)),
        },
        VarType::Bool => match &value {
            Value::Bool(_) => Ok(value),
            Value::String(s) => {
                parse_bool_str(s).map(Value::Bool).ok_or_else(|| type_error(&value))
            }
            _ => Err(type_error(&value)),
        },
        VarType::List => match &value {
            Value::Array(_) => Ok(value),
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(Value::Array(items)) => Ok(Value::Array(items)),
                _ => Err(type_error(&value)),
            },
            _ => Err(type_error(&value)),
        },
    }
}

/// Parse the boolean spellings shared by variables, plugin parameters,
/// and `when` results: true/1/yes/on and false/0/no/off, case-insensitive.
pub fn parse_bool_str(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Value rendered for error messages: bare strings, JSON for the rest
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// Numeric-aware equality so `choices = [1, 2]` accepts a coerced 1.0
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;
