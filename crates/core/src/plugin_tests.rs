// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

use super::*;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Test plugin exposing a greet(name, count) function
struct GreeterPlugin {
    initialized_with: Option<Map<String, Value>>,
}

impl GreeterPlugin {
    fn new() -> Self {
        Self {
            initialized_with: None,
        }
    }
}

impl Plugin for GreeterPlugin {
    fn metadata(&self) -> PluginMetadata {
        let mut parameters = HashMap::new();
        parameters.insert(
            "name".to_string(),
            ParameterDef {
                param_type: ParamType::Str,
                required: true,
                pattern: Some("[a-z]+".to_string()),
                ..Default::default()
            },
        );
        parameters.insert(
            "count".to_string(),
            ParameterDef {
                param_type: ParamType::Int,
                required: false,
                default: Some(json!(1)),
                min_value: Some(1.0),
                max_value: Some(5.0),
                ..Default::default()
            },
        );

        let mut functions = HashMap::new();
        functions.insert(
            "greet".to_string(),
            FunctionSignature {
                description: "greet someone".to_string(),
                parameters,
                returns: ReturnDef::default(),
            },
        );

        PluginMetadata {
            name: "greeter".to_string(),
            version: "1.0.0".to_string(),
            author: "tests".to_string(),
            description: "greets people".to_string(),
            functions,
        }
    }

    fn initialize(&mut self, config: &Map<String, Value>) -> Result<(), PluginError> {
        self.initialized_with = Some(config.clone());
        Ok(())
    }

    fn execute(
        &mut self,
        function: &str,
        params: &Map<String, Value>,
    ) -> Result<Value, PluginError> {
        match function {
            "greet" => {
                let name = params.get("name").and_then(Value::as_str).unwrap_or("?");
                let count = params.get("count").and_then(Value::as_i64).unwrap_or(1);
                Ok(json!(format!("hello {name} x{count}")))
            }
            "config" => Ok(Value::Object(
                self.initialized_with.clone().unwrap_or_default(),
            )),
            other => Err(PluginError::FunctionNotFound {
                plugin: "greeter".to_string(),
                function: other.to_string(),
            }),
        }
    }

    fn cleanup(&mut self) {}
}

fn registry_with_greeter() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry.register("greeter", || Box::new(GreeterPlugin::new()));
    registry
}

fn greeter_metadata() -> PluginMetadata {
    GreeterPlugin::new().metadata()
}

#[test]
fn validate_params_coerces_strings() {
    let metadata = greeter_metadata();
    let mut params = Map::new();
    params.insert("name".to_string(), json!("world"));
    params.insert("count".to_string(), json!("3"));

    let validated = validate_params(&metadata, "greet", &params).unwrap();
    assert_eq!(validated["count"], json!(3));
}

#[test]
fn validate_params_applies_defaults() {
    let metadata = greeter_metadata();
    let mut params = Map::new();
    params.insert("name".to_string(), json!("world"));

    let validated = validate_params(&metadata, "greet", &params).unwrap();
    assert_eq!(validated["count"], json!(1));
}

#[test]
fn validate_params_rejects_missing_required() {
    let metadata = greeter_metadata();
    let err = validate_params(&metadata, "greet", &Map::new()).unwrap_err();
    assert!(matches!(err, PluginError::Parameter { param, .. } if param == "name"));
}

#[test]
fn validate_params_rejects_unknown_names() {
    let metadata = greeter_metadata();
    let mut params = Map::new();
    params.insert("name".to_string(), json!("world"));
    params.insert("volume".to_string(), json!(11));
    let err = validate_params(&metadata, "greet", &params).unwrap_err();
    assert!(matches!(err, PluginError::Parameter { param, .. } if param == "volume"));
}

#[test]
fn validate_params_checks_range_and_pattern() {
    let metadata = greeter_metadata();

    let mut params = Map::new();
    params.insert("name".to_string(), json!("world"));
    params.insert("count".to_string(), json!(9));
    assert!(validate_params(&metadata, "greet", &params).is_err());

    let mut params = Map::new();
    params.insert("name".to_string(), json!("WORLD"));
    assert!(validate_params(&metadata, "greet", &params).is_err());
}

#[test]
fn validate_params_unknown_function() {
    let metadata = greeter_metadata();
    let err = validate_params(&metadata, "shout", &Map::new()).unwrap_err();
    assert!(matches!(err, PluginError::FunctionNotFound { .. }));
}

#[test]
fn registry_caches_one_instance_per_name() {
    static BUILT: AtomicUsize = AtomicUsize::new(0);

    let mut registry = PluginRegistry::new();
    registry.register("greeter", || {
        BUILT.fetch_add(1, Ordering::SeqCst);
        Box::new(GreeterPlugin::new())
    });

    let first = registry.get("greeter", &Map::new()).unwrap();
    let second = registry.get("greeter", &Map::new()).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(BUILT.load(Ordering::SeqCst), 1);
}

#[test]
fn registry_merges_overrides_over_global_config() {
    let mut registry = registry_with_greeter();
    let mut global = Map::new();
    global.insert("token".to_string(), json!("global"));
    global.insert("channel".to_string(), json!("#ops"));
    registry.set_config("greeter", global);

    let mut overrides = Map::new();
    overrides.insert("token".to_string(), json!("node-level"));

    let instance = registry.get("greeter", &overrides).unwrap();
    let mut plugin = instance.lock().unwrap();
    let config = plugin.execute("config", &Map::new()).unwrap();
    assert_eq!(config["token"], json!("node-level"));
    assert_eq!(config["channel"], json!("#ops"));
}

#[test]
fn registry_unknown_plugin() {
    let registry = PluginRegistry::new();
    let err = match registry.get("missing", &Map::new()) {
        Err(e) => e,
        Ok(_) => panic!("expected error"),
    };
    assert!(matches!(err, PluginError::NotFound(name) if name == "missing"));
}

#[test]
fn registries_are_independent() {
    let a = registry_with_greeter();
    let b = PluginRegistry::new();
    assert_eq!(a.list(), vec!["greeter".to_string()]);
    assert!(b.list().is_empty());
}
