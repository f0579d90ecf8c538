// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

use super::*;
use serde_json::json;

#[test]
fn int_coercion_is_strict() {
    assert_eq!(coerce(json!("42"), VarType::Int).unwrap(), json!(42));
    assert_eq!(coerce(json!(7), VarType::Int).unwrap(), json!(7));
    assert!(coerce(json!("4.2"), VarType::Int).is_err());
    assert!(coerce(json!("abc"), VarType::Int).is_err());
    // booleans are not ints
    assert!(coerce(json!(true), VarType::Int).is_err());
}

#[test]
fn float_accepts_int_and_float_literals() {
    assert_eq!(coerce(json!("3.5"), VarType::Float).unwrap(), json!(3.5));
    assert_eq!(coerce(json!("2"), VarType::Float).unwrap(), json!(2.0));
    assert_eq!(coerce(json!(2), VarType::Float).unwrap(), json!(2));
    assert!(coerce(json!("nope"), VarType::Float).is_err());
}

#[test]
fn bool_spellings() {
    for s in ["true", "1", "yes", "ON"] {
        assert_eq!(coerce(json!(s), VarType::Bool).unwrap(), json!(true));
    }
    for s in ["false", "0", "no", "Off"] {
        assert_eq!(coerce(json!(s), VarType::Bool).unwrap(), json!(false));
    }
    assert!(coerce(json!("maybe"), VarType::Bool).is_err());
}

#[test]
fn list_requires_list_or_json_string() {
    assert_eq!(
        coerce(json!("[1, 2, 3]"), VarType::List).unwrap(),
        json!([1, 2, 3])
    );
    assert_eq!(coerce(json!([1]), VarType::List).unwrap(), json!([1]));
    assert!(coerce(json!("not json"), VarType::List).is_err());
    assert!(coerce(json!("{\"a\": 1}"), VarType::List).is_err());
    assert!(coerce(json!(3), VarType::List).is_err());
}

#[test]
fn string_stringifies_anything() {
    assert_eq!(coerce(json!(5), VarType::String).unwrap(), json!("5"));
    assert_eq!(coerce(json!(true), VarType::String).unwrap(), json!("true"));
    assert_eq!(coerce(json!("x"), VarType::String).unwrap(), json!("x"));
}

#[test]
fn choices_constraint() {
    let def = VariableDefinition {
        var_type: VarType::String,
        choices: Some(vec![json!("dev"), json!("prod")]),
        ..Default::default()
    };
    assert!(def.coerce_and_validate(json!("dev")).is_ok());
    let err = def.coerce_and_validate(json!("staging")).unwrap_err();
    assert!(matches!(err, ConstraintError::Choices { .. }));
}

#[test]
fn numeric_range_constraints() {
    let def = VariableDefinition {
        var_type: VarType::Int,
        min: Some(1.0),
        max: Some(10.0),
        ..Default::default()
    };
    assert_eq!(def.coerce_and_validate(json!("5")).unwrap(), json!(5));
    assert!(matches!(
        def.coerce_and_validate(json!(0)).unwrap_err(),
        ConstraintError::BelowMin { .. }
    ));
    assert!(matches!(
        def.coerce_and_validate(json!(11)).unwrap_err(),
        ConstraintError::AboveMax { .. }
    ));
}

#[test]
fn pattern_is_anchored() {
    let def = VariableDefinition {
        var_type: VarType::String,
        pattern: Some("v[0-9]+".to_string()),
        ..Default::default()
    };
    assert!(def.coerce_and_validate(json!("v12")).is_ok());
    // partial matches do not count
    assert!(def.coerce_and_validate(json!("xv12y")).is_err());
}

#[test]
fn definition_invariants() {
    let bad_choices = VariableDefinition {
        var_type: VarType::Int,
        choices: Some(vec![json!("not-an-int")]),
        ..Default::default()
    };
    assert!(bad_choices.check().is_err());

    let min_on_string = VariableDefinition {
        var_type: VarType::String,
        min: Some(0.0),
        ..Default::default()
    };
    assert!(min_on_string.check().is_err());

    let float_choices_accept_ints = VariableDefinition {
        var_type: VarType::Float,
        choices: Some(vec![json!(1), json!(2.5)]),
        ..Default::default()
    };
    assert!(float_choices_accept_ints.check().is_ok());
}

#[test]
fn unknown_definition_fields_are_rejected() {
    let err = serde_json::from_value::<VariableDefinition>(json!({
        "default": "x",
        "bogus": true,
    }));
    assert!(err.is_err());
}
