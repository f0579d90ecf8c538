// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

//! Error-to-exit-code mapping: 0 run OK, 1 parse/validation/execution,
//! 2 configuration or variables, 3 persistence

use pb_core::ports::StorageError;
use pb_engine::EngineError;
use pb_runbook::{ParseError, VariableError};

pub fn exit_code(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<VariableError>().is_some() {
        return 2;
    }
    if error.downcast_ref::<StorageError>().is_some() {
        return 3;
    }
    if let Some(e) = error.downcast_ref::<EngineError>() {
        return match e {
            EngineError::Storage(_) => 3,
            _ => 1,
        };
    }
    if let Some(e) = error.downcast_ref::<ParseError>() {
        return match e {
            ParseError::Variables(_) => 2,
            _ => 1,
        };
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_map_to_three() {
        let err = anyhow::Error::new(StorageError::NotFound {
            kind: "runs".to_string(),
            id: "1".to_string(),
        });
        assert_eq!(exit_code(&err), 3);
    }

    #[test]
    fn variable_errors_map_to_two() {
        let err = anyhow::Error::new(VariableError::MissingRequired(vec!["token".to_string()]));
        assert_eq!(exit_code(&err), 2);

        let err = anyhow::Error::new(ParseError::Variables(VariableError::Validation(vec![
            "variable 'x': expected int, got bool".to_string(),
        ])));
        assert_eq!(exit_code(&err), 2);
    }

    #[test]
    fn parse_errors_map_to_one() {
        let err = anyhow::Error::new(ParseError::MissingRunbookSection);
        assert_eq!(exit_code(&err), 1);
    }
}
