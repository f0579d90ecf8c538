// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Playbook Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pb-core: domain model, ports, and plugin contract for the playbook engine

pub mod clock;
pub mod model;
pub mod plugin;
pub mod ports;
pub mod value;

pub use clock::{Clock, FixedClock, SystemClock};
pub use model::{
    ModelError, Node, NodeExecution, NodeKind, NodeStatus, RunInfo, Runbook, RunStatus, Trigger,
};
pub use plugin::{
    FunctionSignature, ParamType, ParameterDef, Plugin, PluginError, PluginMetadata,
    PluginRegistry, ReturnDef,
};
pub use ports::{
    CommandOutput, IoHandler, NodeExecutionRepository, ProcessError, ProcessRunner, RunRepository,
    StorageError,
};
pub use value::{ConstraintError, VarType, VariableDefinition};
