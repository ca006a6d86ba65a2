//! Prelude module for convenient imports
//!
//! Re-exports the types needed to describe, run and package a project.
//!
//! # Example
//!
//! ```rust,no_run
//! use nagare::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let json = std::fs::read_to_string("path/to/project.json")?;
//! let project: Project = serde_json::from_str(&json)?;
//!
//! let mut runtime = Runtime::builder(project)
//!     .config(RuntimeConfig::from_env())
//!     .build()?;
//! runtime.start()?;
//! runtime.run_until_idle();
//!
//! println!("Status: {:?}", runtime.status());
//! # Ok(())
//! # }
//! ```

// Project model
pub use crate::components::{CompareOperator, ComponentKind, Execution, SwitchTest};
pub use crate::flow::{
    ComponentDefinition, FlowDefinition, IntoProject, PinSpec, Project, VariableDefinition,
    WireDefinition,
};

// Runtime
pub use crate::config::RuntimeConfig;
pub use crate::runtime::{
    Clock, FlowStateId, FlowStatus, ManualClock, MemoryHost, RunningState, Runtime, RuntimeHost,
    RuntimeStats, RuntimeStatus, SystemClock,
};

// Expressions
pub use crate::ast::{Expression, Value, ValueType};
pub use crate::evaluator::{Evaluator, ExpressionEvaluator};

// Packaging
pub use crate::bytecode::CompiledProject;

// Error types
pub use crate::error::{BuildError, ExecutionError, FlowError, ValidationError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
