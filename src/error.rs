use crate::ast::Value;
use thiserror::Error;

/// Errors that can occur while parsing or evaluating an expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Failed to parse expression '{expression}' at position {position}: {message}")]
    Parse {
        expression: String,
        position: usize,
        message: String,
    },

    #[error("Variable '{0}' is not declared in the current data context")]
    UndeclaredVariable(String),

    #[error(
        "Type mismatch during operation '{operation}': expected {expected}, but found value '{found}'"
    )]
    TypeMismatch {
        operation: String,
        expected: String,
        found: Value,
    },

    #[error("Expression '{0}' is not assignable")]
    NotAssignable(String),

    #[error("Index {index} is out of bounds for an array of length {length}")]
    IndexOutOfBounds { index: i64, length: usize },
}

/// Errors reported while checking a project's structure before it is run or built.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Flow '{0}' is declared more than once")]
    DuplicateFlow(String),

    #[error("Flow '{flow}' has no component '{component}', which is referenced by a wire")]
    ComponentNotFound { flow: String, component: String },

    #[error("Component '{component}' in flow '{flow}' has no {direction} pin named '{pin}'")]
    PinNotFound {
        flow: String,
        component: String,
        direction: &'static str,
        pin: String,
    },

    #[error(
        "Wire '{source_pin}' -> '{target_pin}' in flow '{flow}' connects incompatible types {source_type} and {target_type}"
    )]
    IncompatibleWire {
        flow: String,
        source_pin: String,
        target_pin: String,
        source_type: String,
        target_type: String,
    },

    #[error("Call component '{component}' in flow '{flow}' refers to unknown flow '{callee}'")]
    UnknownCallee {
        flow: String,
        component: String,
        callee: String,
    },

    #[error(
        "Loop component '{component}' in flow '{flow}' never reaches its own 'next' input from '@seqout'"
    )]
    UnclosedLoop { flow: String, component: String },

    #[error("Entry flow '{0}' does not exist")]
    UnknownEntryFlow(String),
}

/// Errors that can occur while building the binary representation of a project.
#[derive(Error, Debug, Clone)]
pub enum BuildError {
    #[error("Component '{component}' of kind '{kind}' has no binary representation")]
    Unsupported {
        component: String,
        kind: &'static str,
    },

    #[error("Expression '{expression}' in component '{component}' could not be compiled: {source}")]
    Expression {
        component: String,
        expression: String,
        source: EvaluationError,
    },

    #[error("Value {value} does not fit in a {width} field of component '{component}'")]
    Overflow {
        component: String,
        width: &'static str,
        value: i64,
    },

    #[error("Unexpected end of buffer while reading {0}")]
    UnexpectedEof(&'static str),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Artifact error: {0}")]
    Generic(String),
}

/// Failure of a single component execution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    /// Soft failure: the component is aborted but its flow state keeps running.
    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    /// Raised explicitly by the flow.
    #[error("{0}")]
    Raised(String),

    /// A resource the component depends on is missing.
    #[error("{0}")]
    Resource(String),
}

impl ExecutionError {
    /// Hard failures unwind the flow-state stack until caught.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, ExecutionError::Evaluation(_))
    }
}

/// Errors returned by the runtime's public API.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("Flow state #{0} does not exist or has already been disposed")]
    UnknownFlowState(usize),

    #[error("Flow state #{flow_state} has no component with index {component}")]
    UnknownComponent { flow_state: usize, component: usize },

    #[error("Component '{component}' has no output named '{output}'")]
    UnknownOutput { component: String, output: String },

    #[error("The runtime has not been started")]
    NotStarted,

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

/// Errors raised by the worker bridge.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("The engine has not been initialized")]
    NotInitialized,

    #[error("Engine failure: {0}")]
    Engine(String),
}

/// Errors that can occur when converting a custom user format into a `Project`.
#[derive(Error, Debug, Clone)]
pub enum ConversionError {
    #[error("Invalid custom data: {0}")]
    ValidationError(String),

    #[error("Unknown component type '{type_name}' for component '{component}'")]
    UnknownComponentType { component: String, type_name: String },
}
