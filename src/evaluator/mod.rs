use crate::ast::{self, Expression, Value};
use crate::error::EvaluationError;
use ahash::AHashMap;

mod engine;

use engine::AstEngine;

/// Variable bindings an expression is evaluated against.
///
/// Implementations decide the lookup order (component inputs, flow-local
/// variables, globals) and which names may be written.
pub trait EvaluationContext {
    /// Current value of a top-level name.
    fn lookup(&self, name: &str) -> Result<Value, EvaluationError>;

    /// Mutable slot for a top-level name, used as the root of an assignment.
    fn variable_mut(&mut self, name: &str) -> Result<&mut Value, EvaluationError>;
}

/// The contract components rely on: `evaluate(expression, context) -> value | error`
/// plus assignment through an assignable expression.
pub trait ExpressionEvaluator {
    fn evaluate(
        &mut self,
        source: &str,
        context: &dyn EvaluationContext,
    ) -> Result<Value, EvaluationError>;

    fn assign(
        &mut self,
        target: &str,
        value: Value,
        context: &mut dyn EvaluationContext,
    ) -> Result<(), EvaluationError>;
}

/// Tree-walking evaluator with a cache of parsed expressions.
#[derive(Debug, Default)]
pub struct Evaluator {
    cache: AHashMap<String, Expression>,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an expression, reusing the cached tree when available.
    pub fn parse(&mut self, source: &str) -> Result<&Expression, EvaluationError> {
        if !self.cache.contains_key(source) {
            let expression = ast::parse(source)?;
            self.cache.insert(source.to_string(), expression);
        }
        self.cache
            .get(source)
            .ok_or_else(|| EvaluationError::Parse {
                expression: source.to_string(),
                position: 0,
                message: "expression cache miss".to_string(),
            })
    }

    /// Evaluates an already parsed expression.
    pub fn evaluate_expression(
        expression: &Expression,
        context: &dyn EvaluationContext,
    ) -> Result<Value, EvaluationError> {
        AstEngine::new(context).evaluate(expression)
    }

    pub fn assign_expression(
        target: &Expression,
        value: Value,
        context: &mut dyn EvaluationContext,
    ) -> Result<(), EvaluationError> {
        if !target.is_assignable() {
            return Err(EvaluationError::NotAssignable(target.to_string()));
        }
        engine::assign(target, value, context)
    }
}

impl ExpressionEvaluator for Evaluator {
    fn evaluate(
        &mut self,
        source: &str,
        context: &dyn EvaluationContext,
    ) -> Result<Value, EvaluationError> {
        let expression = self.parse(source)?;
        Self::evaluate_expression(expression, context)
    }

    fn assign(
        &mut self,
        target: &str,
        value: Value,
        context: &mut dyn EvaluationContext,
    ) -> Result<(), EvaluationError> {
        let expression = self.parse(target)?;
        Self::assign_expression(expression, value, context)
    }
}

/// A plain map of variables, handy for constant folding and tests.
#[derive(Debug, Clone, Default)]
pub struct MapContext {
    pub variables: AHashMap<String, Value>,
}

impl MapContext {
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.variables.insert(name.to_string(), value.into());
        self
    }
}

impl EvaluationContext for MapContext {
    fn lookup(&self, name: &str) -> Result<Value, EvaluationError> {
        self.variables
            .get(name)
            .cloned()
            .ok_or_else(|| EvaluationError::UndeclaredVariable(name.to_string()))
    }

    fn variable_mut(&mut self, name: &str) -> Result<&mut Value, EvaluationError> {
        self.variables
            .get_mut(name)
            .ok_or_else(|| EvaluationError::UndeclaredVariable(name.to_string()))
    }
}
