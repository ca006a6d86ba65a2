use crate::ast::Value;
use crate::error::EvaluationError;
use crate::evaluator::{EvaluationContext, Evaluator, ExpressionEvaluator};
use crate::flow::VariableDefinition;
use ahash::AHashMap;

/// Variable bindings of one scope (the globals, or the locals of a flow state).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataContext {
    values: AHashMap<String, Value>,
}

impl DataContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares every variable, evaluating its default against `outer`.
    /// Defaults that fail to evaluate are bound to `undefined` and reported back.
    pub fn from_definitions(
        definitions: &[VariableDefinition],
        evaluator: &mut Evaluator,
        outer: &dyn EvaluationContext,
    ) -> (Self, Vec<(String, EvaluationError)>) {
        let mut context = Self::new();
        let mut failures = Vec::new();
        for definition in definitions {
            let value = if definition.default_value.trim().is_empty() {
                Value::Undefined
            } else {
                match evaluator.evaluate(&definition.default_value, outer) {
                    Ok(value) => value,
                    Err(e) => {
                        failures.push((definition.name.clone(), e));
                        Value::Undefined
                    }
                }
            };
            context.values.insert(definition.name.clone(), value);
        }
        (context, failures)
    }

    /// Copy of this context with some bindings replaced or added.
    pub fn with_overrides(&self, overrides: impl IntoIterator<Item = (String, Value)>) -> Self {
        let mut context = self.clone();
        context.values.extend(overrides);
        context
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.values.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

impl EvaluationContext for DataContext {
    fn lookup(&self, name: &str) -> Result<Value, EvaluationError> {
        self.get(name)
            .cloned()
            .ok_or_else(|| EvaluationError::UndeclaredVariable(name.to_string()))
    }

    fn variable_mut(&mut self, name: &str) -> Result<&mut Value, EvaluationError> {
        self.get_mut(name)
            .ok_or_else(|| EvaluationError::UndeclaredVariable(name.to_string()))
    }
}

/// What a component's expressions see: its input values, then the flow-state
/// locals, then the globals.
pub struct ComponentScope<'a> {
    pub inputs: Option<&'a AHashMap<String, Value>>,
    pub locals: &'a mut DataContext,
    pub globals: &'a mut DataContext,
}

impl EvaluationContext for ComponentScope<'_> {
    fn lookup(&self, name: &str) -> Result<Value, EvaluationError> {
        if let Some(value) = self.inputs.and_then(|inputs| inputs.get(name)) {
            return Ok(value.clone());
        }
        if let Some(value) = self.locals.get(name) {
            return Ok(value.clone());
        }
        self.globals.lookup(name)
    }

    fn variable_mut(&mut self, name: &str) -> Result<&mut Value, EvaluationError> {
        if self.locals.contains(name) {
            return self.locals.variable_mut(name);
        }
        self.globals.variable_mut(name)
    }
}
