use super::EvaluationContext;
use crate::ast::{BinaryOp, Expression, UnaryOp, Value};
use crate::error::EvaluationError;
use std::cmp::Ordering;
use std::collections::BTreeMap;

// This macro generates a match arm for an ordering comparison.
macro_rules! eval_ordering {
    ($l:expr, $r:expr, $($ord:pat_param)|+) => {
        Value::Boolean(matches!($l.compare(&$r), Some($($ord)|+)))
    };
}

/// The core recursive engine for evaluating a single expression tree.
pub(super) struct AstEngine<'a> {
    context: &'a dyn EvaluationContext,
}

impl<'a> AstEngine<'a> {
    pub(super) fn new(context: &'a dyn EvaluationContext) -> Self {
        Self { context }
    }

    pub(super) fn evaluate(&self, expr: &Expression) -> Result<Value, EvaluationError> {
        match expr {
            Expression::Literal(v) => Ok(v.clone()),
            Expression::Variable(name) => self.context.lookup(name),
            Expression::Member(base, field) => member(&self.evaluate(base)?, field),
            Expression::Index(base, index) => {
                let base = self.evaluate(base)?;
                let index = self.evaluate(index)?;
                element(&base, &index)
            }
            Expression::Unary(UnaryOp::Not, operand) => {
                Ok(Value::Boolean(!self.evaluate(operand)?.is_truthy()))
            }
            Expression::Unary(UnaryOp::Negate, operand) => match self.evaluate(operand)? {
                Value::Integer(i) => Ok(i
                    .checked_neg()
                    .map(Value::Integer)
                    .unwrap_or(Value::Double(-(i as f64)))),
                Value::Double(d) => Ok(Value::Double(-d)),
                other => Err(type_mismatch("-", "number", other)),
            },

            // --- Logical Operations, returning the deciding operand ---
            Expression::Binary(BinaryOp::And, l, r) => {
                let left = self.evaluate(l)?;
                if !left.is_truthy() {
                    return Ok(left);
                }
                self.evaluate(r)
            }
            Expression::Binary(BinaryOp::Or, l, r) => {
                let left = self.evaluate(l)?;
                if left.is_truthy() {
                    return Ok(left);
                }
                self.evaluate(r)
            }

            Expression::Binary(op, l, r) => {
                let left = self.evaluate(l)?;
                let right = self.evaluate(r)?;
                binary(*op, left, right)
            }
            Expression::Conditional(c, t, e) => {
                if self.evaluate(c)?.is_truthy() {
                    self.evaluate(t)
                } else {
                    self.evaluate(e)
                }
            }
            Expression::Array(items) => items
                .iter()
                .map(|item| self.evaluate(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
        }
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, EvaluationError> {
    match op {
        BinaryOp::Add => match (&left, &right) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                Ok(Value::String(format!("{}{}", left, right)))
            }
            _ => arithmetic("+", left, right, i64::checked_add, |a, b| a + b),
        },
        BinaryOp::Subtract => arithmetic("-", left, right, i64::checked_sub, |a, b| a - b),
        BinaryOp::Multiply => arithmetic("*", left, right, i64::checked_mul, |a, b| a * b),
        BinaryOp::Divide => {
            let (a, b) = numbers("/", &left, &right)?;
            Ok(Value::number(a / b))
        }
        BinaryOp::Remainder => arithmetic("%", left, right, i64::checked_rem, |a, b| a % b),
        BinaryOp::Equal => Ok(Value::Boolean(left.strict_equals(&right))),
        BinaryOp::NotEqual => Ok(Value::Boolean(!left.strict_equals(&right))),
        BinaryOp::Less => Ok(eval_ordering!(left, right, Ordering::Less)),
        BinaryOp::LessOrEqual => Ok(eval_ordering!(left, right, Ordering::Less | Ordering::Equal)),
        BinaryOp::Greater => Ok(eval_ordering!(left, right, Ordering::Greater)),
        BinaryOp::GreaterOrEqual => {
            Ok(eval_ordering!(left, right, Ordering::Greater | Ordering::Equal))
        }
        BinaryOp::And | BinaryOp::Or => Ok(if left.is_truthy() == (op == BinaryOp::And) {
            right
        } else {
            left
        }),
    }
}

fn arithmetic(
    symbol: &str,
    left: Value,
    right: Value,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Result<Value, EvaluationError> {
    if let (Value::Integer(a), Value::Integer(b)) = (&left, &right) {
        if let Some(result) = int_op(*a, *b) {
            return Ok(Value::Integer(result));
        }
    }
    let (a, b) = numbers(symbol, &left, &right)?;
    Ok(Value::Double(float_op(a, b)))
}

fn numbers(symbol: &str, left: &Value, right: &Value) -> Result<(f64, f64), EvaluationError> {
    let a = left
        .as_f64()
        .ok_or_else(|| type_mismatch(symbol, "number", left.clone()))?;
    let b = right
        .as_f64()
        .ok_or_else(|| type_mismatch(symbol, "number", right.clone()))?;
    Ok((a, b))
}

fn member(base: &Value, field: &str) -> Result<Value, EvaluationError> {
    match (base, field) {
        (Value::Object(fields), _) => Ok(fields.get(field).cloned().unwrap_or_default()),
        (Value::Array(items), "length") => Ok(Value::Integer(items.len() as i64)),
        (Value::String(s), "length") => Ok(Value::Integer(s.chars().count() as i64)),
        (other, _) => Err(type_mismatch(".", "object", other.clone())),
    }
}

fn element(base: &Value, index: &Value) -> Result<Value, EvaluationError> {
    match (base, index) {
        (Value::Array(items), Value::Integer(i)) => {
            Ok(usize::try_from(*i)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or_default())
        }
        (Value::Object(_), Value::String(key)) => member(base, key),
        (Value::String(s), Value::Integer(i)) => Ok(usize::try_from(*i)
            .ok()
            .and_then(|i| s.chars().nth(i))
            .map(|c| Value::String(c.to_string()))
            .unwrap_or_default()),
        (Value::Array(_), other) | (Value::String(_), other) => {
            Err(type_mismatch("[]", "integer index", other.clone()))
        }
        (other, _) => Err(type_mismatch("[]", "array or object", other.clone())),
    }
}

fn type_mismatch(operation: &str, expected: &str, found: Value) -> EvaluationError {
    EvaluationError::TypeMismatch {
        operation: operation.to_string(),
        expected: expected.to_string(),
        found,
    }
}

/// Writes `value` through an assignable path, creating intermediate objects.
pub(super) fn assign(
    target: &Expression,
    value: Value,
    context: &mut dyn EvaluationContext,
) -> Result<(), EvaluationError> {
    // Index operands are evaluated before the write so the context can be
    // borrowed mutably afterwards.
    let mut path = Vec::new();
    let mut cursor = target;
    loop {
        match cursor {
            Expression::Variable(_) => break,
            Expression::Member(base, field) => {
                path.push(Value::String(field.clone()));
                cursor = base;
            }
            Expression::Index(base, index) => {
                path.push(AstEngine::new(&*context).evaluate(index)?);
                cursor = base;
            }
            _ => return Err(EvaluationError::NotAssignable(target.to_string())),
        }
    }
    let root = target
        .root_variable()
        .ok_or_else(|| EvaluationError::NotAssignable(target.to_string()))?;

    let mut slot = context.variable_mut(root)?;
    for key in path.iter().rev() {
        slot = step_into(slot, key)?;
    }
    *slot = value;
    Ok(())
}

fn step_into<'v>(slot: &'v mut Value, key: &Value) -> Result<&'v mut Value, EvaluationError> {
    if slot.is_nullish() {
        *slot = Value::Object(BTreeMap::new());
    }
    match (slot, key) {
        (Value::Object(fields), Value::String(field)) => {
            Ok(fields.entry(field.clone()).or_default())
        }
        (Value::Array(items), Value::Integer(i)) => {
            let length = items.len();
            let index = usize::try_from(*i)
                .ok()
                .filter(|i| *i <= length)
                .ok_or(EvaluationError::IndexOutOfBounds { index: *i, length })?;
            if index == length {
                items.push(Value::Undefined);
            }
            Ok(&mut items[index])
        }
        (other, _) => Err(type_mismatch("assign", "object or array", other.clone())),
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::Value;
    use crate::evaluator::{Evaluator, ExpressionEvaluator, MapContext};

    #[test]
    fn evaluates_arithmetic_with_integer_preservation() {
        let mut evaluator = Evaluator::new();
        let ctx = MapContext::default().with("x", 4);
        assert_eq!(evaluator.evaluate("x * 2 + 1", &ctx), Ok(Value::Integer(9)));
        assert_eq!(evaluator.evaluate("x / 8", &ctx), Ok(Value::Double(0.5)));
        assert_eq!(evaluator.evaluate("'v' + x", &ctx), Ok(Value::from("v4")));
    }

    #[test]
    fn logical_operators_short_circuit() {
        let mut evaluator = Evaluator::new();
        let ctx = MapContext::default();
        // The right operand references an undeclared name and must not be touched.
        assert_eq!(evaluator.evaluate("false && missing", &ctx), Ok(Value::Boolean(false)));
        assert_eq!(evaluator.evaluate("1 || missing", &ctx), Ok(Value::Integer(1)));
        assert!(evaluator.evaluate("true && missing", &ctx).is_err());
    }

    #[test]
    fn assigns_nested_paths() {
        let mut evaluator = Evaluator::new();
        let mut ctx = MapContext::default()
            .with("config", Value::Null)
            .with("list", Value::Array(vec![Value::Integer(1)]));
        evaluator
            .assign("config.channel.voltage", Value::Double(3.3), &mut ctx)
            .unwrap();
        evaluator.assign("list[1]", Value::Integer(2), &mut ctx).unwrap();
        assert_eq!(
            evaluator.evaluate("config.channel.voltage", &ctx),
            Ok(Value::Double(3.3))
        );
        assert_eq!(evaluator.evaluate("list.length", &ctx), Ok(Value::Integer(2)));
        assert!(evaluator.assign("1 + 2", Value::Null, &mut ctx).is_err());
        assert!(evaluator.assign("unknown", Value::Null, &mut ctx).is_err());
    }
}
