use super::control::narrow_u8;
use super::{CompareOperator, ComponentKind, Execution, SwitchTest};
use crate::ast::Value;
use crate::bytecode::{Assets, DataBuffer};
use crate::error::{BuildError, EvaluationError, ExecutionError};
use crate::runtime::{ExecutionContext, RuntimeHost};
use std::cmp::Ordering;

pub(super) fn eval_expr<H: RuntimeHost>(
    ctx: &mut ExecutionContext<'_, H>,
    expression: &str,
) -> Result<Execution, ExecutionError> {
    let value = ctx.eval(expression)?;
    ctx.propagate("result", value);
    Ok(Execution::Completed)
}

pub(super) fn set_variable<H: RuntimeHost>(
    ctx: &mut ExecutionContext<'_, H>,
    variable: &str,
    value: &str,
) -> Result<Execution, ExecutionError> {
    let value = ctx.eval(value)?;
    ctx.assign(variable, value)?;
    Ok(Execution::Completed)
}

/// Fires the output of the first test whose condition holds.
pub(super) fn switch<H: RuntimeHost>(
    ctx: &mut ExecutionContext<'_, H>,
    tests: &[SwitchTest],
) -> Result<Execution, ExecutionError> {
    for test in tests {
        if ctx.eval(&test.condition)?.is_truthy() {
            ctx.propagate(&test.output_name, Value::Null);
            break;
        }
    }
    Ok(Execution::Completed)
}

pub(super) fn compare<H: RuntimeHost>(
    ctx: &mut ExecutionContext<'_, H>,
    operator: CompareOperator,
    a: &str,
    b: &str,
    c: &str,
) -> Result<Execution, ExecutionError> {
    let a = ctx.eval(a)?;
    // B is read even when A alone decides the outcome.
    let b = match operator {
        CompareOperator::Not => Value::Undefined,
        _ => ctx.eval(b)?,
    };
    let result = match operator {
        CompareOperator::Not => !a.is_truthy(),
        CompareOperator::Between => {
            let high = ctx.eval(c)?;
            ordered(&b, &a, "BETWEEN")? != Ordering::Greater
                && ordered(&a, &high, "BETWEEN")? != Ordering::Greater
        }
        CompareOperator::Equal => a.strict_equals(&b),
        CompareOperator::NotEqual => !a.strict_equals(&b),
        CompareOperator::Less => ordered(&a, &b, "<")? == Ordering::Less,
        CompareOperator::Greater => ordered(&a, &b, ">")? == Ordering::Greater,
        CompareOperator::LessOrEqual => ordered(&a, &b, "<=")? != Ordering::Greater,
        CompareOperator::GreaterOrEqual => ordered(&a, &b, ">=")? != Ordering::Less,
        CompareOperator::And => a.is_truthy() && b.is_truthy(),
        CompareOperator::Or => a.is_truthy() || b.is_truthy(),
        CompareOperator::Xor => a.is_truthy() != b.is_truthy(),
    };
    fire_boolean(ctx, result);
    Ok(Execution::Completed)
}

fn ordered(left: &Value, right: &Value, operation: &str) -> Result<Ordering, EvaluationError> {
    left.compare(right)
        .ok_or_else(|| EvaluationError::TypeMismatch {
            operation: operation.to_string(),
            expected: left.value_type().name().to_string(),
            found: right.clone(),
        })
}

pub(super) fn is_true<H: RuntimeHost>(
    ctx: &mut ExecutionContext<'_, H>,
    value: &str,
) -> Result<Execution, ExecutionError> {
    let result = ctx.eval(value)?.is_truthy();
    fire_boolean(ctx, result);
    Ok(Execution::Completed)
}

fn fire_boolean<H: RuntimeHost>(ctx: &mut ExecutionContext<'_, H>, result: bool) {
    let output = if result { "True" } else { "False" };
    ctx.propagate(output, Value::Boolean(result));
}

pub(super) fn constant<H: RuntimeHost>(
    ctx: &mut ExecutionContext<'_, H>,
    value: &str,
) -> Result<Execution, ExecutionError> {
    let value = ctx.eval(value)?;
    ctx.propagate("value", value);
    Ok(Execution::Completed)
}

pub(super) fn build_assignable(
    assets: &mut Assets<'_>,
    component_id: &str,
    target: &str,
    buffer: &mut DataBuffer,
) -> Result<(), BuildError> {
    assets.write_assignable(component_id, target, buffer)
}

/// Writes `(output index, condition)` pairs prefixed by their count.
pub(super) fn build_switch(
    assets: &mut Assets<'_>,
    component_id: &str,
    tests: &[SwitchTest],
    buffer: &mut DataBuffer,
) -> Result<(), BuildError> {
    let outputs = ComponentKind::Switch {
        tests: tests.to_vec(),
    }
    .outputs(assets.project());
    buffer.write_u8(narrow_u8(component_id, tests.len())?);
    for test in tests {
        let index = outputs
            .iter()
            .position(|p| p.name == test.output_name)
            .unwrap_or(0);
        buffer.write_u8(narrow_u8(component_id, index)?);
        assets.write_expression(component_id, &test.condition, buffer)?;
    }
    Ok(())
}

/// Constants are folded at build time; a value that does not evaluate is
/// stored as null.
pub(super) fn build_constant(
    assets: &mut Assets<'_>,
    component_id: &str,
    value: &str,
    buffer: &mut DataBuffer,
) -> Result<(), BuildError> {
    let value = match assets.evaluate_constant(value) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(
                component = component_id,
                %error,
                "constant value does not evaluate, storing null"
            );
            Value::Null
        }
    };
    let index = assets.constant(component_id, value)?;
    buffer.write_u16(index);
    Ok(())
}
