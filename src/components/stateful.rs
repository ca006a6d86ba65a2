use super::Execution;
use crate::ast::{Value, ValueType};
use crate::error::{EvaluationError, ExecutionError};
use crate::flow::SEQ_OUT;
use crate::runtime::{ExecutionContext, RunningState, RuntimeHost, Subscription};

/// Counts down from `count_value`; the invocation that finds it at zero also
/// fires `done` and resets, so the next one starts over.
pub(super) fn counter<H: RuntimeHost>(
    ctx: &mut ExecutionContext<'_, H>,
    count_value: i64,
) -> Result<Execution, ExecutionError> {
    let remaining = match ctx.running_state() {
        Some(RunningState::Counter { remaining }) => *remaining,
        _ => count_value,
    };
    if remaining > 0 {
        ctx.set_running_state(Some(RunningState::Counter {
            remaining: remaining - 1,
        }));
    } else {
        ctx.set_running_state(None);
        ctx.propagate("done", Value::Null);
    }
    Ok(Execution::Completed)
}

pub(super) fn run_loop<H: RuntimeHost>(
    ctx: &mut ExecutionContext<'_, H>,
    variable: &str,
    from: &str,
    to: &str,
    step: &str,
) -> Result<Execution, ExecutionError> {
    let restart = ctx.has_input("start");
    let current = match ctx.running_state() {
        Some(RunningState::Loop { value, to, step }) if !restart => {
            Some((value.clone(), to.clone(), step.clone()))
        }
        _ => None,
    };

    let Some((value, to, step)) = current else {
        let from = ctx.eval(from)?;
        let to = ctx.eval(to)?;
        let step = ctx.eval(step)?;
        number(&from)?;
        ctx.assign(variable, from.clone())?;
        ctx.set_running_state(Some(RunningState::Loop {
            value: from,
            to,
            step,
        }));
        ctx.propagate(SEQ_OUT, Value::Null);
        return Ok(Execution::NoAdvance);
    };

    let next = number(&value)? + number(&step)?;
    let limit = number(&to)?;

    // Ends on `next >= to` whatever the sign of the step.
    if next >= limit {
        ctx.set_running_state(None);
        ctx.propagate("done", Value::Null);
    } else {
        let next = Value::number(next);
        ctx.assign(variable, next.clone())?;
        ctx.set_running_state(Some(RunningState::Loop {
            value: next,
            to,
            step,
        }));
        ctx.propagate(SEQ_OUT, Value::Null);
    }
    Ok(Execution::NoAdvance)
}

fn number(value: &Value) -> Result<f64, EvaluationError> {
    value.as_f64().ok_or_else(|| EvaluationError::TypeMismatch {
        operation: "loop".to_string(),
        expected: ValueType::Double.name().to_string(),
        found: value.clone(),
    })
}

/// Propagates the watched value and keeps a subscription that the scheduler
/// polls every tick.
pub(super) fn watch_variable<H: RuntimeHost>(
    ctx: &mut ExecutionContext<'_, H>,
    variable: &str,
) -> Result<Execution, ExecutionError> {
    let value = ctx.eval(variable)?;
    if !matches!(ctx.running_state(), Some(RunningState::Watch(_))) {
        ctx.set_running_state(Some(RunningState::Watch(Subscription {
            expression: variable.to_string(),
            last_value: value.clone(),
        })));
    }
    ctx.propagate("variable", value);
    Ok(Execution::Subscribed)
}
