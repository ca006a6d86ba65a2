use super::{ComponentKind, Execution};
use crate::ast::{Value, ValueType};
use crate::bytecode::{Assets, DataBuffer};
use crate::error::{BuildError, EvaluationError, ExecutionError};
use crate::flow::{PinSpec, Project, SEQ_IN, SEQ_OUT};
use crate::runtime::{ExecutionContext, RuntimeHost};
use std::time::Duration;

pub(super) fn end<H: RuntimeHost>(
    ctx: &mut ExecutionContext<'_, H>,
) -> Result<Execution, ExecutionError> {
    ctx.return_to_caller();
    Ok(Execution::Completed)
}

pub(super) fn output<H: RuntimeHost>(
    ctx: &mut ExecutionContext<'_, H>,
    name: &str,
) -> Result<Execution, ExecutionError> {
    let value = ctx.input(SEQ_IN).cloned().unwrap_or(Value::Null);
    let id = ctx.label().component;
    ctx.propagate_to_caller(&id, value, Some(name));
    Ok(Execution::Completed)
}

/// Data inputs of a call-action: one per Input component of the callee.
pub(super) fn call_inputs(project: &Project, action: &str) -> Vec<PinSpec> {
    let mut inputs = vec![PinSpec::sequence(SEQ_IN)];
    if let Some((_, callee)) = project.find_flow(action) {
        for component in callee.input_components() {
            if let ComponentKind::Input { name, value_type } = &component.kind {
                inputs.push(PinSpec::data(&component.id, value_type).labelled(name));
            }
        }
    }
    inputs
}

/// Outputs of a call-action: `@seqout` then one per Output component of the callee.
pub(super) fn call_outputs(project: &Project, action: &str) -> Vec<PinSpec> {
    let mut outputs = vec![PinSpec::sequence(SEQ_OUT).optional()];
    if let Some((_, callee)) = project.find_flow(action) {
        for component in callee.output_components() {
            if let ComponentKind::Output { name, value_type } = &component.kind {
                outputs.push(
                    PinSpec::data(&component.id, value_type)
                        .labelled(name)
                        .optional(),
                );
            }
        }
    }
    outputs
}

pub(super) fn call_action<H: RuntimeHost>(
    ctx: &mut ExecutionContext<'_, H>,
    action: &str,
) -> Result<Execution, ExecutionError> {
    let (flow_index, boundary) = {
        let Some((flow_index, callee)) = ctx.project().find_flow(action) else {
            return Err(ExecutionError::Resource(format!("flow '{action}' not found")));
        };
        let boundary: Vec<(usize, String)> = callee
            .components
            .iter()
            .enumerate()
            .filter(|(_, c)| matches!(c.kind, ComponentKind::Input { .. }))
            .map(|(i, c)| (i, c.id.clone()))
            .collect();
        (flow_index, boundary)
    };

    let child = ctx.call_flow(flow_index)?;
    for (index, id) in boundary {
        if let Some(value) = ctx.input(&id).cloned() {
            ctx.propagate_in(child, index, SEQ_OUT, value);
        }
    }
    if ctx.settle_call(child) {
        ctx.propagate(SEQ_OUT, Value::Null);
    }
    Ok(Execution::NoAdvance)
}

pub(super) fn delay<H: RuntimeHost>(
    ctx: &mut ExecutionContext<'_, H>,
    milliseconds: &str,
) -> Result<Execution, ExecutionError> {
    let value = ctx.eval(milliseconds)?;
    let millis = match &value {
        Value::Undefined | Value::Null => 0.0,
        other => other.as_f64().ok_or_else(|| EvaluationError::TypeMismatch {
            operation: "delay".to_string(),
            expected: ValueType::Double.name().to_string(),
            found: value.clone(),
        })?,
    };
    let resume_at = ctx.now() + Duration::from_micros((millis.max(0.0) * 1000.0).round() as u64);
    Ok(Execution::Suspended { resume_at })
}

pub(super) fn raise<H: RuntimeHost>(
    ctx: &mut ExecutionContext<'_, H>,
    message: &str,
) -> Result<Execution, ExecutionError> {
    let message = match ctx.eval(message)? {
        Value::String(s) => s,
        other => other.to_string(),
    };
    Err(ExecutionError::Raised(message))
}

pub(super) fn catch_error<H: RuntimeHost>(
    ctx: &mut ExecutionContext<'_, H>,
) -> Result<Execution, ExecutionError> {
    let message = ctx
        .take_input("message")
        .unwrap_or_else(|| Value::from("unknown error"));
    ctx.propagate("Message", message);
    Ok(Execution::Completed)
}

pub(super) fn show_page<H: RuntimeHost>(
    ctx: &mut ExecutionContext<'_, H>,
    page: &str,
) -> Result<Execution, ExecutionError> {
    if page.is_empty() {
        return Err(ExecutionError::Resource("page not specified".to_string()));
    }
    if !ctx.project().pages.iter().any(|p| p == page) {
        return Err(ExecutionError::Resource(format!("page '{page}' not found")));
    }
    ctx.host().show_page(page);
    Ok(Execution::Completed)
}

/// Position of an Input or Output component among its flow's boundary components.
pub(super) fn build_boundary(
    assets: &mut Assets<'_>,
    component_id: &str,
    is_output: bool,
    buffer: &mut DataBuffer,
) -> Result<(), BuildError> {
    let flow = assets.flow();
    let position = if is_output {
        flow.output_components().position(|c| c.id == component_id)
    } else {
        flow.input_components().position(|c| c.id == component_id)
    };
    let position = position.ok_or_else(|| {
        BuildError::Generic(format!("{component_id} is not a boundary component"))
    })?;
    buffer.write_u8(narrow_u8(component_id, position)?);
    Ok(())
}

/// Resolves the callee of a call-action: its flow index, and the input and
/// output pin indices of the first callee Input and Output (0 when absent).
pub fn call_pin_indices(project: &Project, action: &str) -> (Option<usize>, usize, usize) {
    let flow_index = project.find_flow(action).map(|(i, _)| i);
    let first_input = call_inputs(project, action)
        .iter()
        .position(|p| !p.sequence)
        .unwrap_or(0);
    let first_output = call_outputs(project, action)
        .iter()
        .position(|p| !p.sequence)
        .unwrap_or(0);
    (flow_index, first_input, first_output)
}

pub(super) fn build_call(
    assets: &mut Assets<'_>,
    component_id: &str,
    action: &str,
    buffer: &mut DataBuffer,
) -> Result<(), BuildError> {
    let (flow_index, input, output) = call_pin_indices(assets.project(), action);
    let flow_index = match flow_index {
        Some(index) => i16::try_from(index).map_err(|_| BuildError::Overflow {
            component: component_id.to_string(),
            width: "i16",
            value: index as i64,
        })?,
        None => {
            tracing::warn!(component = component_id, action, "call target missing from build");
            -1
        }
    };
    buffer.write_i16(flow_index);
    buffer.write_u8(narrow_u8(component_id, input)?);
    buffer.write_u8(narrow_u8(component_id, output)?);
    Ok(())
}

pub(super) fn build_page(
    assets: &mut Assets<'_>,
    component_id: &str,
    page: &str,
    buffer: &mut DataBuffer,
) -> Result<(), BuildError> {
    let index = match assets.page_index(page) {
        Some(index) => i16::try_from(index).map_err(|_| BuildError::Overflow {
            component: component_id.to_string(),
            width: "i16",
            value: index as i64,
        })?,
        None => -1,
    };
    buffer.write_i16(index);
    Ok(())
}

pub(super) fn narrow_u8(component_id: &str, value: usize) -> Result<u8, BuildError> {
    u8::try_from(value).map_err(|_| BuildError::Overflow {
        component: component_id.to_string(),
        width: "u8",
        value: value as i64,
    })
}
