use super::assets::expression_error;
use super::{
    Assets, DataBuffer, DataReader, NativeAssets, NativeComponent, NativeFlow, NativeInput,
    NativeWire, OpCode,
};
use crate::ast::{BinaryOp, Expression, Value};
use crate::components::ComponentKind;
use crate::error::{BuildError, EvaluationError};
use crate::flow::{ComponentDefinition, FlowGraph, Project, ProjectGraph, validation};

/// Builds the binary form of every flow of a validated project.
pub fn build_project(project: &Project) -> Result<NativeAssets, BuildError> {
    validation::validate(project)?;
    let graph = ProjectGraph::build(project);
    let mut assets = Assets::new(project);
    let mut flows = Vec::with_capacity(project.flows.len());

    for (flow_index, flow) in project.flows.iter().enumerate() {
        assets.enter_flow(flow_index);
        let components = flow
            .components
            .iter()
            .enumerate()
            .map(|(index, component)| {
                build_component(&mut assets, &graph.flows[flow_index], index, component)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let boundary = |output: bool| -> Result<Vec<u16>, BuildError> {
            flow.components
                .iter()
                .enumerate()
                .filter(|(_, c)| match c.kind {
                    ComponentKind::Input { .. } => !output,
                    ComponentKind::Output { .. } => output,
                    _ => false,
                })
                .map(|(i, c)| narrow_u16(&c.id, i))
                .collect()
        };
        tracing::debug!(flow = %flow.name, components = components.len(), "flow built");
        flows.push(NativeFlow {
            name: flow.name.clone(),
            local_variables: flow.local_variables.iter().map(|v| v.name.clone()).collect(),
            input_components: boundary(false)?,
            output_components: boundary(true)?,
            components,
        });
    }
    Ok(assets.finish(flows))
}

fn build_component(
    assets: &mut Assets<'_>,
    graph: &FlowGraph,
    index: usize,
    component: &ComponentDefinition,
) -> Result<NativeComponent, BuildError> {
    let type_id = component
        .kind
        .flow_component_id()
        .ok_or_else(|| BuildError::Unsupported {
            component: component.id.clone(),
            kind: component.kind.type_name(),
        })?;
    let layout = graph.layout(index).ok_or_else(|| {
        BuildError::Generic(format!("component '{}' has no layout", component.id))
    })?;

    let inputs = layout
        .inputs
        .iter()
        .map(|pin| NativeInput {
            sequence: pin.sequence,
            optional: pin.optional,
        })
        .collect();

    let mut outputs = Vec::with_capacity(layout.outputs.len());
    for pin in &layout.outputs {
        let mut wires = Vec::new();
        for target in graph.targets(index, &pin.name) {
            let input = graph
                .layout(target.component)
                .and_then(|l| l.input_index(&target.input))
                .unwrap_or(0);
            wires.push(NativeWire {
                component: narrow_u16(&component.id, target.component)?,
                input: u8::try_from(input).map_err(|_| BuildError::Overflow {
                    component: component.id.clone(),
                    width: "u8",
                    value: input as i64,
                })?,
            });
        }
        outputs.push(wires);
    }

    let mut properties = Vec::new();
    for (_, source) in component.kind.expression_properties() {
        let mut chunk = DataBuffer::new();
        assets.write_expression(&component.id, source, &mut chunk)?;
        properties.push(chunk.into_bytes());
    }

    let mut specific = DataBuffer::new();
    component
        .kind
        .build_static(assets, &component.id, &mut specific)?;
    tracing::trace!(component = %component.id, type_id, bytes = specific.len(), "component built");

    Ok(NativeComponent {
        id: component.id.clone(),
        type_id,
        inputs,
        outputs,
        properties,
        specific: specific.into_bytes(),
    })
}

/// Emits the instructions of one expression into a chunk.
pub(super) fn emit_expression(
    assets: &mut Assets<'_>,
    component_id: &str,
    source: &str,
    expression: &Expression,
    chunk: &mut DataBuffer,
) -> Result<(), BuildError> {
    macro_rules! emit {
        ($e:expr) => {
            emit_expression(assets, component_id, source, $e, chunk)?
        };
    }
    match expression {
        Expression::Literal(value) => {
            let index = assets.constant(component_id, value.clone())?;
            OpCode::PushConstant(index).write(chunk);
        }
        Expression::Variable(name) => {
            let op = resolve(assets, component_id, name).ok_or_else(|| {
                expression_error(
                    component_id,
                    source,
                    EvaluationError::UndeclaredVariable(name.clone()),
                )
            })??;
            op.write(chunk);
        }
        Expression::Member(base, field) => {
            emit!(base);
            let field = assets.constant(component_id, Value::String(field.clone()))?;
            OpCode::Member(field).write(chunk);
        }
        Expression::Index(base, index) => {
            emit!(base);
            emit!(index);
            OpCode::Index.write(chunk);
        }
        Expression::Unary(op, operand) => {
            emit!(operand);
            OpCode::Unary(*op).write(chunk);
        }
        Expression::Binary(op @ (BinaryOp::And | BinaryOp::Or), left, right) => {
            emit!(left);
            let jump = chunk.len() + 1;
            if *op == BinaryOp::And {
                OpCode::JumpIfFalseOrPop(0).write(chunk);
            } else {
                OpCode::JumpIfTrueOrPop(0).write(chunk);
            }
            emit!(right);
            patch(component_id, chunk, jump)?;
        }
        Expression::Binary(op, left, right) => {
            emit!(left);
            emit!(right);
            OpCode::Binary(*op).write(chunk);
        }
        Expression::Conditional(condition, then, otherwise) => {
            emit!(condition);
            let to_else = chunk.len() + 1;
            OpCode::JumpIfFalse(0).write(chunk);
            emit!(then);
            let to_end = chunk.len() + 1;
            OpCode::Jump(0).write(chunk);
            patch(component_id, chunk, to_else)?;
            emit!(otherwise);
            patch(component_id, chunk, to_end)?;
        }
        Expression::Array(items) => {
            for item in items {
                emit!(item);
            }
            OpCode::MakeArray(narrow_u16(component_id, items.len())?).write(chunk);
        }
    }
    Ok(())
}

/// Inputs shadow locals, which shadow globals.
fn resolve(
    assets: &Assets<'_>,
    component_id: &str,
    name: &str,
) -> Option<Result<OpCode, BuildError>> {
    if let Some(index) = assets.input_index(component_id, name) {
        return Some(
            u8::try_from(index)
                .map(OpCode::PushInput)
                .map_err(|_| BuildError::Overflow {
                    component: component_id.to_string(),
                    width: "u8",
                    value: index as i64,
                }),
        );
    }
    if let Some(index) = assets.local_index(name) {
        return Some(narrow_u16(component_id, index).map(OpCode::PushLocal));
    }
    assets
        .global_index(name)
        .map(|index| narrow_u16(component_id, index).map(OpCode::PushGlobal))
}

/// Points the jump whose operand starts at `operand` to the end of the chunk.
fn patch(component_id: &str, chunk: &mut DataBuffer, operand: usize) -> Result<(), BuildError> {
    let target = narrow_u16(component_id, chunk.len())?;
    chunk.patch_u16(operand, target);
    Ok(())
}

fn narrow_u16(component_id: &str, value: usize) -> Result<u16, BuildError> {
    u16::try_from(value).map_err(|_| BuildError::Overflow {
        component: component_id.to_string(),
        width: "u16",
        value: value as i64,
    })
}

/// Decodes an expression chunk into `(offset, instruction)` pairs, up to and including `End`.
pub fn decode_expression(bytes: &[u8]) -> Result<Vec<(usize, OpCode)>, BuildError> {
    let mut reader = DataReader::new(bytes);
    let mut ops = Vec::new();
    loop {
        let offset = reader.position();
        let op = OpCode::read(&mut reader)?;
        ops.push((offset, op));
        if op == OpCode::End {
            return Ok(ops);
        }
    }
}
