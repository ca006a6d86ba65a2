//! Structural checks run before a project is executed or built.

use super::{FlowDefinition, FlowGraph, Project, SEQ_OUT, types_compatible};
use crate::components::ComponentKind;
use crate::error::ValidationError;
use ahash::AHashSet;
use std::collections::VecDeque;

/// Returns the first structural problem found in the project.
pub fn validate(project: &Project) -> Result<(), ValidationError> {
    match collect_issues(project).into_iter().next() {
        Some(issue) => Err(issue),
        None => Ok(()),
    }
}

/// Returns every structural problem found in the project.
pub fn collect_issues(project: &Project) -> Vec<ValidationError> {
    let mut issues = Vec::new();

    let mut names = AHashSet::new();
    for flow in &project.flows {
        if !names.insert(flow.name.as_str()) {
            issues.push(ValidationError::DuplicateFlow(flow.name.clone()));
        }
    }

    for flow in &project.flows {
        let graph = FlowGraph::build(project, flow);
        check_wires(flow, &graph, &mut issues);
        check_callees(project, flow, &mut issues);
        check_loops(flow, &graph, &mut issues);
    }
    issues
}

fn check_wires(flow: &FlowDefinition, graph: &FlowGraph, issues: &mut Vec<ValidationError>) {
    for wire in &flow.wires {
        let mut endpoint = |id: &str| {
            let found = graph.component_index(id);
            if found.is_none() {
                issues.push(ValidationError::ComponentNotFound {
                    flow: flow.name.clone(),
                    component: id.to_string(),
                });
            }
            found
        };
        let (Some(source), Some(target)) = (endpoint(&wire.source), endpoint(&wire.target)) else {
            continue;
        };

        let output = graph.components[source].output(&wire.output);
        let input = graph.components[target].input(&wire.input);
        if output.is_none() {
            issues.push(ValidationError::PinNotFound {
                flow: flow.name.clone(),
                component: wire.source.clone(),
                direction: "output",
                pin: wire.output.clone(),
            });
        }
        if input.is_none() {
            issues.push(ValidationError::PinNotFound {
                flow: flow.name.clone(),
                component: wire.target.clone(),
                direction: "input",
                pin: wire.input.clone(),
            });
        }
        if let (Some(output), Some(input)) = (output, input) {
            if !types_compatible(&output.value_type, &input.value_type) {
                issues.push(ValidationError::IncompatibleWire {
                    flow: flow.name.clone(),
                    source_pin: format!("{}.{}", wire.source, wire.output),
                    target_pin: format!("{}.{}", wire.target, wire.input),
                    source_type: output.value_type.clone(),
                    target_type: input.value_type.clone(),
                });
            }
        }
    }
}

fn check_callees(project: &Project, flow: &FlowDefinition, issues: &mut Vec<ValidationError>) {
    for component in &flow.components {
        if let ComponentKind::CallAction { action } = &component.kind {
            if project.find_flow(action).is_none() {
                issues.push(ValidationError::UnknownCallee {
                    flow: flow.name.clone(),
                    component: component.id.clone(),
                    callee: action.clone(),
                });
            }
        }
    }
}

/// Every Loop's `@seqout` must eventually lead back to its own `next` input,
/// otherwise the loop body runs once and the loop never terminates.
fn check_loops(flow: &FlowDefinition, graph: &FlowGraph, issues: &mut Vec<ValidationError>) {
    for (index, component) in flow.components.iter().enumerate() {
        if matches!(component.kind, ComponentKind::Loop { .. })
            && !reaches_own_next(graph, index)
        {
            issues.push(ValidationError::UnclosedLoop {
                flow: flow.name.clone(),
                component: component.id.clone(),
            });
        }
    }
}

fn reaches_own_next(graph: &FlowGraph, loop_index: usize) -> bool {
    let mut visited = AHashSet::new();
    let mut queue: VecDeque<usize> = VecDeque::new();

    for target in graph.targets(loop_index, SEQ_OUT) {
        if target.component == loop_index {
            if target.input == "next" {
                return true;
            }
        } else if visited.insert(target.component) {
            queue.push_back(target.component);
        }
    }

    while let Some(current) = queue.pop_front() {
        for targets in graph.components[current].outgoing.values() {
            for target in targets {
                if target.component == loop_index {
                    if target.input == "next" {
                        return true;
                    }
                } else if visited.insert(target.component) {
                    queue.push_back(target.component);
                }
            }
        }
    }
    false
}
