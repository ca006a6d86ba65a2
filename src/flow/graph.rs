use super::{ComponentDefinition, FlowDefinition, PinSpec, Project};
use crate::components::ComponentKind;
use ahash::{AHashMap, AHashSet};

/// Where a wire delivers its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireTarget {
    pub component: usize,
    pub input: String,
}

/// Resolved pins and wiring of a single component.
#[derive(Debug, Clone, Default)]
pub struct ComponentLayout {
    pub inputs: Vec<PinSpec>,
    pub outputs: Vec<PinSpec>,
    pub connected_inputs: AHashSet<String>,
    pub outgoing: AHashMap<String, Vec<WireTarget>>,
}

impl ComponentLayout {
    pub fn input(&self, name: &str) -> Option<&PinSpec> {
        self.inputs.iter().find(|p| p.name == name)
    }

    pub fn output(&self, name: &str) -> Option<&PinSpec> {
        self.outputs.iter().find(|p| p.name == name)
    }

    pub fn input_index(&self, name: &str) -> Option<usize> {
        self.inputs.iter().position(|p| p.name == name)
    }

    pub fn output_index(&self, name: &str) -> Option<usize> {
        self.outputs.iter().position(|p| p.name == name)
    }

    pub fn is_connected(&self, input: &str) -> bool {
        self.connected_inputs.contains(input)
    }
}

/// Pin tables and adjacency of one flow, computed once per project.
#[derive(Debug, Clone, Default)]
pub struct FlowGraph {
    pub components: Vec<ComponentLayout>,
    pub catch_error: Option<usize>,
    index: AHashMap<String, usize>,
}

impl FlowGraph {
    /// Builds the layout of a flow. Wires naming unknown components are skipped;
    /// validation reports them.
    pub fn build(project: &Project, flow: &FlowDefinition) -> Self {
        let index: AHashMap<String, usize> = flow
            .components
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();

        let mut components: Vec<ComponentLayout> = flow
            .components
            .iter()
            .map(|c| ComponentLayout {
                inputs: c.inputs(project),
                outputs: c.outputs(project),
                ..Default::default()
            })
            .collect();

        for wire in &flow.wires {
            let (Some(&source), Some(&target)) = (index.get(&wire.source), index.get(&wire.target))
            else {
                continue;
            };
            components[target]
                .connected_inputs
                .insert(wire.input.clone());
            components[source]
                .outgoing
                .entry(wire.output.clone())
                .or_default()
                .push(WireTarget {
                    component: target,
                    input: wire.input.clone(),
                });
        }

        let catch_error = flow
            .components
            .iter()
            .position(|c| matches!(c.kind, ComponentKind::CatchError));

        Self {
            components,
            catch_error,
            index,
        }
    }

    pub fn component_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn layout(&self, component: usize) -> Option<&ComponentLayout> {
        self.components.get(component)
    }

    pub fn targets(&self, component: usize, output: &str) -> &[WireTarget] {
        self.components
            .get(component)
            .and_then(|c| c.outgoing.get(output))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Layouts of every flow in a project, indexed like `Project::flows`.
#[derive(Debug, Clone, Default)]
pub struct ProjectGraph {
    pub flows: Vec<FlowGraph>,
}

impl ProjectGraph {
    pub fn build(project: &Project) -> Self {
        Self {
            flows: project
                .flows
                .iter()
                .map(|flow| FlowGraph::build(project, flow))
                .collect(),
        }
    }
}

impl ComponentDefinition {
    /// Declared inputs followed by the custom data inputs.
    pub fn inputs(&self, project: &Project) -> Vec<PinSpec> {
        let mut inputs = self.kind.inputs(project);
        inputs.extend(
            self.custom_inputs
                .iter()
                .map(|name| PinSpec::data(name, super::ANY_TYPE)),
        );
        inputs
    }

    pub fn outputs(&self, project: &Project) -> Vec<PinSpec> {
        self.kind.outputs(project)
    }
}
