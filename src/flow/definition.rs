use crate::components::ComponentKind;
use serde::{Deserialize, Serialize};

/// The complete, canonical definition of a project: every callable flow plus
/// the globally visible variables and the pages a flow may navigate to.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub flows: Vec<FlowDefinition>,
    #[serde(default)]
    pub global_variables: Vec<VariableDefinition>,
    #[serde(default)]
    pub pages: Vec<String>,
}

/// One flow graph: components, the wires between them and its local variables.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub name: String,
    pub components: Vec<ComponentDefinition>,
    #[serde(default)]
    pub wires: Vec<WireDefinition>,
    #[serde(default)]
    pub local_variables: Vec<VariableDefinition>,
}

/// A component placed in a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    /// Stable object id, also used as the component's wire id.
    pub id: String,
    /// Extra data inputs whose latest values are visible to the component's expressions.
    #[serde(default)]
    pub custom_inputs: Vec<String>,
    pub kind: ComponentKind,
}

/// Connects an output pin of one component to an input pin of another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireDefinition {
    pub source: String,
    pub output: String,
    pub target: String,
    pub input: String,
}

/// A declared variable; `default_value` is an expression evaluated when the scope is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDefinition {
    pub name: String,
    #[serde(default = "any_type")]
    pub value_type: String,
    #[serde(default)]
    pub default_value: String,
}

fn any_type() -> String {
    super::ANY_TYPE.to_string()
}

impl Project {
    pub fn find_flow(&self, name: &str) -> Option<(usize, &FlowDefinition)> {
        self.flows.iter().enumerate().find(|(_, f)| f.name == name)
    }
}

impl FlowDefinition {
    pub fn component_index(&self, id: &str) -> Option<usize> {
        self.components.iter().position(|c| c.id == id)
    }

    /// Input boundary components, in declaration order.
    pub fn input_components(&self) -> impl Iterator<Item = &ComponentDefinition> {
        self.components
            .iter()
            .filter(|c| matches!(c.kind, ComponentKind::Input { .. }))
    }

    /// Output boundary components, in declaration order.
    pub fn output_components(&self) -> impl Iterator<Item = &ComponentDefinition> {
        self.components
            .iter()
            .filter(|c| matches!(c.kind, ComponentKind::Output { .. }))
    }
}

impl ComponentDefinition {
    pub fn new(id: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            id: id.into(),
            custom_inputs: Vec::new(),
            kind,
        }
    }

    pub fn with_inputs(mut self, inputs: &[&str]) -> Self {
        self.custom_inputs = inputs.iter().map(|s| s.to_string()).collect();
        self
    }
}

impl WireDefinition {
    pub fn new(source: &str, output: &str, target: &str, input: &str) -> Self {
        Self {
            source: source.to_string(),
            output: output.to_string(),
            target: target.to_string(),
            input: input.to_string(),
        }
    }
}

impl VariableDefinition {
    pub fn new(name: &str, default_value: &str) -> Self {
        Self {
            name: name.to_string(),
            value_type: any_type(),
            default_value: default_value.to_string(),
        }
    }
}
