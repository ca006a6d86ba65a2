use super::{DataBuffer, DataReader, OpCode, compiler};
use crate::ast::{Expression, Value};
use crate::error::{BuildError, EvaluationError};
use crate::evaluator::{Evaluator, ExpressionEvaluator, MapContext};
use crate::flow::{FlowDefinition, Project};
use serde::{Deserialize, Serialize};

/// Everything a native backend needs to execute a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeAssets {
    pub constants: Vec<Value>,
    pub global_variables: Vec<String>,
    pub flows: Vec<NativeFlow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeFlow {
    pub name: String,
    pub local_variables: Vec<String>,
    pub components: Vec<NativeComponent>,
    /// Component indices of the Input components, in declaration order.
    pub input_components: Vec<u16>,
    pub output_components: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeComponent {
    pub id: String,
    pub type_id: u16,
    pub inputs: Vec<NativeInput>,
    /// Wire targets of every output pin, indexed like the component's outputs.
    pub outputs: Vec<Vec<NativeWire>>,
    /// Compiled expression properties.
    pub properties: Vec<Vec<u8>>,
    /// The kind-specific record.
    pub specific: Vec<u8>,
}

impl NativeComponent {
    pub fn specific_reader(&self) -> DataReader<'_> {
        DataReader::new(&self.specific)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeInput {
    pub sequence: bool,
    pub optional: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeWire {
    pub component: u16,
    pub input: u8,
}

/// Build-time tables shared by every component record: the constant pool
/// and the variable, flow and page indices.
pub struct Assets<'p> {
    project: &'p Project,
    evaluator: Evaluator,
    constants: Vec<Value>,
    flow_index: usize,
}

impl<'p> Assets<'p> {
    pub fn new(project: &'p Project) -> Self {
        Self {
            project,
            evaluator: Evaluator::new(),
            constants: vec![Value::Null],
            flow_index: 0,
        }
    }

    /// Builds the binary form of a whole project.
    pub fn build(project: &Project) -> Result<NativeAssets, BuildError> {
        compiler::build_project(project)
    }

    pub fn project(&self) -> &'p Project {
        self.project
    }

    /// The flow whose components are being built.
    pub fn flow(&self) -> &'p FlowDefinition {
        &self.project.flows[self.flow_index]
    }

    pub(crate) fn enter_flow(&mut self, flow_index: usize) {
        self.flow_index = flow_index;
    }

    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    /// Index of `value` in the constant pool, adding it when new.
    pub fn constant(&mut self, component_id: &str, value: Value) -> Result<u16, BuildError> {
        let index = match self.constants.iter().position(|c| *c == value) {
            Some(index) => index,
            None => {
                self.constants.push(value);
                self.constants.len() - 1
            }
        };
        u16::try_from(index).map_err(|_| BuildError::Overflow {
            component: component_id.to_string(),
            width: "u16",
            value: index as i64,
        })
    }

    pub fn flow_index(&self, name: &str) -> Option<usize> {
        self.project.find_flow(name).map(|(i, _)| i)
    }

    pub fn page_index(&self, page: &str) -> Option<usize> {
        self.project.pages.iter().position(|p| p == page)
    }

    pub fn global_index(&self, name: &str) -> Option<usize> {
        self.project
            .global_variables
            .iter()
            .position(|v| v.name == name)
    }

    pub fn local_index(&self, name: &str) -> Option<usize> {
        self.flow().local_variables.iter().position(|v| v.name == name)
    }

    /// Index of a pin among the component's inputs, which shadow variables.
    pub fn input_index(&self, component_id: &str, name: &str) -> Option<usize> {
        let component = self.flow().components.iter().find(|c| c.id == component_id)?;
        component
            .inputs(self.project)
            .iter()
            .position(|p| p.name == name)
    }

    /// Folds an expression that references no variables.
    pub fn evaluate_constant(&mut self, source: &str) -> Result<Value, EvaluationError> {
        self.evaluator.evaluate(source, &MapContext::default())
    }

    fn parse(&mut self, component_id: &str, source: &str) -> Result<Expression, BuildError> {
        if source.trim().is_empty() {
            return Ok(Expression::Literal(Value::Undefined));
        }
        self.evaluator
            .parse(source)
            .cloned()
            .map_err(|error| expression_error(component_id, source, error))
    }

    /// Compiles an expression and appends its chunk to `buffer`.
    pub fn write_expression(
        &mut self,
        component_id: &str,
        source: &str,
        buffer: &mut DataBuffer,
    ) -> Result<(), BuildError> {
        let expression = self.parse(component_id, source)?;
        let mut chunk = DataBuffer::new();
        compiler::emit_expression(self, component_id, source, &expression, &mut chunk)?;
        OpCode::End.write(&mut chunk);
        buffer.write_bytes(chunk.as_slice());
        Ok(())
    }

    /// Like `write_expression`, for targets that must be assignable.
    pub fn write_assignable(
        &mut self,
        component_id: &str,
        source: &str,
        buffer: &mut DataBuffer,
    ) -> Result<(), BuildError> {
        let expression = self.parse(component_id, source)?;
        if !expression.is_assignable() {
            return Err(expression_error(
                component_id,
                source,
                EvaluationError::NotAssignable(source.to_string()),
            ));
        }
        self.write_expression(component_id, source, buffer)
    }

    pub(crate) fn finish(self, flows: Vec<NativeFlow>) -> NativeAssets {
        NativeAssets {
            constants: self.constants,
            global_variables: self
                .project
                .global_variables
                .iter()
                .map(|v| v.name.clone())
                .collect(),
            flows,
        }
    }
}

pub(crate) fn expression_error(
    component_id: &str,
    source: &str,
    error: EvaluationError,
) -> BuildError {
    BuildError::Expression {
        component: component_id.to_string(),
        expression: source.to_string(),
        source: error,
    }
}
