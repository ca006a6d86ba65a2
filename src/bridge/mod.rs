//! Message protocol between a renderer and a worker that hosts an execution
//! engine, and the worker-side dispatcher.

mod engine;

pub use engine::InterpretedEngine;

use crate::ast::Value;
use crate::error::BridgeError;
use serde::{Deserialize, Serialize};

/// Number of iterator slots passed with every property evaluation.
pub const MAX_ITERATORS: usize = 4;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RendererToWorkerMessage {
    pub init: Option<InitMessage>,
    pub wheel: Option<WheelEvent>,
    #[serde(default)]
    pub pointer_events: Vec<PointerEvent>,
    #[serde(default)]
    pub update_global_variables: Vec<GlobalVariableValue>,
    #[serde(default)]
    pub eval_properties: Vec<EvalPropertyRequest>,
    pub execute_widget_action: Option<WidgetAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitMessage {
    /// A serialized `CompiledProject`.
    pub assets: Vec<u8>,
    #[serde(default)]
    pub global_variables: Vec<GlobalVariableValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalVariableValue {
    pub index: usize,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WheelEvent {
    pub delta_y: i32,
    pub clicked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub x: i32,
    pub y: i32,
    pub pressed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalPropertyRequest {
    pub flow_state_index: usize,
    pub component_index: usize,
    pub property_index: usize,
    /// Echoed back so the renderer can match results to requests.
    pub property_value_index: usize,
    #[serde(default)]
    pub indexes: Vec<u32>,
}

/// A value produced by a widget, injected on an output of a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidgetAction {
    pub flow_state_index: usize,
    pub component_index: usize,
    pub output_index: usize,
    pub value: Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerToRendererMessage {
    pub property_values: Option<Vec<PropertyValue>>,
    pub screen: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyValue {
    pub property_value_index: usize,
    pub value: Value,
    /// Set when the evaluation failed; `value` is then undefined.
    pub error: Option<String>,
}

/// The execution engine a worker drives.
pub trait NativeEngine {
    /// Loads a serialized asset bundle.
    fn init(&mut self, assets: &[u8]) -> Result<(), BridgeError>;

    fn set_global_variable(&mut self, index: usize, value: Value) -> Result<(), BridgeError>;

    fn start_flow(&mut self) -> Result<(), BridgeError>;

    fn on_pointer_event(&mut self, x: i32, y: i32, pressed: bool);

    fn on_wheel(&mut self, delta_y: i32, clicked: bool);

    fn propagate_value(
        &mut self,
        flow_state: usize,
        component: usize,
        output: usize,
        value: Value,
    ) -> Result<(), BridgeError>;

    /// Runs one scheduler iteration.
    fn main_loop(&mut self);

    fn eval_property(
        &mut self,
        flow_state: usize,
        component: usize,
        property: usize,
        iterators: &[u32; MAX_ITERATORS],
    ) -> Result<Value, BridgeError>;

    /// The frame rendered since the last call, if any.
    fn synced_buffer(&mut self) -> Option<Vec<u8>>;
}

/// Worker-side dispatcher: applies a renderer message to the engine and
/// builds the reply.
pub struct WorkerBridge<E: NativeEngine> {
    engine: E,
    initialized: bool,
}

impl<E: NativeEngine> WorkerBridge<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            initialized: false,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Handles one message. Widget actions are applied without a reply;
    /// every other message runs one main loop iteration and gets one.
    pub fn handle(
        &mut self,
        message: RendererToWorkerMessage,
    ) -> Result<Option<WorkerToRendererMessage>, BridgeError> {
        if let Some(action) = message.execute_widget_action {
            self.ensure_initialized()?;
            self.engine.propagate_value(
                action.flow_state_index,
                action.component_index,
                action.output_index,
                action.value,
            )?;
            return Ok(None);
        }

        if let Some(init) = message.init {
            self.engine.init(&init.assets)?;
            for global in init.global_variables {
                self.engine.set_global_variable(global.index, global.value)?;
            }
            self.engine.start_flow()?;
            self.initialized = true;
            tracing::info!(bytes = init.assets.len(), "worker engine initialized");
        }
        self.ensure_initialized()?;

        if let Some(wheel) = message.wheel {
            if wheel.delta_y != 0 || wheel.clicked {
                self.engine.on_wheel(wheel.delta_y, wheel.clicked);
            }
        }
        for pointer in message.pointer_events {
            self.engine.on_pointer_event(pointer.x, pointer.y, pointer.pressed);
        }
        for global in message.update_global_variables {
            self.engine.set_global_variable(global.index, global.value)?;
        }

        self.engine.main_loop();

        let property_values = if message.eval_properties.is_empty() {
            None
        } else {
            Some(
                message
                    .eval_properties
                    .iter()
                    .map(|request| self.eval_property(request))
                    .collect(),
            )
        };

        Ok(Some(WorkerToRendererMessage {
            property_values,
            screen: self.engine.synced_buffer(),
        }))
    }

    fn eval_property(&mut self, request: &EvalPropertyRequest) -> PropertyValue {
        let mut iterators = [0u32; MAX_ITERATORS];
        for (slot, index) in iterators.iter_mut().zip(&request.indexes) {
            *slot = *index;
        }
        match self.engine.eval_property(
            request.flow_state_index,
            request.component_index,
            request.property_index,
            &iterators,
        ) {
            Ok(value) => PropertyValue {
                property_value_index: request.property_value_index,
                value,
                error: None,
            },
            Err(error) => {
                tracing::warn!(
                    flow_state = request.flow_state_index,
                    component = request.component_index,
                    property = request.property_index,
                    %error,
                    "property evaluation failed"
                );
                PropertyValue {
                    property_value_index: request.property_value_index,
                    value: Value::Undefined,
                    error: Some(error.to_string()),
                }
            }
        }
    }

    fn ensure_initialized(&self) -> Result<(), BridgeError> {
        if self.initialized {
            Ok(())
        } else {
            Err(BridgeError::NotInitialized)
        }
    }
}
