use super::{MAX_ITERATORS, NativeEngine, PointerEvent};
use crate::ast::Value;
use crate::bytecode::CompiledProject;
use crate::config::RuntimeConfig;
use crate::error::BridgeError;
use crate::runtime::{Clock, FlowStateId, MemoryHost, Runtime, SystemClock};
use std::sync::Arc;

/// `NativeEngine` backed by the interpreted runtime, loading the interpreter
/// section of a compiled artifact. It renders nothing.
pub struct InterpretedEngine {
    config: RuntimeConfig,
    clock: Arc<dyn Clock>,
    runtime: Option<Runtime<MemoryHost>>,
    last_pointer: Option<PointerEvent>,
    wheel_position: i64,
    wheel_clicks: u32,
}

impl InterpretedEngine {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock::new()),
            runtime: None,
            last_pointer: None,
            wheel_position: 0,
            wheel_clicks: 0,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn runtime(&self) -> Option<&Runtime<MemoryHost>> {
        self.runtime.as_ref()
    }

    pub fn last_pointer(&self) -> Option<PointerEvent> {
        self.last_pointer
    }

    /// Accumulated wheel movement and the number of wheel clicks seen.
    pub fn wheel(&self) -> (i64, u32) {
        (self.wheel_position, self.wheel_clicks)
    }

    fn runtime_mut(&mut self) -> Result<&mut Runtime<MemoryHost>, BridgeError> {
        self.runtime.as_mut().ok_or(BridgeError::NotInitialized)
    }
}

impl Default for InterpretedEngine {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

fn engine_error(error: impl std::fmt::Display) -> BridgeError {
    BridgeError::Engine(error.to_string())
}

impl NativeEngine for InterpretedEngine {
    fn init(&mut self, assets: &[u8]) -> Result<(), BridgeError> {
        let artifact = CompiledProject::from_bytes(assets).map_err(engine_error)?;
        let project = artifact
            .interpreter
            .ok_or_else(|| BridgeError::Engine("artifact has no interpreter section".to_string()))?;
        let runtime = Runtime::builder(project)
            .config(self.config.clone())
            .clock(self.clock.clone())
            .build()
            .map_err(engine_error)?;
        self.runtime = Some(runtime);
        Ok(())
    }

    fn set_global_variable(&mut self, index: usize, value: Value) -> Result<(), BridgeError> {
        let runtime = self.runtime_mut()?;
        let name = runtime
            .project()
            .global_variables
            .get(index)
            .map(|v| v.name.clone())
            .ok_or_else(|| BridgeError::Engine(format!("no global variable at index {index}")))?;
        runtime.set_global(&name, value).map_err(engine_error)
    }

    fn start_flow(&mut self) -> Result<(), BridgeError> {
        self.runtime_mut()?.start().map_err(engine_error)?;
        Ok(())
    }

    fn on_pointer_event(&mut self, x: i32, y: i32, pressed: bool) {
        tracing::trace!(x, y, pressed, "pointer event");
        self.last_pointer = Some(PointerEvent { x, y, pressed });
    }

    fn on_wheel(&mut self, delta_y: i32, clicked: bool) {
        tracing::trace!(delta_y, clicked, "wheel event");
        self.wheel_position += i64::from(delta_y);
        if clicked {
            self.wheel_clicks += 1;
        }
    }

    fn propagate_value(
        &mut self,
        flow_state: usize,
        component: usize,
        output: usize,
        value: Value,
    ) -> Result<(), BridgeError> {
        let runtime = self.runtime_mut()?;
        let id = FlowStateId(flow_state);
        let flow_index = runtime
            .flow_state(id)
            .map(|s| s.flow_index)
            .ok_or_else(|| BridgeError::Engine(format!("unknown flow state {id}")))?;
        let name = runtime.graph().flows[flow_index]
            .layout(component)
            .and_then(|layout| layout.outputs.get(output))
            .map(|pin| pin.name.clone())
            .ok_or_else(|| {
                BridgeError::Engine(format!("component {component} has no output {output}"))
            })?;
        runtime
            .propagate_value(id, component, &name, value, None)
            .map_err(engine_error)
    }

    fn main_loop(&mut self) {
        if let Some(runtime) = self.runtime.as_mut() {
            runtime.tick();
        }
    }

    fn eval_property(
        &mut self,
        flow_state: usize,
        component: usize,
        property: usize,
        iterators: &[u32; MAX_ITERATORS],
    ) -> Result<Value, BridgeError> {
        let runtime = self.runtime_mut()?;
        let id = FlowStateId(flow_state);
        let flow_index = runtime
            .flow_state(id)
            .map(|s| s.flow_index)
            .ok_or_else(|| BridgeError::Engine(format!("unknown flow state {id}")))?;
        let source = runtime.project().flows[flow_index]
            .components
            .get(component)
            .and_then(|c| {
                c.kind
                    .expression_properties()
                    .get(property)
                    .map(|(_, source)| source.to_string())
            })
            .ok_or_else(|| {
                BridgeError::Engine(format!("component {component} has no property {property}"))
            })?;
        tracing::trace!(flow_state, component, property, ?iterators, "evaluating property");
        runtime
            .eval_expression(id, component, &source)
            .map_err(engine_error)
    }

    fn synced_buffer(&mut self) -> Option<Vec<u8>> {
        None
    }
}
