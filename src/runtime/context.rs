use super::{ComponentLabel, FlowStateId, RunningState, Runtime, RuntimeHost};
use crate::ast::Value;
use crate::error::ExecutionError;
use crate::flow::{Project, SEQ_OUT};
use std::time::Duration;

/// The view a component gets of the runtime while it executes.
pub struct ExecutionContext<'r, H: RuntimeHost> {
    runtime: &'r mut Runtime<H>,
    flow_state: FlowStateId,
    component: usize,
}

impl<'r, H: RuntimeHost> ExecutionContext<'r, H> {
    pub(super) fn new(
        runtime: &'r mut Runtime<H>,
        flow_state: FlowStateId,
        component: usize,
    ) -> Self {
        Self {
            runtime,
            flow_state,
            component,
        }
    }

    pub fn flow_state(&self) -> FlowStateId {
        self.flow_state
    }

    pub fn component(&self) -> usize {
        self.component
    }

    pub fn project(&self) -> &Project {
        &self.runtime.project
    }

    pub fn label(&self) -> ComponentLabel {
        self.runtime.label(self.flow_state, self.component)
    }

    /// Evaluates an expression against this component's scope.
    pub fn eval(&mut self, expression: &str) -> Result<Value, ExecutionError> {
        Ok(self
            .runtime
            .evaluate_in(self.flow_state, self.component, expression)?)
    }

    /// Writes a value through an assignable expression.
    pub fn assign(&mut self, target: &str, value: Value) -> Result<(), ExecutionError> {
        Ok(self
            .runtime
            .assign_in(self.flow_state, self.component, target, value)?)
    }

    pub fn input(&self, name: &str) -> Option<&Value> {
        self.runtime
            .flow_states
            .get(&self.flow_state)?
            .components
            .get(self.component)?
            .inputs_data
            .get(name)
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.input(name).is_some()
    }

    pub fn take_input(&mut self, name: &str) -> Option<Value> {
        self.runtime
            .component_state_mut(self.flow_state, self.component)?
            .inputs_data
            .remove(name)
    }

    pub fn running_state(&self) -> Option<&RunningState> {
        self.runtime
            .component_running_state(self.flow_state, self.component)
    }

    pub fn set_running_state(&mut self, running_state: Option<RunningState>) {
        if let Some(slot) = self
            .runtime
            .component_state_mut(self.flow_state, self.component)
        {
            slot.running_state = running_state;
        }
    }

    /// Fires an output of this component within its own flow state.
    pub fn propagate(&mut self, output: &str, value: Value) {
        self.runtime
            .deliver(self.flow_state, self.component, output, value);
    }

    /// Fires an output of the call-site component that spawned this flow state.
    /// Does nothing in the root flow state.
    pub fn propagate_to_caller(&mut self, output: &str, value: Value, label: Option<&str>) {
        let Some(state) = self.runtime.flow_states.get(&self.flow_state) else {
            return;
        };
        let (Some(parent), Some(call_site)) = (state.parent, state.call_site) else {
            return;
        };
        if let Some(label) = label {
            tracing::trace!(
                flow_state = %parent,
                call_site,
                output,
                label,
                "returning value to caller"
            );
        }
        self.runtime.deliver(parent, call_site, output, value);
    }

    /// Signals the caller that this flow state reached its End.
    pub fn return_to_caller(&mut self) {
        self.propagate_to_caller(SEQ_OUT, Value::Null, None);
        if let Some(state) = self.runtime.flow_states.get_mut(&self.flow_state) {
            if std::mem::take(&mut state.awaiting_return) {
                state.num_active_components = state.num_active_components.saturating_sub(1);
            }
        }
    }

    /// Creates a child flow state with this component as its call-site.
    /// Nothing in it runs until `settle_call`.
    pub fn call_flow(&mut self, flow_index: usize) -> Result<FlowStateId, ExecutionError> {
        let depth = self
            .runtime
            .flow_states
            .get(&self.flow_state)
            .map(|s| s.depth)
            .unwrap_or(0);
        if depth + 1 > self.runtime.config.max_call_depth {
            return Err(ExecutionError::Resource(format!(
                "maximum call depth of {} exceeded",
                self.runtime.config.max_call_depth
            )));
        }
        Ok(self
            .runtime
            .create_flow_state(flow_index, Some((self.flow_state, self.component))))
    }

    /// Delivers a value on an output of a component inside a child flow state.
    pub fn propagate_in(
        &mut self,
        flow_state: FlowStateId,
        component: usize,
        output: &str,
        value: Value,
    ) {
        self.runtime.deliver(flow_state, component, output, value);
    }

    /// Starts a child created by `call_flow`. A child with nothing to run
    /// finishes immediately, otherwise it holds a return token until its End
    /// runs. Returns true when the child already finished.
    pub fn settle_call(&mut self, child: FlowStateId) -> bool {
        self.runtime.queue_ready(child);
        let Some(state) = self.runtime.flow_states.get_mut(&child) else {
            return true;
        };
        if state.num_active_components == 0 && state.children.is_empty() {
            self.runtime.check_finished(child);
            true
        } else {
            state.awaiting_return = true;
            state.num_active_components += 1;
            false
        }
    }

    pub fn now(&self) -> Duration {
        self.runtime.clock.now()
    }

    pub fn system_time_millis(&self) -> i64 {
        self.runtime.clock.system_time_millis()
    }

    pub fn host(&mut self) -> &mut H {
        &mut self.runtime.host
    }

    /// Sends a value to the host logger.
    pub fn log_info(&mut self, value: &Value) {
        self.runtime.log_info(value, self.flow_state, self.component);
    }
}
