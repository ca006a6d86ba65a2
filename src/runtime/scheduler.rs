use super::{
    ComponentLabel, ComponentScope, DataContext, ExecutionContext, FlowState, FlowStateId,
    FlowStatus, RunningState, Runtime, RuntimeHost, RuntimeStatus,
};
use crate::ast::Value;
use crate::components::{ComponentKind, Execution};
use crate::error::{EvaluationError, ExecutionError, FlowError};
use crate::evaluator::ExpressionEvaluator;
use crate::flow::{ComponentLayout, SEQ_OUT};
use std::time::Duration;

impl<H: RuntimeHost> Runtime<H> {
    /// One scheduler tick: fire due timers, drain the queue, poll watches, drain again.
    /// Returns the number of components executed.
    pub fn tick(&mut self) -> usize {
        if self.status != RuntimeStatus::Running {
            return 0;
        }
        let budget = self.config.max_steps_per_tick;
        let mut executed = 0;

        self.fire_due_timers();
        executed += self.drain(budget);
        self.poll_watches();
        executed += self.drain(budget.saturating_sub(executed));

        if executed > 0 {
            tracing::debug!(executed, queued = self.queue.len(), "tick finished");
        }
        executed
    }

    fn drain(&mut self, budget: usize) -> usize {
        let mut executed = 0;
        while executed < budget && self.status == RuntimeStatus::Running {
            match self.step() {
                Some(true) => executed += 1,
                Some(false) => {}
                None => break,
            }
            // Zero-length delays resolve within the same tick.
            if self.queue.is_empty() {
                self.fire_due_timers();
            }
        }
        executed
    }

    /// Executes the next queued component. `None` when the queue is empty,
    /// `Some(false)` when the entry was stale.
    fn step(&mut self) -> Option<bool> {
        let (flow_state, component) = self.queue.pop_front()?;
        let Some(state) = self.flow_states.get_mut(&flow_state) else {
            return Some(false);
        };
        if let Some(slot) = state.components.get_mut(component) {
            slot.queued = false;
        }
        if state.status != FlowStatus::Running {
            return Some(false);
        }

        self.stats.executed_components += 1;
        let project = self.project.clone();
        let definition = &project.flows[state.flow_index].components[component];
        tracing::debug!(
            flow = %project.flows[state.flow_index].name,
            flow_state = %flow_state,
            component = %definition.id,
            kind = definition.kind.type_name(),
            "executing component"
        );

        let result = {
            let mut ctx = ExecutionContext::new(self, flow_state, component);
            definition.kind.execute(&mut ctx)
        };
        self.clear_sequence_inputs(flow_state, component);

        match result {
            Ok(Execution::Completed) | Ok(Execution::Subscribed) => {
                self.complete(flow_state, component)
            }
            Ok(Execution::NoAdvance) => self.finish_component(flow_state, component),
            Ok(Execution::Suspended { resume_at }) => {
                if let Some(slot) = self.component_state_mut(flow_state, component) {
                    slot.running_state = Some(RunningState::Delay { resume_at });
                }
            }
            Err(error) => {
                // Retiring the component first could finish the flow state.
                self.handle_failure(flow_state, component, error);
                self.finish_component(flow_state, component);
            }
        }
        Some(true)
    }

    /// Normal completion: auto-fires `@seqout` when the component declares it.
    pub(super) fn complete(&mut self, flow_state: FlowStateId, component: usize) {
        let has_seqout = self
            .layout(flow_state, component)
            .map(|l| l.output(SEQ_OUT).is_some())
            .unwrap_or(false);
        if has_seqout {
            self.deliver(flow_state, component, SEQ_OUT, Value::Null);
        }
        self.finish_component(flow_state, component);
    }

    fn finish_component(&mut self, flow_state: FlowStateId, component: usize) {
        let Some(state) = self.flow_states.get_mut(&flow_state) else {
            return;
        };
        match state.num_active_components.checked_sub(1) {
            Some(n) => state.num_active_components = n,
            None => tracing::error!(
                flow_state = %flow_state,
                component,
                "active component count would underflow"
            ),
        }
        let rearmed = state
            .components
            .get_mut(component)
            .map(|slot| {
                let pending = slot.pending_sequence.pop_front();
                let rearmed = pending.is_some();
                if let Some((input, value)) = pending {
                    slot.inputs_data.insert(input, value);
                }
                std::mem::take(&mut slot.redelivered) || rearmed
            })
            .unwrap_or(false);
        if rearmed && self.is_ready(flow_state, component) {
            self.enqueue(flow_state, component);
        }
        self.check_finished(flow_state);
    }

    pub(super) fn enqueue(&mut self, flow_state: FlowStateId, component: usize) {
        let Some(state) = self.flow_states.get_mut(&flow_state) else {
            return;
        };
        let Some(slot) = state.components.get_mut(component) else {
            return;
        };
        if slot.queued {
            return;
        }
        slot.queued = true;
        state.num_active_components += 1;
        self.queue.push_back((flow_state, component));
    }

    /// A component is ready when every connected mandatory data input holds a
    /// value and, if sequence inputs are connected, at least one of them fired.
    pub(super) fn is_ready(&self, flow_state: FlowStateId, component: usize) -> bool {
        let Some(state) = self.flow_states.get(&flow_state) else {
            return false;
        };
        let Some(slot) = state.components.get(component) else {
            return false;
        };
        if slot.queued || slot.is_suspended() || state.status != FlowStatus::Running {
            return false;
        }
        let kind = &self.project.flows[state.flow_index].components[component].kind;
        if matches!(kind, ComponentKind::CatchError | ComponentKind::Input { .. }) {
            return false;
        }
        let Some(layout) = self.graph.flows[state.flow_index].layout(component) else {
            return false;
        };

        let mut connected_sequence = 0;
        let mut fired_sequence = 0;
        let mut mandatory_sequence = false;
        for pin in &layout.inputs {
            let connected = layout.is_connected(&pin.name);
            let defined = slot.inputs_data.contains_key(&pin.name);
            if pin.sequence {
                mandatory_sequence |= !pin.optional;
                if connected {
                    connected_sequence += 1;
                    fired_sequence += defined as usize;
                }
            } else if connected && !pin.optional && !defined {
                return false;
            }
        }

        if connected_sequence > 0 {
            fired_sequence > 0
        } else {
            !mandatory_sequence
        }
    }

    /// Stores `value` on every input wired to the output and queues targets that became ready.
    pub(super) fn deliver(
        &mut self,
        flow_state: FlowStateId,
        component: usize,
        output: &str,
        value: Value,
    ) {
        let Some(flow_index) = self.flow_states.get(&flow_state).map(|s| s.flow_index) else {
            return;
        };
        let graph = self.graph.clone();
        let flow = &graph.flows[flow_index];
        for target in flow.targets(component, output) {
            let sequence = flow
                .layout(target.component)
                .and_then(|l| l.input(&target.input))
                .is_some_and(|pin| pin.sequence);
            let Some(slot) = self.component_state_mut(flow_state, target.component) else {
                continue;
            };
            if slot.queued || slot.is_suspended() {
                // Each trigger owes the component one more run.
                if sequence {
                    slot.pending_sequence
                        .push_back((target.input.clone(), value.clone()));
                } else {
                    slot.inputs_data.insert(target.input.clone(), value.clone());
                    slot.redelivered = true;
                }
            } else {
                slot.inputs_data.insert(target.input.clone(), value.clone());
                if self.is_ready(flow_state, target.component) {
                    self.enqueue(flow_state, target.component);
                }
            }
        }
    }

    fn clear_sequence_inputs(&mut self, flow_state: FlowStateId, component: usize) {
        let graph = self.graph.clone();
        let Some(state) = self.flow_states.get_mut(&flow_state) else {
            return;
        };
        let Some(layout) = graph.flows[state.flow_index].layout(component) else {
            return;
        };
        if let Some(slot) = state.components.get_mut(component) {
            for pin in layout.inputs.iter().filter(|p| p.sequence) {
                slot.inputs_data.remove(&pin.name);
            }
        }
    }

    /// Marks an idle flow state finished; a finished child is detached from
    /// its parent and released, which may in turn finish the parent.
    pub(super) fn check_finished(&mut self, flow_state: FlowStateId) {
        let Some(state) = self.flow_states.get_mut(&flow_state) else {
            return;
        };
        if state.status != FlowStatus::Running || !state.is_idle() {
            return;
        }
        state.status = FlowStatus::Finished;
        let parent = state.parent;
        tracing::debug!(flow_state = %flow_state, "flow state finished");

        match parent {
            Some(parent) => {
                self.release_flow_state(flow_state);
                self.check_finished(parent);
            }
            None => {
                if self.root == Some(flow_state) && self.status == RuntimeStatus::Running {
                    self.status = RuntimeStatus::Finished;
                    tracing::info!("root flow finished");
                }
            }
        }
    }

    /// Routes a component failure according to the error policy.
    fn handle_failure(
        &mut self,
        flow_state: FlowStateId,
        component: usize,
        error: ExecutionError,
    ) {
        let label = self.label(flow_state, component);
        let message = error.to_string();
        if error.is_fatal() {
            self.throw_error(flow_state, &label, message);
            return;
        }

        self.stats.reported_errors += 1;
        tracing::error!(component = %label, %message, "expression evaluation failed");
        self.host.log_error(&message, &label);
        if self.catch_error_component(flow_state).is_some() {
            self.throw_error(flow_state, &label, message);
        }
    }

    /// Delivers `message` to the flow state's Catch-error component, or fails
    /// the flow state and re-raises at the parent's call-site.
    pub(super) fn throw_error(
        &mut self,
        flow_state: FlowStateId,
        origin: &ComponentLabel,
        message: String,
    ) {
        if let Some(catch) = self.catch_error_component(flow_state) {
            self.stats.caught_errors += 1;
            tracing::warn!(component = %origin, %message, "error caught");
            if let Some(slot) = self.component_state_mut(flow_state, catch) {
                slot.inputs_data
                    .insert("message".to_string(), Value::String(message));
            }
            self.enqueue(flow_state, catch);
            return;
        }

        let Some(state) = self.flow_states.get_mut(&flow_state) else {
            return;
        };
        if state.status != FlowStatus::Running {
            return;
        }
        state.status = FlowStatus::Failed(message.clone());
        let parent = state.parent.zip(state.call_site);
        self.dispose_handles(flow_state);

        match parent {
            Some((parent, call_site)) => {
                tracing::warn!(
                    component = %origin,
                    %message,
                    "unhandled error leaves nested flow"
                );
                self.release_flow_state(flow_state);
                let call_label = self.label(parent, call_site);
                self.throw_error(parent, &call_label, message);
                self.check_finished(parent);
            }
            None => {
                tracing::error!(component = %origin, %message, "unhandled error in root flow");
                self.host.log_error(&message, origin);
                self.status = RuntimeStatus::Failed(message);
                self.queue.clear();
            }
        }
    }

    fn catch_error_component(&self, flow_state: FlowStateId) -> Option<usize> {
        let flow_index = self.flow_states.get(&flow_state)?.flow_index;
        self.graph.flows[flow_index].catch_error
    }

    /// Disposes every live handle of a flow state and its descendants.
    pub(super) fn dispose_handles(&mut self, flow_state: FlowStateId) {
        let Some(state) = self.flow_states.get_mut(&flow_state) else {
            return;
        };
        let mut disposed = 0;
        for slot in &mut state.components {
            if let Some(running) = slot.running_state.take() {
                if running.is_live_handle() {
                    disposed += 1;
                }
            }
        }
        let children = std::mem::take(&mut state.children);
        self.stats.disposed_handles += disposed;
        if disposed > 0 {
            tracing::debug!(flow_state = %flow_state, disposed, "disposed live handles");
        }
        for child in children {
            self.dispose_handles(child);
            self.flow_states.remove(&child);
        }
    }

    /// Removes a finished or failed child from its parent and from the arena.
    fn release_flow_state(&mut self, flow_state: FlowStateId) {
        self.dispose_handles(flow_state);
        if let Some(state) = self.flow_states.remove(&flow_state) {
            if let Some(parent) = state.parent.and_then(|p| self.flow_states.get_mut(&p)) {
                parent.children.retain(|c| *c != flow_state);
            }
        }
    }

    /// Resumes every suspended component whose timer has elapsed.
    fn fire_due_timers(&mut self) {
        let now = self.clock.now();
        let mut due: Vec<(Duration, FlowStateId, usize)> = self
            .flow_states
            .iter()
            .flat_map(|(id, fs)| {
                fs.components
                    .iter()
                    .enumerate()
                    .filter_map(move |(index, c)| match c.running_state {
                        Some(RunningState::Delay { resume_at }) if resume_at <= now => {
                            Some((resume_at, *id, index))
                        }
                        _ => None,
                    })
            })
            .collect();
        due.sort();

        for (_, flow_state, component) in due {
            if let Some(slot) = self.component_state_mut(flow_state, component) {
                slot.running_state = None;
            }
            tracing::debug!(flow_state = %flow_state, component, "timer elapsed");
            self.complete(flow_state, component);
        }
    }

    /// Re-evaluates every watch subscription once and propagates changed values.
    fn poll_watches(&mut self) {
        let watches: Vec<(FlowStateId, usize, String)> = self
            .flow_states
            .iter()
            .flat_map(|(id, fs)| {
                fs.components
                    .iter()
                    .enumerate()
                    .filter_map(move |(index, c)| match &c.running_state {
                        Some(RunningState::Watch(sub)) => {
                            Some((*id, index, sub.expression.clone()))
                        }
                        _ => None,
                    })
            })
            .collect();

        for (flow_state, component, expression) in watches {
            let value = match self.evaluate_in(flow_state, component, &expression) {
                Ok(value) => value,
                Err(error) => {
                    let label = self.label(flow_state, component);
                    tracing::warn!(
                        component = %label,
                        %error,
                        "watched expression failed to evaluate"
                    );
                    continue;
                }
            };
            let changed = match self.component_state_mut(flow_state, component) {
                Some(slot) => match &mut slot.running_state {
                    Some(RunningState::Watch(sub)) if !sub.last_value.strict_equals(&value) => {
                        sub.last_value = value.clone();
                        true
                    }
                    _ => false,
                },
                None => false,
            };
            if changed {
                self.deliver(flow_state, component, "variable", value);
            }
        }
    }

    pub(super) fn create_flow_state(
        &mut self,
        flow_index: usize,
        parent: Option<(FlowStateId, usize)>,
    ) -> FlowStateId {
        let id = FlowStateId(self.next_flow_state);
        self.next_flow_state += 1;
        self.stats.flow_states_created += 1;

        let flow = &self.project.flows[flow_index];
        let (locals, failures) = DataContext::from_definitions(
            &flow.local_variables,
            &mut self.evaluator,
            &self.globals,
        );
        for (name, error) in failures {
            tracing::warn!(
                flow = %flow.name,
                variable = %name,
                %error,
                "local variable default failed to evaluate"
            );
        }

        let depth = parent
            .and_then(|(p, _)| self.flow_states.get(&p))
            .map(|p| p.depth + 1)
            .unwrap_or(0);
        let state = FlowState::new(id, flow_index, flow.components.len(), locals, parent, depth);
        if let Some(parent) = parent.and_then(|(p, _)| self.flow_states.get_mut(&p)) {
            parent.children.push(id);
        }
        self.flow_states.insert(id, state);
        tracing::debug!(flow = %flow.name, flow_state = %id, depth, "flow state created");
        id
    }

    pub(super) fn evaluate_in(
        &mut self,
        flow_state: FlowStateId,
        component: usize,
        expression: &str,
    ) -> Result<Value, EvaluationError> {
        let Runtime {
            flow_states,
            globals,
            evaluator,
            ..
        } = self;
        let Some(FlowState {
            components,
            data_context,
            ..
        }) = flow_states.get_mut(&flow_state)
        else {
            return evaluator.evaluate(expression, &*globals);
        };
        let scope = ComponentScope {
            inputs: components.get(component).map(|c| &c.inputs_data),
            locals: data_context,
            globals,
        };
        evaluator.evaluate(expression, &scope)
    }

    pub(super) fn assign_in(
        &mut self,
        flow_state: FlowStateId,
        component: usize,
        target: &str,
        value: Value,
    ) -> Result<(), EvaluationError> {
        let Runtime {
            flow_states,
            globals,
            evaluator,
            ..
        } = self;
        let Some(FlowState {
            components,
            data_context,
            ..
        }) = flow_states.get_mut(&flow_state)
        else {
            return evaluator.assign(target, value, globals);
        };
        let mut scope = ComponentScope {
            inputs: components.get(component).map(|c| &c.inputs_data),
            locals: data_context,
            globals,
        };
        evaluator.assign(target, value, &mut scope)
    }

    pub(super) fn component_state_mut(
        &mut self,
        flow_state: FlowStateId,
        component: usize,
    ) -> Option<&mut super::ComponentState> {
        self.flow_states
            .get_mut(&flow_state)?
            .components
            .get_mut(component)
    }

    pub(super) fn flow_state_ref(&self, flow_state: FlowStateId) -> Result<&FlowState, FlowError> {
        if self.root.is_none() {
            return Err(FlowError::NotStarted);
        }
        self.flow_states
            .get(&flow_state)
            .ok_or(FlowError::UnknownFlowState(flow_state.0))
    }

    pub(super) fn layout(
        &self,
        flow_state: FlowStateId,
        component: usize,
    ) -> Result<&ComponentLayout, FlowError> {
        let state = self.flow_state_ref(flow_state)?;
        self.graph.flows[state.flow_index]
            .layout(component)
            .ok_or(FlowError::UnknownComponent {
                flow_state: flow_state.0,
                component,
            })
    }

    pub(super) fn label(&self, flow_state: FlowStateId, component: usize) -> ComponentLabel {
        let flow = self
            .flow_states
            .get(&flow_state)
            .and_then(|s| self.project.flows.get(s.flow_index));
        match flow.and_then(|f| f.components.get(component).map(|c| (f, c))) {
            Some((flow, definition)) => ComponentLabel {
                flow: flow.name.clone(),
                component: definition.id.clone(),
                kind: definition.kind.type_name().to_string(),
            },
            None => ComponentLabel {
                flow: format!("{}", flow_state),
                component: component.to_string(),
                kind: "unknown".to_string(),
            },
        }
    }
}
