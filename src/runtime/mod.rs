//! The cooperative scheduler and the flow-state arena it drives.

pub mod clock;
pub mod context;
pub mod data_context;
pub mod flow_state;
pub mod host;
mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::ExecutionContext;
pub use data_context::{ComponentScope, DataContext};
pub use flow_state::{
    ComponentState, FlowState, FlowStateId, FlowStatus, RunningState, Subscription,
};
pub use host::{ComponentLabel, LogEntry, MemoryHost, RuntimeHost};

use crate::ast::Value;
use crate::config::RuntimeConfig;
use crate::error::{FlowError, ValidationError};
use crate::evaluator::{Evaluator, ExpressionEvaluator};
use crate::flow::{Project, ProjectGraph, validation};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeStatus {
    NotStarted,
    Running,
    Finished,
    Failed(String),
    Stopped,
}

/// Counters describing what the runtime has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub executed_components: u64,
    pub flow_states_created: u64,
    pub disposed_handles: u64,
    pub caught_errors: u64,
    pub reported_errors: u64,
}

/// Executes a project's flows.
pub struct Runtime<H: RuntimeHost = MemoryHost> {
    project: Arc<Project>,
    graph: Arc<ProjectGraph>,
    config: RuntimeConfig,
    host: H,
    clock: Arc<dyn Clock>,
    evaluator: Evaluator,
    globals: DataContext,
    flow_states: BTreeMap<FlowStateId, FlowState>,
    next_flow_state: usize,
    root: Option<FlowStateId>,
    queue: VecDeque<(FlowStateId, usize)>,
    status: RuntimeStatus,
    stats: RuntimeStats,
}

/// Builder for creating a `Runtime` with a host, clock and configuration.
pub struct RuntimeBuilder<H: RuntimeHost> {
    project: Project,
    host: H,
    config: RuntimeConfig,
    clock: Arc<dyn Clock>,
    global_overrides: Vec<(String, Value)>,
}

impl Runtime<MemoryHost> {
    /// Starts building a runtime with an in-memory host.
    pub fn builder(project: Project) -> RuntimeBuilder<MemoryHost> {
        RuntimeBuilder {
            project,
            host: MemoryHost::default(),
            config: RuntimeConfig::default(),
            clock: Arc::new(SystemClock::new()),
            global_overrides: Vec::new(),
        }
    }
}

impl<H: RuntimeHost> RuntimeBuilder<H> {
    pub fn host<T: RuntimeHost>(self, host: T) -> RuntimeBuilder<T> {
        RuntimeBuilder {
            project: self.project,
            host,
            config: self.config,
            clock: self.clock,
            global_overrides: self.global_overrides,
        }
    }

    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the declared default of a global variable.
    pub fn global(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.global_overrides.push((name.to_string(), value.into()));
        self
    }

    /// Validates the project and prepares the runtime. No flow is started yet.
    pub fn build(self) -> Result<Runtime<H>, FlowError> {
        validation::validate(&self.project)?;
        if let Some(entry) = &self.config.entry_flow {
            if self.project.find_flow(entry).is_none() {
                return Err(ValidationError::UnknownEntryFlow(entry.clone()).into());
            }
        }

        let mut evaluator = Evaluator::new();
        let (defaults, failures) = DataContext::from_definitions(
            &self.project.global_variables,
            &mut evaluator,
            &DataContext::new(),
        );
        for (name, error) in failures {
            tracing::warn!(variable = %name, %error, "global variable default failed to evaluate");
        }
        let globals = defaults.with_overrides(self.global_overrides);

        Ok(Runtime {
            graph: Arc::new(ProjectGraph::build(&self.project)),
            project: Arc::new(self.project),
            config: self.config,
            host: self.host,
            clock: self.clock,
            evaluator,
            globals,
            flow_states: BTreeMap::new(),
            next_flow_state: 0,
            root: None,
            queue: VecDeque::new(),
            status: RuntimeStatus::NotStarted,
            stats: RuntimeStats::default(),
        })
    }
}

impl<H: RuntimeHost> Runtime<H> {
    /// Creates the root flow state for the entry flow and queues its ready components.
    pub fn start(&mut self) -> Result<FlowStateId, FlowError> {
        let flow_index = match &self.config.entry_flow {
            Some(name) => self
                .project
                .find_flow(name)
                .map(|(i, _)| i)
                .ok_or_else(|| ValidationError::UnknownEntryFlow(name.clone()))?,
            None => 0,
        };
        if self.project.flows.is_empty() {
            return Err(ValidationError::UnknownEntryFlow("<none>".to_string()).into());
        }
        let root = self.create_flow_state(flow_index, None);
        self.root = Some(root);
        self.status = RuntimeStatus::Running;
        tracing::info!(flow = %self.project.flows[flow_index].name, "runtime started");
        self.start_flow(root)?;
        Ok(root)
    }

    /// Queues every component of the flow state that is ready to run without input.
    pub fn start_flow(&mut self, flow_state: FlowStateId) -> Result<(), FlowError> {
        self.flow_state_ref(flow_state)?;
        self.queue_ready_components(flow_state);
        Ok(())
    }

    fn queue_ready_components(&mut self, flow_state: FlowStateId) {
        self.queue_ready(flow_state);
        self.check_finished(flow_state);
    }

    pub(super) fn queue_ready(&mut self, flow_state: FlowStateId) {
        let count = self
            .flow_states
            .get(&flow_state)
            .map(|s| s.components.len())
            .unwrap_or(0);
        for component in 0..count {
            if self.is_ready(flow_state, component) {
                self.enqueue(flow_state, component);
            }
        }
    }

    /// Delivers `value` on an output pin to every wired input.
    pub fn propagate_value(
        &mut self,
        flow_state: FlowStateId,
        component: usize,
        output: &str,
        value: Value,
        label: Option<&str>,
    ) -> Result<(), FlowError> {
        let layout = self.layout(flow_state, component)?;
        if layout.output(output).is_none() {
            return Err(FlowError::UnknownOutput {
                component: self.label(flow_state, component).component,
                output: output.to_string(),
            });
        }
        if let Some(label) = label {
            tracing::trace!(
                flow_state = %flow_state,
                component,
                output,
                label,
                "propagating labelled value"
            );
        }
        self.deliver(flow_state, component, output, value);
        Ok(())
    }

    /// Writes through an assignable expression in the component's scope.
    pub fn assign_value(
        &mut self,
        flow_state: FlowStateId,
        component: usize,
        target: &str,
        value: Value,
    ) -> Result<(), FlowError> {
        self.layout(flow_state, component)?;
        let Runtime {
            flow_states,
            globals,
            evaluator,
            ..
        } = self;
        let state = flow_states
            .get_mut(&flow_state)
            .ok_or(FlowError::UnknownFlowState(flow_state.0))?;
        let FlowState {
            components,
            data_context,
            ..
        } = state;
        let mut scope = ComponentScope {
            inputs: components.get(component).map(|c| &c.inputs_data),
            locals: data_context,
            globals,
        };
        evaluator.assign(target, value, &mut scope)?;
        Ok(())
    }

    /// Evaluates an expression in the component's scope.
    pub fn eval_expression(
        &mut self,
        flow_state: FlowStateId,
        component: usize,
        expression: &str,
    ) -> Result<Value, FlowError> {
        self.layout(flow_state, component)?;
        let Runtime {
            flow_states,
            globals,
            evaluator,
            ..
        } = self;
        let state = flow_states
            .get_mut(&flow_state)
            .ok_or(FlowError::UnknownFlowState(flow_state.0))?;
        let FlowState {
            components,
            data_context,
            ..
        } = state;
        let scope = ComponentScope {
            inputs: components.get(component).map(|c| &c.inputs_data),
            locals: data_context,
            globals,
        };
        Ok(evaluator.evaluate(expression, &scope)?)
    }

    pub fn component_running_state(
        &self,
        flow_state: FlowStateId,
        component: usize,
    ) -> Option<&RunningState> {
        self.flow_states
            .get(&flow_state)?
            .components
            .get(component)?
            .running_state
            .as_ref()
    }

    pub fn set_component_running_state(
        &mut self,
        flow_state: FlowStateId,
        component: usize,
        running_state: Option<RunningState>,
    ) -> Result<(), FlowError> {
        let state = self
            .flow_states
            .get_mut(&flow_state)
            .ok_or(FlowError::UnknownFlowState(flow_state.0))?;
        let slot = state
            .components
            .get_mut(component)
            .ok_or(FlowError::UnknownComponent {
                flow_state: flow_state.0,
                component,
            })?;
        slot.running_state = running_state;
        Ok(())
    }

    pub fn read_settings(&mut self, key: &str) -> Option<Value> {
        self.host.read_setting(key)
    }

    pub fn write_settings(&mut self, key: &str, value: Value) {
        self.host.write_setting(key, value);
    }

    pub fn log_info(&mut self, value: &Value, flow_state: FlowStateId, component: usize) {
        let label = self.label(flow_state, component);
        tracing::info!(component = %label, %value, "log");
        self.host.log_info(value, &label);
    }

    /// Sets a global variable from outside the flows; watches observe it on the next tick.
    pub fn set_global(&mut self, name: &str, value: Value) -> Result<(), FlowError> {
        let slot = self
            .globals
            .get_mut(name)
            .ok_or_else(|| crate::error::EvaluationError::UndeclaredVariable(name.to_string()))?;
        *slot = value;
        Ok(())
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    pub fn globals(&self) -> &DataContext {
        &self.globals
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn graph(&self) -> &ProjectGraph {
        &self.graph
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn status(&self) -> &RuntimeStatus {
        &self.status
    }

    pub fn stats(&self) -> RuntimeStats {
        self.stats
    }

    pub fn root(&self) -> Option<FlowStateId> {
        self.root
    }

    pub fn flow_state(&self, id: FlowStateId) -> Option<&FlowState> {
        self.flow_states.get(&id)
    }

    /// Live flow states, in creation order.
    pub fn flow_states(&self) -> impl Iterator<Item = &FlowState> {
        self.flow_states.values()
    }

    pub fn pending_work(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Runs ticks until the queue is empty, advancing nothing but the scheduler.
    /// Timers only fire if the clock has reached them.
    pub fn run_until_idle(&mut self) -> usize {
        let mut executed = 0;
        loop {
            let step = self.tick();
            executed += step;
            if step == 0 || !self.pending_work() {
                return executed;
            }
        }
    }

    /// Drives the runtime in real time until the root flow ends or nothing
    /// remains that could make progress.
    pub async fn run(&mut self) -> RuntimeStatus {
        if self.status == RuntimeStatus::NotStarted {
            if let Err(error) = self.start() {
                tracing::error!(%error, "runtime failed to start");
                self.status = RuntimeStatus::Failed(error.to_string());
            }
        }
        while self.status == RuntimeStatus::Running {
            self.tick();
            if self.status != RuntimeStatus::Running || self.pending_work() {
                continue;
            }
            match self.next_deadline() {
                Some(deadline) => {
                    let now = self.clock.now();
                    tokio::time::sleep(deadline.saturating_sub(now)).await;
                }
                None => {
                    tracing::debug!("no pending timers or queued components, leaving run loop");
                    break;
                }
            }
        }
        self.status.clone()
    }

    /// Earliest pending timer across all flow states.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.flow_states
            .values()
            .flat_map(|fs| fs.components.iter())
            .filter_map(|c| match c.running_state {
                Some(RunningState::Delay { resume_at }) => Some(resume_at),
                _ => None,
            })
            .min()
    }

    /// Stops every flow state and disposes all live handles.
    pub fn stop(&mut self) {
        let ids: Vec<FlowStateId> = self.flow_states.keys().copied().collect();
        for id in ids {
            self.dispose_handles(id);
        }
        self.queue.clear();
        if matches!(self.status, RuntimeStatus::Running | RuntimeStatus::NotStarted) {
            self.status = RuntimeStatus::Stopped;
        }
        tracing::info!(disposed = self.stats.disposed_handles, "runtime stopped");
    }
}
