use super::DataContext;
use crate::ast::Value;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Index of a flow state in the runtime's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowStateId(pub usize);

impl fmt::Display for FlowStateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowStatus {
    Running,
    Finished,
    /// Ended by an error no Catch-error component absorbed.
    Failed(String),
}

/// A watched expression and the value it had when last propagated.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    pub expression: String,
    pub last_value: Value,
}

/// State a component keeps across invocations within one flow state.
#[derive(Debug, Clone, PartialEq)]
pub enum RunningState {
    Counter { remaining: i64 },
    Loop { value: Value, to: Value, step: Value },
    Watch(Subscription),
    /// Pending timer; the component completes once the clock reaches `resume_at`.
    Delay { resume_at: Duration },
}

impl RunningState {
    /// Live handles must be disposed when their flow state goes away.
    pub fn is_live_handle(&self) -> bool {
        matches!(self, RunningState::Watch(_) | RunningState::Delay { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ComponentState {
    /// Most recent value delivered to each input pin.
    pub inputs_data: AHashMap<String, Value>,
    pub running_state: Option<RunningState>,
    pub(crate) queued: bool,
    /// A data input changed while the component was queued or suspended.
    pub(crate) redelivered: bool,
    /// Sequence triggers that arrived while queued or suspended, one run each.
    pub(crate) pending_sequence: VecDeque<(String, Value)>,
}

impl ComponentState {
    pub fn is_suspended(&self) -> bool {
        matches!(self.running_state, Some(RunningState::Delay { .. }))
    }

    pub fn is_subscribed(&self) -> bool {
        matches!(self.running_state, Some(RunningState::Watch(_)))
    }
}

/// One live instance of a flow.
#[derive(Debug, Clone)]
pub struct FlowState {
    pub id: FlowStateId,
    pub flow_index: usize,
    pub parent: Option<FlowStateId>,
    /// The call-action component in the parent that spawned this flow state.
    pub call_site: Option<usize>,
    pub data_context: DataContext,
    pub components: Vec<ComponentState>,
    /// Components started but not finished, plus one while the caller awaits `End`.
    pub num_active_components: usize,
    pub children: Vec<FlowStateId>,
    pub status: FlowStatus,
    pub depth: usize,
    pub(crate) awaiting_return: bool,
}

impl FlowState {
    pub(crate) fn new(
        id: FlowStateId,
        flow_index: usize,
        component_count: usize,
        data_context: DataContext,
        parent: Option<(FlowStateId, usize)>,
        depth: usize,
    ) -> Self {
        Self {
            id,
            flow_index,
            parent: parent.map(|(p, _)| p),
            call_site: parent.map(|(_, c)| c),
            data_context,
            components: vec![ComponentState::default(); component_count],
            num_active_components: 0,
            children: Vec::new(),
            status: FlowStatus::Running,
            depth,
            awaiting_return: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status != FlowStatus::Running
    }

    pub fn has_subscriptions(&self) -> bool {
        self.components.iter().any(ComponentState::is_subscribed)
    }

    /// Nothing left to run, wait for or react to.
    pub fn is_idle(&self) -> bool {
        self.num_active_components == 0 && self.children.is_empty() && !self.has_subscriptions()
    }

    pub fn component(&self, index: usize) -> Option<&ComponentState> {
        self.components.get(index)
    }
}
