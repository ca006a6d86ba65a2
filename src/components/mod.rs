//! The closed set of component kinds and their capability table:
//! pins, execution and binary serialization.

mod actions;
mod control;
mod logic;
mod stateful;

pub use control::call_pin_indices;

use crate::bytecode::{Assets, DataBuffer};
use crate::error::{BuildError, ExecutionError};
use crate::flow::{ANY_TYPE, PinSpec, Project, SEQ_IN, SEQ_OUT};
use crate::runtime::{ExecutionContext, RuntimeHost};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of a successful component execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    /// Advance normally; `@seqout` fires when declared.
    Completed,
    /// The scheduler resumes the component at `resume_at`, then it completes.
    Suspended { resume_at: Duration },
    /// A watch subscription is live in the running state; advance normally.
    Subscribed,
    /// The component sequences itself; `@seqout` must not auto-fire.
    NoAdvance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOperator {
    Equal,
    NotEqual,
    Less,
    Greater,
    LessOrEqual,
    GreaterOrEqual,
    Not,
    And,
    Or,
    Xor,
    Between,
}

impl CompareOperator {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOperator::Equal => "=",
            CompareOperator::NotEqual => "<>",
            CompareOperator::Less => "<",
            CompareOperator::Greater => ">",
            CompareOperator::LessOrEqual => "<=",
            CompareOperator::GreaterOrEqual => ">=",
            CompareOperator::Not => "NOT",
            CompareOperator::And => "AND",
            CompareOperator::Or => "OR",
            CompareOperator::Xor => "XOR",
            CompareOperator::Between => "BETWEEN",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        [
            CompareOperator::Equal,
            CompareOperator::NotEqual,
            CompareOperator::Less,
            CompareOperator::Greater,
            CompareOperator::LessOrEqual,
            CompareOperator::GreaterOrEqual,
            CompareOperator::Not,
            CompareOperator::And,
            CompareOperator::Or,
            CompareOperator::Xor,
            CompareOperator::Between,
        ]
        .into_iter()
        .find(|op| op.symbol() == symbol)
    }

    /// Code written into binary builds.
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// One `(condition, output)` test of a Switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchTest {
    pub condition: String,
    pub output_name: String,
}

impl SwitchTest {
    pub fn new(condition: &str, output_name: &str) -> Self {
        Self {
            condition: condition.to_string(),
            output_name: output_name.to_string(),
        }
    }
}

/// Every component kind with its static configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ComponentKind {
    Start,
    End,
    Input {
        name: String,
        value_type: String,
    },
    Output {
        name: String,
        value_type: String,
    },
    EvalExpr {
        expression: String,
    },
    SetVariable {
        variable: String,
        value: String,
    },
    Switch {
        tests: Vec<SwitchTest>,
    },
    Compare {
        operator: CompareOperator,
        a: String,
        b: String,
        c: String,
    },
    IsTrue {
        value: String,
    },
    Constant {
        value: String,
    },
    Counter {
        count_value: i64,
    },
    Loop {
        variable: String,
        from: String,
        to: String,
        step: String,
    },
    CallAction {
        action: String,
    },
    Delay {
        milliseconds: String,
    },
    Error {
        message: String,
    },
    CatchError,
    WatchVariable {
        variable: String,
    },
    DateNow,
    ReadSetting {
        key: String,
    },
    WriteSettings {
        key: String,
        value: String,
    },
    Log {
        value: String,
    },
    ShowPage {
        page: String,
    },
}

impl ComponentKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ComponentKind::Start => "Start",
            ComponentKind::End => "End",
            ComponentKind::Input { .. } => "Input",
            ComponentKind::Output { .. } => "Output",
            ComponentKind::EvalExpr { .. } => "EvalExpr",
            ComponentKind::SetVariable { .. } => "SetVariable",
            ComponentKind::Switch { .. } => "Switch",
            ComponentKind::Compare { .. } => "Compare",
            ComponentKind::IsTrue { .. } => "IsTrue",
            ComponentKind::Constant { .. } => "Constant",
            ComponentKind::Counter { .. } => "Counter",
            ComponentKind::Loop { .. } => "Loop",
            ComponentKind::CallAction { .. } => "CallAction",
            ComponentKind::Delay { .. } => "Delay",
            ComponentKind::Error { .. } => "Error",
            ComponentKind::CatchError => "CatchError",
            ComponentKind::WatchVariable { .. } => "WatchVariable",
            ComponentKind::DateNow => "DateNow",
            ComponentKind::ReadSetting { .. } => "ReadSetting",
            ComponentKind::WriteSettings { .. } => "WriteSettings",
            ComponentKind::Log { .. } => "Log",
            ComponentKind::ShowPage { .. } => "ShowPage",
        }
    }

    /// Stable numeric id used by binary builds. `None` for dashboard-only kinds.
    pub fn flow_component_id(&self) -> Option<u16> {
        Some(match self {
            ComponentKind::Start => 1001,
            ComponentKind::End => 1002,
            ComponentKind::Input { .. } => 1003,
            ComponentKind::Output { .. } => 1004,
            ComponentKind::WatchVariable { .. } => 1005,
            ComponentKind::EvalExpr { .. } => 1006,
            ComponentKind::SetVariable { .. } => 1007,
            ComponentKind::Switch { .. } => 1008,
            ComponentKind::Compare { .. } => 1009,
            ComponentKind::IsTrue { .. } => 1010,
            ComponentKind::Constant { .. } => 1011,
            ComponentKind::Log { .. } => 1012,
            ComponentKind::CallAction { .. } => 1013,
            ComponentKind::Delay { .. } => 1014,
            ComponentKind::Error { .. } => 1015,
            ComponentKind::CatchError => 1016,
            ComponentKind::Counter { .. } => 1017,
            ComponentKind::Loop { .. } => 1018,
            ComponentKind::ShowPage { .. } => 1019,
            ComponentKind::DateNow
            | ComponentKind::ReadSetting { .. }
            | ComponentKind::WriteSettings { .. } => return None,
        })
    }

    pub fn inputs(&self, project: &Project) -> Vec<PinSpec> {
        let seq_in = || PinSpec::sequence(SEQ_IN);
        match self {
            ComponentKind::Start | ComponentKind::Input { .. } | ComponentKind::DateNow => vec![],
            ComponentKind::End | ComponentKind::Counter { .. } | ComponentKind::Delay { .. } => {
                vec![seq_in()]
            }
            ComponentKind::Error { .. }
            | ComponentKind::Log { .. }
            | ComponentKind::ShowPage { .. } => vec![seq_in()],
            ComponentKind::Output { value_type, .. } => vec![seq_in().typed(value_type)],
            ComponentKind::Loop { .. } => {
                vec![PinSpec::sequence("start"), PinSpec::sequence("next")]
            }
            ComponentKind::CallAction { action } => control::call_inputs(project, action),
            ComponentKind::CatchError => vec![PinSpec::data("message", "string").optional()],
            ComponentKind::EvalExpr { .. }
            | ComponentKind::SetVariable { .. }
            | ComponentKind::Switch { .. }
            | ComponentKind::Compare { .. }
            | ComponentKind::IsTrue { .. }
            | ComponentKind::Constant { .. }
            | ComponentKind::WatchVariable { .. }
            | ComponentKind::ReadSetting { .. }
            | ComponentKind::WriteSettings { .. } => vec![seq_in().optional()],
        }
    }

    pub fn outputs(&self, project: &Project) -> Vec<PinSpec> {
        let seq_out = || PinSpec::sequence(SEQ_OUT);
        let true_false = || vec![PinSpec::sequence("True"), PinSpec::sequence("False")];
        match self {
            ComponentKind::End | ComponentKind::Output { .. } | ComponentKind::Error { .. } => {
                vec![]
            }
            ComponentKind::Start | ComponentKind::Log { .. } | ComponentKind::ShowPage { .. } => {
                vec![seq_out()]
            }
            ComponentKind::Delay { .. } => vec![seq_out()],
            ComponentKind::Input { value_type, .. } => vec![seq_out().typed(value_type)],
            ComponentKind::EvalExpr { .. } => {
                vec![seq_out().optional(), PinSpec::data("result", ANY_TYPE)]
            }
            ComponentKind::SetVariable { .. } | ComponentKind::WriteSettings { .. } => {
                vec![seq_out().optional()]
            }
            ComponentKind::Switch { tests } => {
                let mut outputs = vec![seq_out().optional()];
                outputs.extend(tests.iter().map(|t| PinSpec::sequence(&t.output_name)));
                outputs
            }
            ComponentKind::Compare { .. } | ComponentKind::IsTrue { .. } => true_false(),
            ComponentKind::Constant { .. } => {
                vec![seq_out().optional(), PinSpec::data("value", ANY_TYPE)]
            }
            ComponentKind::Counter { .. } => vec![seq_out().optional(), PinSpec::sequence("done")],
            ComponentKind::Loop { .. } => vec![seq_out(), PinSpec::sequence("done")],
            ComponentKind::CallAction { action } => control::call_outputs(project, action),
            ComponentKind::CatchError => {
                vec![seq_out().optional(), PinSpec::data("Message", "string")]
            }
            ComponentKind::WatchVariable { .. } => {
                vec![seq_out().optional(), PinSpec::data("variable", ANY_TYPE)]
            }
            ComponentKind::DateNow => vec![PinSpec::data("value", "date")],
            ComponentKind::ReadSetting { .. } => {
                vec![seq_out().optional(), PinSpec::data("value", ANY_TYPE)]
            }
        }
    }

    /// Expression-valued properties, in the order they are numbered for
    /// binary builds and property evaluation requests.
    pub fn expression_properties(&self) -> Vec<(&'static str, &str)> {
        match self {
            ComponentKind::EvalExpr { expression } => vec![("expression", expression)],
            ComponentKind::SetVariable { value, .. } => vec![("value", value)],
            ComponentKind::Compare { a, b, c, .. } => vec![("A", a), ("B", b), ("C", c)],
            ComponentKind::IsTrue { value } | ComponentKind::Log { value } => {
                vec![("value", value)]
            }
            ComponentKind::Constant { value } => vec![("value", value)],
            ComponentKind::Loop { from, to, step, .. } => {
                vec![("from", from), ("to", to), ("step", step)]
            }
            ComponentKind::Delay { milliseconds } => vec![("milliseconds", milliseconds)],
            ComponentKind::Error { message } => vec![("message", message)],
            ComponentKind::WatchVariable { variable } => vec![("variable", variable)],
            ComponentKind::ReadSetting { key } => vec![("key", key)],
            ComponentKind::WriteSettings { key, value } => vec![("key", key), ("value", value)],
            _ => vec![],
        }
    }

    pub fn execute<H: RuntimeHost>(
        &self,
        ctx: &mut ExecutionContext<'_, H>,
    ) -> Result<Execution, ExecutionError> {
        match self {
            ComponentKind::Start => Ok(Execution::Completed),
            ComponentKind::End => control::end(ctx),
            ComponentKind::Input { .. } => Ok(Execution::Completed),
            ComponentKind::Output { name, .. } => control::output(ctx, name),
            ComponentKind::EvalExpr { expression } => logic::eval_expr(ctx, expression),
            ComponentKind::SetVariable { variable, value } => {
                logic::set_variable(ctx, variable, value)
            }
            ComponentKind::Switch { tests } => logic::switch(ctx, tests),
            ComponentKind::Compare { operator, a, b, c } => logic::compare(ctx, *operator, a, b, c),
            ComponentKind::IsTrue { value } => logic::is_true(ctx, value),
            ComponentKind::Constant { value } => logic::constant(ctx, value),
            ComponentKind::Counter { count_value } => stateful::counter(ctx, *count_value),
            ComponentKind::Loop {
                variable,
                from,
                to,
                step,
            } => stateful::run_loop(ctx, variable, from, to, step),
            ComponentKind::CallAction { action } => control::call_action(ctx, action),
            ComponentKind::Delay { milliseconds } => control::delay(ctx, milliseconds),
            ComponentKind::Error { message } => control::raise(ctx, message),
            ComponentKind::CatchError => control::catch_error(ctx),
            ComponentKind::WatchVariable { variable } => stateful::watch_variable(ctx, variable),
            ComponentKind::DateNow => actions::date_now(ctx),
            ComponentKind::ReadSetting { key } => actions::read_setting(ctx, key),
            ComponentKind::WriteSettings { key, value } => actions::write_settings(ctx, key, value),
            ComponentKind::Log { value } => actions::log(ctx, value),
            ComponentKind::ShowPage { page } => control::show_page(ctx, page),
        }
    }

    /// Writes the kind-specific part of the component record.
    pub fn build_static(
        &self,
        assets: &mut Assets,
        component_id: &str,
        buffer: &mut DataBuffer,
    ) -> Result<(), BuildError> {
        match self {
            ComponentKind::Input { .. } => {
                control::build_boundary(assets, component_id, false, buffer)
            }
            ComponentKind::Output { .. } => {
                control::build_boundary(assets, component_id, true, buffer)
            }
            ComponentKind::SetVariable { variable, .. } => {
                logic::build_assignable(assets, component_id, variable, buffer)
            }
            ComponentKind::Switch { tests } => {
                logic::build_switch(assets, component_id, tests, buffer)
            }
            ComponentKind::Compare { operator, .. } => {
                buffer.write_u8(operator.code());
                Ok(())
            }
            ComponentKind::Constant { value } => {
                logic::build_constant(assets, component_id, value, buffer)
            }
            ComponentKind::Counter { count_value } => {
                let count = i32::try_from(*count_value).map_err(|_| BuildError::Overflow {
                    component: component_id.to_string(),
                    width: "i32",
                    value: *count_value,
                })?;
                buffer.write_i32(count);
                Ok(())
            }
            ComponentKind::Loop { variable, .. } => {
                logic::build_assignable(assets, component_id, variable, buffer)
            }
            ComponentKind::CallAction { action } => {
                control::build_call(assets, component_id, action, buffer)
            }
            ComponentKind::ShowPage { page } => {
                control::build_page(assets, component_id, page, buffer)
            }
            ComponentKind::DateNow
            | ComponentKind::ReadSetting { .. }
            | ComponentKind::WriteSettings { .. } => Err(BuildError::Unsupported {
                component: component_id.to_string(),
                kind: self.type_name(),
            }),
            _ => Ok(()),
        }
    }
}
