//! Common test utilities for building projects and driving runtimes.
use nagare::prelude::*;
use std::sync::Arc;

/// Places a component in a flow.
#[allow(dead_code)]
pub fn component(id: &str, kind: ComponentKind) -> ComponentDefinition {
    ComponentDefinition::new(id, kind)
}

/// A Log component evaluating `value`.
#[allow(dead_code)]
pub fn log(id: &str, value: &str) -> ComponentDefinition {
    component(
        id,
        ComponentKind::Log {
            value: value.to_string(),
        },
    )
}

/// Sequence wire from `source.@seqout` to `target.@seqin`.
#[allow(dead_code)]
pub fn seq(source: &str, target: &str) -> WireDefinition {
    WireDefinition::new(source, "@seqout", target, "@seqin")
}

#[allow(dead_code)]
pub fn wire(source: &str, output: &str, target: &str, input: &str) -> WireDefinition {
    WireDefinition::new(source, output, target, input)
}

#[allow(dead_code)]
pub fn flow(
    name: &str,
    components: Vec<ComponentDefinition>,
    wires: Vec<WireDefinition>,
) -> FlowDefinition {
    FlowDefinition {
        name: name.to_string(),
        components,
        wires,
        local_variables: vec![],
    }
}

#[allow(dead_code)]
pub fn project(flows: Vec<FlowDefinition>) -> Project {
    Project {
        flows,
        ..Default::default()
    }
}

/// Builds and starts a runtime, then runs it until nothing is queued.
#[allow(dead_code)]
pub fn run_to_idle(project: Project) -> Runtime {
    let mut runtime = Runtime::builder(project)
        .build()
        .expect("project should be valid");
    runtime.start().expect("runtime should start");
    runtime.run_until_idle();
    runtime
}

/// Builds and starts a runtime driven by a manual clock. Nothing has run yet.
#[allow(dead_code)]
pub fn manual_runtime(project: Project) -> (Runtime, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let mut runtime = Runtime::builder(project)
        .clock(clock.clone())
        .build()
        .expect("project should be valid");
    runtime.start().expect("runtime should start");
    (runtime, clock)
}

/// Index of a component in a flow, by id.
#[allow(dead_code)]
pub fn index_of(project: &Project, flow: &str, id: &str) -> usize {
    project
        .find_flow(flow)
        .and_then(|(_, f)| f.component_index(id))
        .expect("component should exist")
}

/// A flow that counts `i` from `from` to `to` and logs every value, then "done".
#[allow(dead_code)]
pub fn counting_loop(from: &str, to: &str, step: &str) -> Project {
    let mut main = flow(
        "main",
        vec![
            component("start", ComponentKind::Start),
            component(
                "loop",
                ComponentKind::Loop {
                    variable: "i".to_string(),
                    from: from.to_string(),
                    to: to.to_string(),
                    step: step.to_string(),
                },
            ),
            log("body", "i"),
            log("finished", "\"done\""),
        ],
        vec![
            wire("start", "@seqout", "loop", "start"),
            seq("loop", "body"),
            wire("body", "@seqout", "loop", "next"),
            wire("loop", "done", "finished", "@seqin"),
        ],
    );
    main.local_variables = vec![VariableDefinition::new("i", "0")];
    project(vec![main])
}

/// A callable flow that doubles its `x` input and returns it on `result`.
#[allow(dead_code)]
pub fn doubling_flow() -> FlowDefinition {
    flow(
        "double",
        vec![
            component(
                "in_x",
                ComponentKind::Input {
                    name: "x".to_string(),
                    value_type: "any".to_string(),
                },
            ),
            component(
                "eval",
                ComponentKind::EvalExpr {
                    expression: "x * 2".to_string(),
                },
            )
            .with_inputs(&["x"]),
            component(
                "out_result",
                ComponentKind::Output {
                    name: "result".to_string(),
                    value_type: "any".to_string(),
                },
            ),
            component("end", ComponentKind::End),
        ],
        vec![
            wire("in_x", "@seqout", "eval", "x"),
            wire("eval", "result", "out_result", "@seqin"),
            seq("eval", "end"),
        ],
    )
}

/// A root flow calling `double` with 21 and logging what comes back.
#[allow(dead_code)]
pub fn doubling_project() -> Project {
    let main = flow(
        "main",
        vec![
            component("start", ComponentKind::Start),
            component(
                "twenty_one",
                ComponentKind::Constant {
                    value: "21".to_string(),
                },
            ),
            component(
                "call",
                ComponentKind::CallAction {
                    action: "double".to_string(),
                },
            ),
            log("print", "v").with_inputs(&["v"]),
        ],
        vec![
            seq("start", "call"),
            wire("twenty_one", "value", "call", "in_x"),
            wire("call", "out_result", "print", "v"),
            seq("call", "print"),
        ],
    );
    project(vec![main, doubling_flow()])
}
