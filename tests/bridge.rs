//! Tests for the renderer/worker message protocol over the interpreted engine.
mod common;
use common::*;
use nagare::bridge::{
    EvalPropertyRequest, GlobalVariableValue, InitMessage, InterpretedEngine, PointerEvent,
    RendererToWorkerMessage, WheelEvent, WidgetAction, WorkerBridge,
};
use nagare::error::BridgeError;
use nagare::prelude::*;

const CLICK: usize = 1;
const EVAL: usize = 3;
const BROKEN: usize = 4;

/// Root flow kept alive by a watch, with an Input a widget can drive.
fn dashboard_project() -> Project {
    let main = flow(
        "main",
        vec![
            component(
                "watch",
                ComponentKind::WatchVariable {
                    variable: "x".to_string(),
                },
            ),
            component(
                "click",
                ComponentKind::Input {
                    name: "click".to_string(),
                    value_type: "any".to_string(),
                },
            ),
            log("print", "\"clicked\""),
            component(
                "eval",
                ComponentKind::EvalExpr {
                    expression: "x + 1".to_string(),
                },
            ),
            component(
                "broken",
                ComponentKind::EvalExpr {
                    expression: "missing + 1".to_string(),
                },
            ),
        ],
        vec![seq("click", "print")],
    );
    let mut project = project(vec![main]);
    project.global_variables = vec![VariableDefinition::new("x", "0")];
    project
}

fn init_message(project: &Project, x: i64) -> RendererToWorkerMessage {
    RendererToWorkerMessage {
        init: Some(InitMessage {
            assets: CompiledProject::interpreted(project)
                .unwrap()
                .to_bytes()
                .unwrap(),
            global_variables: vec![GlobalVariableValue {
                index: 0,
                value: Value::Integer(x),
            }],
        }),
        ..Default::default()
    }
}

fn eval_request(component_index: usize, property_value_index: usize) -> EvalPropertyRequest {
    EvalPropertyRequest {
        flow_state_index: 0,
        component_index,
        property_index: 0,
        property_value_index,
        indexes: vec![],
    }
}

fn initialized_bridge() -> WorkerBridge<InterpretedEngine> {
    let mut bridge = WorkerBridge::new(InterpretedEngine::default());
    bridge
        .handle(init_message(&dashboard_project(), 41))
        .expect("init should succeed");
    bridge
}

#[test]
fn test_messages_before_init_are_rejected() {
    let mut bridge = WorkerBridge::new(InterpretedEngine::default());

    let error = bridge.handle(RendererToWorkerMessage::default()).unwrap_err();
    assert_eq!(error, BridgeError::NotInitialized);

    let action = RendererToWorkerMessage {
        execute_widget_action: Some(WidgetAction {
            flow_state_index: 0,
            component_index: CLICK,
            output_index: 0,
            value: Value::Null,
        }),
        ..Default::default()
    };
    assert_eq!(bridge.handle(action).unwrap_err(), BridgeError::NotInitialized);
    assert!(!bridge.is_initialized());
}

#[test]
fn test_corrupt_assets_fail_init() {
    let mut bridge = WorkerBridge::new(InterpretedEngine::default());
    let message = RendererToWorkerMessage {
        init: Some(InitMessage {
            assets: vec![1, 2, 3],
            global_variables: vec![],
        }),
        ..Default::default()
    };

    assert!(matches!(bridge.handle(message), Err(BridgeError::Engine(_))));
    assert!(!bridge.is_initialized());
    assert!(bridge.engine().runtime().is_none());
}

#[test]
fn test_init_starts_root_and_evaluates_properties() {
    let mut bridge = WorkerBridge::new(InterpretedEngine::default());
    let mut message = init_message(&dashboard_project(), 41);
    message.eval_properties = vec![eval_request(EVAL, 7), eval_request(BROKEN, 8)];

    let reply = bridge.handle(message).unwrap().expect("init gets a reply");
    assert!(reply.screen.is_none());

    let values = reply.property_values.unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(values[0].property_value_index, 7);
    assert_eq!(values[0].value, Value::Integer(42));
    assert_eq!(values[0].error, None);

    assert_eq!(values[1].property_value_index, 8);
    assert_eq!(values[1].value, Value::Undefined);
    assert!(values[1].error.as_deref().unwrap().contains("missing"));

    let runtime = bridge.engine().runtime().unwrap();
    assert_eq!(runtime.status(), &RuntimeStatus::Running);
}

#[test]
fn test_reply_without_requests_has_no_property_values() {
    let mut bridge = initialized_bridge();
    let reply = bridge
        .handle(RendererToWorkerMessage::default())
        .unwrap()
        .unwrap();
    assert!(reply.property_values.is_none());
}

#[test]
fn test_widget_action_is_applied_without_reply() {
    let mut bridge = initialized_bridge();
    let action = RendererToWorkerMessage {
        execute_widget_action: Some(WidgetAction {
            flow_state_index: 0,
            component_index: CLICK,
            output_index: 0,
            value: Value::Null,
        }),
        ..Default::default()
    };

    assert_eq!(bridge.handle(action).unwrap(), None);
    let runtime = bridge.engine().runtime().unwrap();
    assert!(runtime.host().messages().is_empty());

    // The next main loop iteration runs what the action made ready.
    bridge.handle(RendererToWorkerMessage::default()).unwrap();
    let runtime = bridge.engine().runtime().unwrap();
    assert_eq!(runtime.host().messages(), vec!["clicked"]);
}

#[test]
fn test_widget_action_on_unknown_output_is_an_engine_error() {
    let mut bridge = initialized_bridge();
    let action = RendererToWorkerMessage {
        execute_widget_action: Some(WidgetAction {
            flow_state_index: 0,
            component_index: CLICK,
            output_index: 5,
            value: Value::Null,
        }),
        ..Default::default()
    };

    assert!(matches!(bridge.handle(action), Err(BridgeError::Engine(_))));
}

#[test]
fn test_global_updates_are_applied_by_index() {
    let mut bridge = initialized_bridge();
    let message = RendererToWorkerMessage {
        update_global_variables: vec![GlobalVariableValue {
            index: 0,
            value: Value::Integer(100),
        }],
        eval_properties: vec![eval_request(EVAL, 0)],
        ..Default::default()
    };

    let reply = bridge.handle(message).unwrap().unwrap();
    assert_eq!(reply.property_values.unwrap()[0].value, Value::Integer(101));

    let out_of_range = RendererToWorkerMessage {
        update_global_variables: vec![GlobalVariableValue {
            index: 5,
            value: Value::Null,
        }],
        ..Default::default()
    };
    let error = bridge.handle(out_of_range).unwrap_err();
    assert!(error.to_string().contains("no global variable at index 5"));
}

#[test]
fn test_input_events_reach_engine() {
    let mut bridge = initialized_bridge();
    let message = RendererToWorkerMessage {
        wheel: Some(WheelEvent {
            delta_y: 3,
            clicked: true,
        }),
        pointer_events: vec![
            PointerEvent {
                x: 1,
                y: 2,
                pressed: true,
            },
            PointerEvent {
                x: 10,
                y: 20,
                pressed: false,
            },
        ],
        ..Default::default()
    };
    bridge.handle(message).unwrap();

    // A still wheel is not forwarded.
    let idle_wheel = RendererToWorkerMessage {
        wheel: Some(WheelEvent {
            delta_y: 0,
            clicked: false,
        }),
        ..Default::default()
    };
    bridge.handle(idle_wheel).unwrap();

    let engine = bridge.engine();
    assert_eq!(engine.wheel(), (3, 1));
    assert_eq!(
        engine.last_pointer(),
        Some(PointerEvent {
            x: 10,
            y: 20,
            pressed: false,
        })
    );
}

#[test]
fn test_messages_serialize_as_json() {
    let json = r#"{
        "init": null,
        "wheel": { "delta_y": -2, "clicked": false },
        "execute_widget_action": null
    }"#;
    let message: RendererToWorkerMessage = serde_json::from_str(json).unwrap();
    assert_eq!(message.wheel.unwrap().delta_y, -2);
    assert!(message.pointer_events.is_empty());
    assert!(message.eval_properties.is_empty());
}
