//! Integration tests for Nagare
//!
//! End-to-end runs of whole projects: scheduling, nested flows, timers,
//! watches and error propagation working together.
//!
mod common;
use common::*;
use nagare::prelude::*;
use std::time::Duration;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn test_sequence_runs_in_wire_order() {
        let project = project(vec![flow(
            "main",
            vec![
                component("start", ComponentKind::Start),
                log("first", "\"one\""),
                log("second", "\"two\""),
                component("end", ComponentKind::End),
            ],
            vec![
                seq("start", "first"),
                seq("first", "second"),
                seq("second", "end"),
            ],
        )]);

        let runtime = run_to_idle(project);

        assert_eq!(runtime.status(), &RuntimeStatus::Finished);
        assert_eq!(runtime.host().messages(), vec!["one", "two"]);
        assert_eq!(runtime.stats().executed_components, 4);
    }

    #[test]
    fn test_components_without_connected_sequence_input_run_at_start() {
        let project = project(vec![flow(
            "main",
            vec![
                component(
                    "greeting",
                    ComponentKind::Constant {
                        value: "\"hi\"".to_string(),
                    },
                ),
                component("start", ComponentKind::Start),
                log("print", "text").with_inputs(&["text"]),
            ],
            vec![
                wire("greeting", "value", "print", "text"),
                seq("start", "print"),
            ],
        )]);

        let runtime = run_to_idle(project);
        assert_eq!(runtime.host().messages(), vec!["hi"]);
    }

    #[test]
    fn test_mandatory_sequence_input_without_wire_never_runs() {
        let project = project(vec![flow(
            "main",
            vec![component("start", ComponentKind::Start), log("orphan", "\"never\"")],
            vec![],
        )]);

        let runtime = run_to_idle(project);
        assert_eq!(runtime.status(), &RuntimeStatus::Finished);
        assert!(runtime.host().messages().is_empty());
    }

    #[test]
    fn test_every_sequence_trigger_runs_the_target() {
        let project = project(vec![flow(
            "main",
            vec![
                component("start", ComponentKind::Start),
                log("a", "\"a\""),
                log("b", "\"b\""),
                log("c", "\"c\""),
            ],
            vec![
                seq("start", "a"),
                seq("start", "b"),
                seq("a", "c"),
                seq("b", "c"),
            ],
        )]);

        let runtime = run_to_idle(project);

        // `c` is still queued from `a` when `b` fires it again.
        assert_eq!(runtime.host().messages(), vec!["a", "b", "c", "c"]);
        assert_eq!(runtime.status(), &RuntimeStatus::Finished);
        assert_eq!(runtime.stats().executed_components, 5);
    }

    #[test]
    fn test_call_returns_value_through_output() {
        let runtime = run_to_idle(doubling_project());

        assert_eq!(runtime.status(), &RuntimeStatus::Finished);
        assert_eq!(runtime.host().messages(), vec!["42"]);
        assert_eq!(runtime.stats().flow_states_created, 2);
        // The finished child is released from the arena.
        assert_eq!(runtime.flow_states().count(), 1);
    }

    #[test]
    fn test_call_with_nothing_to_run_continues_in_same_tick() {
        let project = project(vec![
            flow(
                "main",
                vec![
                    component("start", ComponentKind::Start),
                    component(
                        "call",
                        ComponentKind::CallAction {
                            action: "noop".to_string(),
                        },
                    ),
                    log("after", "\"after\""),
                ],
                vec![seq("start", "call"), seq("call", "after")],
            ),
            flow("noop", vec![component("end", ComponentKind::End)], vec![]),
        ]);

        let mut runtime = Runtime::builder(project).build().unwrap();
        runtime.start().unwrap();
        let executed = runtime.tick();

        assert_eq!(executed, 3);
        assert_eq!(runtime.host().messages(), vec!["after"]);
        assert_eq!(runtime.status(), &RuntimeStatus::Finished);
    }

    #[test]
    fn test_caller_waits_for_suspended_child() {
        let project = project(vec![
            flow(
                "main",
                vec![
                    component("start", ComponentKind::Start),
                    component(
                        "call",
                        ComponentKind::CallAction {
                            action: "wait".to_string(),
                        },
                    ),
                    log("back", "\"back\""),
                ],
                vec![seq("start", "call"), seq("call", "back")],
            ),
            flow(
                "wait",
                vec![
                    component("start", ComponentKind::Start),
                    component(
                        "delay",
                        ComponentKind::Delay {
                            milliseconds: "100".to_string(),
                        },
                    ),
                    component("end", ComponentKind::End),
                ],
                vec![seq("start", "delay"), seq("delay", "end")],
            ),
        ]);

        let (mut runtime, clock) = manual_runtime(project);
        runtime.tick();

        let root = runtime.root().unwrap();
        let child = runtime
            .flow_states()
            .find(|s| s.parent == Some(root))
            .expect("child flow state should be alive");
        // The suspended Delay plus the caller's return token.
        assert_eq!(child.num_active_components, 2);
        assert_eq!(child.depth, 1);
        assert_eq!(runtime.flow_state(root).unwrap().num_active_components, 0);
        assert_eq!(runtime.status(), &RuntimeStatus::Running);
        assert_eq!(runtime.next_deadline(), Some(Duration::from_millis(100)));

        clock.advance(Duration::from_millis(100));
        runtime.tick();

        assert_eq!(runtime.host().messages(), vec!["back"]);
        assert_eq!(runtime.status(), &RuntimeStatus::Finished);
        assert_eq!(runtime.flow_states().count(), 1);
    }

    #[test]
    fn test_nested_calls_track_active_components_per_level() {
        let project = project(vec![
            flow(
                "main",
                vec![
                    component("start", ComponentKind::Start),
                    component(
                        "call",
                        ComponentKind::CallAction {
                            action: "outer".to_string(),
                        },
                    ),
                    log("back", "\"back\""),
                ],
                vec![seq("start", "call"), seq("call", "back")],
            ),
            flow(
                "outer",
                vec![
                    component("start", ComponentKind::Start),
                    component(
                        "call",
                        ComponentKind::CallAction {
                            action: "inner".to_string(),
                        },
                    ),
                    log("mid", "\"mid\""),
                    component("end", ComponentKind::End),
                ],
                vec![
                    seq("start", "call"),
                    seq("call", "mid"),
                    seq("mid", "end"),
                ],
            ),
            flow(
                "inner",
                vec![
                    component("start", ComponentKind::Start),
                    component(
                        "delay",
                        ComponentKind::Delay {
                            milliseconds: "50".to_string(),
                        },
                    ),
                    component("end", ComponentKind::End),
                ],
                vec![seq("start", "delay"), seq("delay", "end")],
            ),
        ]);

        let (mut runtime, clock) = manual_runtime(project);
        runtime.tick();

        let root = runtime.root().unwrap();
        let level = |runtime: &Runtime, depth: usize| {
            runtime
                .flow_states()
                .find(|s| s.depth == depth)
                .map(|s| (s.id, s.num_active_components))
        };
        let (outer, outer_active) =
            level(&runtime, 1).expect("outer flow state should be alive");
        let (inner, inner_active) =
            level(&runtime, 2).expect("inner flow state should be alive");
        assert_eq!(runtime.flow_state(root).unwrap().num_active_components, 0);
        // Only the return token main holds on outer.
        assert_eq!(outer_active, 1);
        // The suspended Delay plus the return token outer holds on inner.
        assert_eq!(inner_active, 2);
        assert_eq!(runtime.flow_state(inner).unwrap().parent, Some(outer));
        assert_eq!(runtime.flow_state(outer).unwrap().children, vec![inner]);
        assert!(runtime.host().messages().is_empty());

        clock.advance(Duration::from_millis(50));
        runtime.tick();

        assert_eq!(runtime.host().messages(), vec!["mid", "back"]);
        assert_eq!(runtime.status(), &RuntimeStatus::Finished);
        assert!(level(&runtime, 1).is_none());
        assert!(level(&runtime, 2).is_none());
        assert_eq!(runtime.flow_state(root).unwrap().num_active_components, 0);
        assert!(runtime.flow_state(root).unwrap().children.is_empty());
    }

    #[test]
    fn test_call_depth_limit_fails_recursive_flow() {
        let project = project(vec![flow(
            "main",
            vec![
                component("start", ComponentKind::Start),
                component(
                    "again",
                    ComponentKind::CallAction {
                        action: "main".to_string(),
                    },
                ),
            ],
            vec![seq("start", "again")],
        )]);

        let mut runtime = Runtime::builder(project)
            .config(RuntimeConfig::default().with_max_call_depth(3))
            .build()
            .unwrap();
        runtime.start().unwrap();
        runtime.run_until_idle();

        assert_eq!(
            runtime.status(),
            &RuntimeStatus::Failed("maximum call depth of 3 exceeded".to_string())
        );
        assert_eq!(runtime.stats().flow_states_created, 4);
    }

    #[test]
    fn test_delay_resumes_only_when_clock_reaches_deadline() {
        let project = project(vec![flow(
            "main",
            vec![
                component("start", ComponentKind::Start),
                component(
                    "delay",
                    ComponentKind::Delay {
                        milliseconds: "250".to_string(),
                    },
                ),
                log("late", "\"late\""),
            ],
            vec![seq("start", "delay"), seq("delay", "late")],
        )]);

        let (mut runtime, clock) = manual_runtime(project);
        runtime.tick();
        assert!(runtime.host().messages().is_empty());
        assert_eq!(runtime.next_deadline(), Some(Duration::from_millis(250)));

        clock.advance(Duration::from_millis(249));
        assert_eq!(runtime.tick(), 0);
        assert!(runtime.host().messages().is_empty());

        clock.advance(Duration::from_millis(1));
        runtime.tick();
        assert_eq!(runtime.host().messages(), vec!["late"]);
        assert_eq!(runtime.status(), &RuntimeStatus::Finished);
    }

    #[test]
    fn test_async_run_drives_timers_to_completion() {
        let project = project(vec![flow(
            "main",
            vec![
                component("start", ComponentKind::Start),
                component(
                    "delay",
                    ComponentKind::Delay {
                        milliseconds: "10".to_string(),
                    },
                ),
                log("done", "\"done\""),
            ],
            vec![seq("start", "delay"), seq("delay", "done")],
        )]);

        let mut runtime = Runtime::builder(project).build().unwrap();
        let status = tokio_test::block_on(runtime.run());

        assert_eq!(status, RuntimeStatus::Finished);
        assert_eq!(runtime.host().messages(), vec!["done"]);
    }

    #[test]
    fn test_watch_fires_again_when_value_changes() {
        let mut project = project(vec![flow(
            "main",
            vec![
                component(
                    "watch",
                    ComponentKind::WatchVariable {
                        variable: "level".to_string(),
                    },
                ),
                log("print", "level"),
            ],
            vec![wire("watch", "variable", "print", "@seqin")],
        )]);
        project.global_variables = vec![VariableDefinition::new("level", "1")];

        let mut runtime = Runtime::builder(project).build().unwrap();
        runtime.start().unwrap();
        runtime.run_until_idle();
        assert_eq!(runtime.host().messages(), vec!["1"]);

        // Unchanged values do not propagate.
        runtime.tick();
        assert_eq!(runtime.host().messages(), vec!["1"]);

        runtime.set_global("level", Value::from(2)).unwrap();
        runtime.tick();
        assert_eq!(runtime.host().messages(), vec!["1", "2"]);
        // A live subscription keeps the root flow running.
        assert_eq!(runtime.status(), &RuntimeStatus::Running);
    }

    #[test]
    fn test_stop_disposes_timers_and_watches() {
        let project = project(vec![flow(
            "main",
            vec![
                component("start", ComponentKind::Start),
                component(
                    "delay",
                    ComponentKind::Delay {
                        milliseconds: "1000".to_string(),
                    },
                ),
                component(
                    "watch",
                    ComponentKind::WatchVariable {
                        variable: "1 + 1".to_string(),
                    },
                ),
            ],
            vec![seq("start", "delay")],
        )]);

        let (mut runtime, _clock) = manual_runtime(project);
        runtime.tick();
        assert!(runtime.next_deadline().is_some());

        runtime.stop();

        assert_eq!(runtime.status(), &RuntimeStatus::Stopped);
        assert_eq!(runtime.stats().disposed_handles, 2);
        assert_eq!(runtime.next_deadline(), None);
        assert_eq!(runtime.tick(), 0);
    }

    #[test]
    fn test_error_is_delivered_to_catch_error() {
        let project = project(vec![flow(
            "main",
            vec![
                component("start", ComponentKind::Start),
                component(
                    "fail",
                    ComponentKind::Error {
                        message: "\"boom\"".to_string(),
                    },
                ),
                component("catch", ComponentKind::CatchError),
                log("report", "message").with_inputs(&["message"]),
            ],
            vec![
                seq("start", "fail"),
                wire("catch", "Message", "report", "message"),
                seq("catch", "report"),
            ],
        )]);

        let runtime = run_to_idle(project);

        assert_eq!(runtime.status(), &RuntimeStatus::Finished);
        assert_eq!(runtime.host().messages(), vec!["boom"]);
        assert_eq!(runtime.stats().caught_errors, 1);
    }

    #[test]
    fn test_uncaught_error_fails_root() {
        let project = project(vec![flow(
            "main",
            vec![
                component("start", ComponentKind::Start),
                component(
                    "fail",
                    ComponentKind::Error {
                        message: "\"boom\"".to_string(),
                    },
                ),
                log("unreached", "\"unreached\""),
            ],
            vec![seq("start", "fail"), seq("fail", "unreached")],
        )]);

        let runtime = run_to_idle(project);

        assert_eq!(runtime.status(), &RuntimeStatus::Failed("boom".to_string()));
        assert!(runtime.host().messages().is_empty());
        assert_eq!(runtime.host().errors.len(), 1);
        assert_eq!(runtime.host().errors[0].message, "boom");
    }

    fn failing_child(parent_catches: bool) -> Project {
        let mut components = vec![
            component("start", ComponentKind::Start),
            component(
                "call",
                ComponentKind::CallAction {
                    action: "inner".to_string(),
                },
            ),
        ];
        let mut wires = vec![seq("start", "call")];
        if parent_catches {
            components.push(component("catch", ComponentKind::CatchError));
            components.push(log("report", "message").with_inputs(&["message"]));
            wires.push(wire("catch", "Message", "report", "message"));
            wires.push(seq("catch", "report"));
        }
        project(vec![
            flow("main", components, wires),
            flow(
                "inner",
                vec![
                    component("start", ComponentKind::Start),
                    component(
                        "fail",
                        ComponentKind::Error {
                            message: "\"inner failure\"".to_string(),
                        },
                    ),
                    component("end", ComponentKind::End),
                ],
                vec![seq("start", "fail"), seq("fail", "end")],
            ),
        ])
    }

    #[test]
    fn test_nested_error_is_caught_by_caller() {
        let runtime = run_to_idle(failing_child(true));

        assert_eq!(runtime.status(), &RuntimeStatus::Finished);
        assert_eq!(runtime.host().messages(), vec!["inner failure"]);
        assert_eq!(runtime.flow_states().count(), 1);
    }

    #[test]
    fn test_nested_uncaught_error_fails_root() {
        let runtime = run_to_idle(failing_child(false));

        assert_eq!(
            runtime.status(),
            &RuntimeStatus::Failed("inner failure".to_string())
        );
    }

    #[test]
    fn test_evaluation_error_is_soft_without_catch_error() {
        let project = project(vec![flow(
            "main",
            vec![
                component("start", ComponentKind::Start),
                component(
                    "bad",
                    ComponentKind::EvalExpr {
                        expression: "missing + 1".to_string(),
                    },
                ),
                log("other", "\"still running\""),
            ],
            vec![seq("start", "bad"), seq("start", "other")],
        )]);

        let runtime = run_to_idle(project);

        assert_eq!(runtime.status(), &RuntimeStatus::Finished);
        assert_eq!(runtime.host().messages(), vec!["still running"]);
        assert_eq!(runtime.stats().reported_errors, 1);
        assert!(runtime.host().errors[0].message.contains("missing"));
    }
}
