//! Unit tests for the binary build, compiled artifacts and the disassembler.
mod common;
use common::*;
use nagare::ast::BinaryOp;
use nagare::bytecode::{
    Assets, DataReader, Disassembly, FORMAT_VERSION, NativeWire, OpCode, build_project,
    decode_expression,
};
use nagare::components::call_pin_indices;
use nagare::prelude::*;

fn ops(bytes: &[u8]) -> Vec<OpCode> {
    decode_expression(bytes)
        .expect("expression should decode")
        .into_iter()
        .map(|(_, op)| op)
        .collect()
}

#[test]
fn test_call_record_matches_runtime_layout() {
    let project = doubling_project();
    let native = build_project(&project).unwrap();

    let call = index_of(&project, "main", "call");
    let record = &native.flows[0].components[call];
    assert_eq!(record.type_id, 1013);

    let mut reader = record.specific_reader();
    let flow_index = reader.read_i16("flow index").unwrap();
    let input = reader.read_u8("input index").unwrap();
    let output = reader.read_u8("output index").unwrap();
    assert!(reader.is_at_end());

    assert_eq!(call_pin_indices(&project, "double"), (Some(1), 1, 1));
    assert_eq!((flow_index, input as usize, output as usize), (1, 1, 1));

    let runtime = Runtime::builder(project).build().unwrap();
    let layout = runtime.graph().flows[0].layout(call).unwrap();
    assert_eq!(layout.input_index("in_x"), Some(input as usize));
    assert_eq!(layout.output_index("out_result"), Some(output as usize));
}

#[test]
fn test_missing_callee_is_written_as_negative_index() {
    let project = project(vec![flow(
        "main",
        vec![component(
            "call",
            ComponentKind::CallAction {
                action: "nowhere".to_string(),
            },
        )],
        vec![],
    )]);
    let mut assets = Assets::new(&project);
    let mut buffer = nagare::bytecode::DataBuffer::new();

    project.flows[0].components[0]
        .kind
        .build_static(&mut assets, "call", &mut buffer)
        .unwrap();

    let mut reader = DataReader::new(buffer.as_slice());
    assert_eq!(reader.read_i16("flow index").unwrap(), -1);
    assert_eq!(call_pin_indices(&project, "nowhere"), (None, 0, 0));
}

#[test]
fn test_wires_resolve_to_target_input_indices() {
    let project = doubling_project();
    let native = build_project(&project).unwrap();

    let constant = index_of(&project, "main", "twenty_one");
    let call = index_of(&project, "main", "call");
    let record = &native.flows[0].components[constant];

    // Outputs: @seqout (unwired), value.
    assert!(record.outputs[0].is_empty());
    assert_eq!(
        record.outputs[1],
        vec![NativeWire {
            component: call as u16,
            input: 1,
        }]
    );
    assert_eq!(native.flows[1].input_components, vec![0]);
    assert_eq!(native.flows[1].output_components, vec![2]);
}

#[test]
fn test_expression_compiles_against_input_pins() {
    let project = doubling_project();
    let native = build_project(&project).unwrap();

    assert_eq!(
        native.constants,
        vec![Value::Null, Value::Integer(21), Value::Integer(2)]
    );
    let eval = &native.flows[1].components[1];
    assert_eq!(
        ops(&eval.properties[0]),
        vec![
            OpCode::PushInput(1),
            OpCode::PushConstant(2),
            OpCode::Binary(BinaryOp::Multiply),
            OpCode::End,
        ]
    );
}

#[test]
fn test_short_circuit_jump_targets_end_of_chunk() {
    let mut project = project(vec![flow(
        "main",
        vec![component(
            "eval",
            ComponentKind::EvalExpr {
                expression: "a && b".to_string(),
            },
        )],
        vec![],
    )]);
    project.global_variables = vec![
        VariableDefinition::new("a", "true"),
        VariableDefinition::new("b", "false"),
    ];

    let native = build_project(&project).unwrap();
    let decoded = decode_expression(&native.flows[0].components[0].properties[0]).unwrap();

    assert_eq!(decoded[0].1, OpCode::PushGlobal(0));
    let (end_offset, end) = decoded[decoded.len() - 1];
    assert_eq!(end, OpCode::End);
    assert_eq!(decoded[1].1.jump_target(), Some(end_offset as u16));
    assert_eq!(decoded[2].1, OpCode::PushGlobal(1));
}

#[test]
fn test_locals_shadow_globals() {
    let mut main = flow(
        "main",
        vec![component(
            "eval",
            ComponentKind::EvalExpr {
                expression: "level".to_string(),
            },
        )],
        vec![],
    );
    main.local_variables = vec![VariableDefinition::new("level", "1")];
    let mut project = project(vec![main]);
    project.global_variables = vec![VariableDefinition::new("level", "2")];

    let native = build_project(&project).unwrap();
    assert_eq!(
        ops(&native.flows[0].components[0].properties[0]),
        vec![OpCode::PushLocal(0), OpCode::End]
    );
}

#[test]
fn test_specific_records() {
    let project = project(vec![flow(
        "main",
        vec![
            component("start", ComponentKind::Start),
            component(
                "compare",
                ComponentKind::Compare {
                    operator: CompareOperator::Between,
                    a: "1".to_string(),
                    b: "0".to_string(),
                    c: "2".to_string(),
                },
            ),
            component("counter", ComponentKind::Counter { count_value: 258 }),
            component(
                "switch",
                ComponentKind::Switch {
                    tests: vec![SwitchTest::new("true", "yes")],
                },
            ),
        ],
        vec![],
    )]);

    let native = build_project(&project).unwrap();
    let components = &native.flows[0].components;

    assert!(components[0].specific.is_empty());
    assert_eq!(components[1].specific, vec![CompareOperator::Between.code()]);
    assert_eq!(components[1].properties.len(), 3);
    assert_eq!(components[2].specific, vec![2, 1, 0, 0]);

    let mut reader = components[3].specific_reader();
    assert_eq!(reader.read_u8("count").unwrap(), 1);
    // Output 0 is @seqout, so the first test drives output 1.
    assert_eq!(reader.read_u8("output").unwrap(), 1);
    assert_eq!(ops(&components[3].specific[2..]).last(), Some(&OpCode::End));
}

#[test]
fn test_dashboard_components_have_no_binary_form() {
    let project = project(vec![flow(
        "main",
        vec![component("now", ComponentKind::DateNow)],
        vec![],
    )]);

    let error = build_project(&project).unwrap_err();
    assert!(matches!(
        error,
        BuildError::Unsupported {
            kind: "DateNow",
            ..
        }
    ));

    // The interpreter section does not need one.
    let artifact = CompiledProject::interpreted(&project).unwrap();
    assert!(artifact.native.is_none());
    assert_eq!(artifact.interpreter, Some(project));
}

#[test]
fn test_undeclared_variable_fails_build() {
    let project = project(vec![flow(
        "main",
        vec![log("print", "nobody")],
        vec![],
    )]);

    let error = build_project(&project).unwrap_err();
    assert!(matches!(
        error,
        BuildError::Expression { ref component, .. } if component == "print"
    ));
    assert!(error.to_string().contains("nobody"));
}

#[test]
fn test_unfoldable_constant_is_stored_as_null() {
    let mut project = project(vec![flow(
        "main",
        vec![component(
            "constant",
            ComponentKind::Constant {
                value: "limit".to_string(),
            },
        )],
        vec![],
    )]);
    project.global_variables = vec![VariableDefinition::new("limit", "5")];

    let native = build_project(&project).unwrap();
    let mut reader = native.flows[0].components[0].specific_reader();
    assert_eq!(reader.read_u16("constant").unwrap(), 0);
}

#[test]
fn test_artifact_save_and_load() {
    let artifact = CompiledProject::build(&doubling_project()).unwrap();
    assert_eq!(artifact.version, FORMAT_VERSION);

    let path = std::env::temp_dir().join("nagare_test_artifact.bin");
    let path = path.to_str().unwrap();
    artifact.save(path).unwrap();
    let loaded = CompiledProject::from_file(path).unwrap();
    std::fs::remove_file(path).ok();

    assert_eq!(loaded, artifact);
}

#[test]
fn test_artifact_version_mismatch_is_rejected() {
    let mut artifact = CompiledProject::interpreted(&doubling_project()).unwrap();
    artifact.version = FORMAT_VERSION + 1;
    let bytes = artifact.to_bytes().unwrap();

    let error = CompiledProject::from_bytes(&bytes).unwrap_err();
    assert!(error.to_string().contains("Unsupported artifact version"));
    assert!(CompiledProject::from_bytes(&[0xff, 0x00]).is_err());
}

#[test]
fn test_disassembly_lists_flows_and_instructions() {
    let native = build_project(&doubling_project()).unwrap();
    let listing = Disassembly(&native).to_string();

    println!("{}", listing);
    assert!(listing.contains("======== FLOW #0 main ========"));
    assert!(listing.contains("======== FLOW #1 double ========"));
    assert!(listing.contains("[2] call (type 1013)"));
    assert!(listing.contains("PushInput(1)"));
    assert!(listing.contains("Binary *"));
    assert!(listing.contains("specific: 01 00 01 01"));
}
