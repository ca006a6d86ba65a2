//! Tests for the expression language as components see it.
use nagare::error::EvaluationError;
use nagare::evaluator::MapContext;
use nagare::prelude::*;
use serde_json::json;

fn eval(source: &str, ctx: &MapContext) -> std::result::Result<Value, EvaluationError> {
    Evaluator::new().evaluate(source, ctx)
}

fn device() -> MapContext {
    MapContext::default()
        .with("name", "pump")
        .with("flag", true)
        .with(
            "channels",
            Value::from(json!([{ "voltage": 3.3 }, { "voltage": 5 }])),
        )
}

#[test]
fn test_comparisons_follow_value_ordering() {
    let ctx = MapContext::default();
    assert_eq!(eval("2 < 2.5", &ctx), Ok(Value::Boolean(true)));
    assert_eq!(eval("'a' < 'b'", &ctx), Ok(Value::Boolean(true)));
    assert_eq!(eval("3 >= 3", &ctx), Ok(Value::Boolean(true)));
    assert_eq!(eval("1 == 1.0", &ctx), Ok(Value::Boolean(true)));
    assert_eq!(eval("'1' == 1", &ctx), Ok(Value::Boolean(false)));
    assert_eq!(eval("null != undefined", &ctx), Ok(Value::Boolean(true)));
    assert_eq!(eval("[1, 2] == [1, 2]", &ctx), Ok(Value::Boolean(true)));
    // Incomparable operands are never ordered.
    assert_eq!(eval("'a' < 1", &ctx), Ok(Value::Boolean(false)));
}

#[test]
fn test_division_keeps_integers_when_exact() {
    let ctx = MapContext::default();
    assert_eq!(eval("6 / 3", &ctx), Ok(Value::Integer(2)));
    assert_eq!(eval("7 / 2", &ctx), Ok(Value::Double(3.5)));
    assert_eq!(eval("7 % 4", &ctx), Ok(Value::Integer(3)));
    assert_eq!(eval("1.5 * 2", &ctx), Ok(Value::Double(3.0)));
    assert_eq!(eval("-(2 - 5)", &ctx), Ok(Value::Integer(3)));
}

#[test]
fn test_negating_smallest_integer_widens_to_double() {
    let ctx = MapContext::default();
    assert_eq!(
        eval("-(0 - 9223372036854775807 - 1)", &ctx),
        Ok(Value::Double(9223372036854775808.0))
    );
    assert_eq!(
        eval("-9223372036854775807", &ctx),
        Ok(Value::Integer(-9223372036854775807))
    );
}

#[test]
fn test_string_concatenation_uses_display() {
    let ctx = device();
    assert_eq!(eval("'n=' + 2.5", &ctx), Ok(Value::from("n=2.5")));
    assert_eq!(eval("name + 1", &ctx), Ok(Value::from("pump1")));
    assert_eq!(eval("'d' + [1, 'x']", &ctx), Ok(Value::from("d[1, x]")));
}

#[test]
fn test_conditional_picks_branch_by_truthiness() {
    let ctx = device();
    assert_eq!(eval("flag ? 'on' : 'off'", &ctx), Ok(Value::from("on")));
    assert_eq!(eval("'' ? 1 : 2", &ctx), Ok(Value::Integer(2)));
    assert_eq!(eval("!flag || name", &ctx), Ok(Value::from("pump")));
}

#[test]
fn test_member_and_index_access() {
    let ctx = device();
    assert_eq!(eval("channels[1].voltage", &ctx), Ok(Value::Integer(5)));
    assert_eq!(eval("channels.length", &ctx), Ok(Value::Integer(2)));
    assert_eq!(eval("name.length", &ctx), Ok(Value::Integer(4)));
    assert_eq!(eval("name[0]", &ctx), Ok(Value::from("p")));
    assert_eq!(eval("channels[0]['voltage']", &ctx), Ok(Value::Double(3.3)));
    assert_eq!(eval("channels[9]", &ctx), Ok(Value::Undefined));
    assert_eq!(eval("channels[0].current", &ctx), Ok(Value::Undefined));
}

#[test]
fn test_type_mismatch_names_operation() {
    let ctx = device();
    match eval("name - 1", &ctx) {
        Err(EvaluationError::TypeMismatch {
            operation, found, ..
        }) => {
            assert_eq!(operation, "-");
            assert_eq!(found, Value::from("pump"));
        }
        other => panic!("unexpected result {:?}", other),
    }
    assert!(matches!(
        eval("channels['x']", &ctx),
        Err(EvaluationError::TypeMismatch { .. })
    ));
    assert!(matches!(
        eval("flag.field", &ctx),
        Err(EvaluationError::TypeMismatch { .. })
    ));
}

#[test]
fn test_unknown_names_and_bad_syntax_are_errors() {
    let ctx = MapContext::default();
    let error = eval("speed * 2", &ctx).unwrap_err();
    assert_eq!(error, EvaluationError::UndeclaredVariable("speed".to_string()));
    assert_eq!(
        error.to_string(),
        "Variable 'speed' is not declared in the current data context"
    );

    assert!(matches!(
        eval("(1 + 2", &ctx),
        Err(EvaluationError::Parse { .. })
    ));
}

#[test]
fn test_evaluator_reuses_parsed_expressions() {
    let mut evaluator = Evaluator::new();
    let first = evaluator.parse("a + b").unwrap().clone();
    let ctx = MapContext::default().with("a", 1).with("b", 2);
    assert_eq!(evaluator.evaluate("a + b", &ctx), Ok(Value::Integer(3)));
    assert_eq!(evaluator.parse("a + b").unwrap(), &first);
}
