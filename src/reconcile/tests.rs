//! Reconciler tests

use super::*;
use crate::types::Record;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use test_case::test_case;

fn records(values: Vec<Value>) -> Vec<Record> {
    values
        .into_iter()
        .map(|value| value.as_object().cloned().unwrap())
        .collect()
}

#[test_case(json!(null), ValueShape::Null ; "null")]
#[test_case(json!(""), ValueShape::Empty ; "empty string")]
#[test_case(json!([]), ValueShape::Empty ; "empty list")]
#[test_case(json!({}), ValueShape::Empty ; "empty map")]
#[test_case(json!("x"), ValueShape::Scalar ; "string")]
#[test_case(json!(0), ValueShape::Scalar ; "number")]
#[test_case(json!(false), ValueShape::Scalar ; "boolean")]
#[test_case(json!([1]), ValueShape::List ; "list")]
#[test_case(json!({"a": 1}), ValueShape::Structured ; "map")]
fn test_value_shape(value: Value, expected: ValueShape) {
    assert_eq!(ValueShape::of(&value), expected);
}

#[test]
fn test_tie_break_order() {
    let counts = ShapeCounts {
        scalar: 2,
        structured: 2,
        list: 2,
        ..Default::default()
    };
    assert_eq!(counts.dominant(), ColumnShape::Scalar);

    let counts = ShapeCounts {
        structured: 3,
        list: 3,
        ..Default::default()
    };
    assert_eq!(counts.dominant(), ColumnShape::Structured);

    assert_eq!(ShapeCounts::default().dominant(), ColumnShape::Scalar);
}

#[test]
fn test_structured_majority_nulls_lists() {
    let mut rows: Vec<Value> = (0..8)
        .map(|i| json!({"id": i, "affiliation": {"name": format!("org {i}")}}))
        .collect();
    rows.push(json!({"id": 8, "affiliation": ["a", "b"]}));
    rows.push(json!({"id": 9, "affiliation": ["c"]}));
    let input = records(rows);

    let table = TypeReconciler::new().reconcile(&input);

    let column = table.column("affiliation").unwrap();
    assert_eq!(column.shape, ColumnShape::Structured);
    assert_eq!(column.values[0], json!({"name": "org 0"}));
    assert_eq!(column.values[8], Value::Null);
    assert_eq!(column.values[9], Value::Null);

    let coercion = &table.coercions[1];
    assert_eq!(coercion.column, "affiliation");
    assert_eq!(coercion.nulled, 2);
    assert_eq!(coercion.counts.structured, 8);
    assert_eq!(coercion.counts.list, 2);

    // The input is untouched
    assert_eq!(input[8]["affiliation"], json!(["a", "b"]));
}

#[test]
fn test_empty_markers_become_null_and_do_not_vote() {
    let input = records(vec![
        json!({"authors": []}),
        json!({"authors": []}),
        json!({"authors": []}),
        json!({"authors": [{"name": "Ada"}]}),
        json!({"authors": "unknown"}),
        json!({"authors": ["x", "y"]}),
    ]);

    let table = TypeReconciler::new().reconcile(&input);
    let column = table.column("authors").unwrap();

    assert_eq!(column.shape, ColumnShape::List);
    assert_eq!(
        column.values,
        vec![
            Value::Null,
            Value::Null,
            Value::Null,
            json!([{"name": "Ada"}]),
            Value::Null,
            json!(["x", "y"]),
        ]
    );
    assert_eq!(table.coercions[0].nulled, 4);
}

#[test]
fn test_all_empty_column_is_scalar() {
    let input = records(vec![json!({"notes": ""}), json!({"notes": []})]);
    let table = TypeReconciler::new().reconcile(&input);

    let column = table.column("notes").unwrap();
    assert_eq!(column.shape, ColumnShape::Scalar);
    assert_eq!(column.values, vec![Value::Null, Value::Null]);
    assert_eq!(table.total_nulled(), 2);
}

#[test]
fn test_string_column_drops_empty_strings() {
    let input = records(vec![json!({"doi": "10.1/x"}), json!({"doi": ""})]);
    let table = TypeReconciler::new().reconcile(&input);
    assert_eq!(
        table.column("doi").unwrap().values,
        vec![json!("10.1/x"), Value::Null]
    );
}

#[test]
fn test_uniform_numbers_and_booleans_pass_through() {
    let input = records(vec![
        json!({"year": 2020, "score": 1.5, "open": true}),
        json!({"year": null, "score": 2, "open": false}),
        json!({"score": 0}),
    ]);

    let table = TypeReconciler::new().reconcile(&input);

    assert_eq!(
        table.column("year").unwrap().values,
        vec![json!(2020), Value::Null, Value::Null]
    );
    assert_eq!(
        table.column("score").unwrap().values,
        vec![json!(1.5), json!(2), json!(0)]
    );
    assert_eq!(table.column("open").unwrap().shape, ColumnShape::Scalar);
    assert_eq!(table.total_nulled(), 0);
}

#[test]
fn test_all_null_column() {
    let input = records(vec![json!({"a": null}), json!({"a": null})]);
    let table = TypeReconciler::new().reconcile(&input);
    assert_eq!(table.column("a").unwrap().shape, ColumnShape::Null);
    assert_eq!(table.coercions[0].nulled, 0);
}

#[test]
fn test_columns_in_first_seen_order_with_missing_keys() {
    let input = records(vec![
        json!({"id": 1, "title": "a"}),
        json!({"id": 2, "year": 2021}),
        json!({"doi": "d", "id": 3}),
    ]);

    let table = TypeReconciler::new().reconcile(&input);

    assert_eq!(table.row_count, 3);
    assert_eq!(table.column_names(), vec!["id", "title", "year", "doi"]);
    assert_eq!(table.row(1), vec![&json!(2), &Value::Null, &json!(2021), &Value::Null]);
    assert_eq!(
        table.to_records()[2],
        json!({"id": 3, "doi": "d"}).as_object().cloned().unwrap()
    );
}

#[test]
fn test_reconcile_is_deterministic() {
    let input = records(vec![
        json!({"a": [1], "b": {"x": 1}}),
        json!({"a": "s", "b": {"x": 2}}),
        json!({"a": [2, 3], "b": []}),
    ]);
    let reconciler = TypeReconciler::new();
    let first = reconciler.reconcile(&input);
    let second = reconciler.reconcile(&input);
    assert_eq!(first.shapes(), second.shapes());
    assert_eq!(first, second);
}

#[test]
fn test_empty_input() {
    let table = TypeReconciler::new().reconcile(&[]);
    assert!(table.columns.is_empty());
    assert_eq!(table.row_count, 0);
}
