mod common;

use std::collections::HashMap;
use std::fs::File;
use std::thread;

use common::{fixture_path, lenient_schema, strict_schema, text_rows};
use serde_json::{Map, Value as JsonValue, json};
use tabular_schema::{
    CastRowOptions, CsvSource, Error, HeaderSpec, IterOptions, MemorySource, PipelineState,
    Schema, SchemaOptions, Table, TableRow, Value,
};

fn people_schema() -> Schema {
    Schema::load(&fixture_path("people.schema.json"), SchemaOptions::strict())
        .expect("people schema")
}

fn people_rows() -> Vec<Vec<JsonValue>> {
    text_rows(&[
        &["1", "Ada", "ada@example.org", "1.70", "36", "2021-03-01"],
        &["2", "Grace", "grace@example.org", "1.65", "45", "2020-11-15"],
        &["3", "Linus", "linus@example.org", "1.80", "28", "2022-01-09"],
        &["4", "Barbara", "", "1.62", "51", "2019-06-30"],
        &["5", "Ken", "ken@example.org", "1.75", "60", "2018-02-14"],
    ])
}

fn force_cast() -> IterOptions {
    IterOptions {
        force_cast: true,
        ..IterOptions::default()
    }
}

fn reference_row(entries: JsonValue) -> Map<String, JsonValue> {
    entries.as_object().cloned().expect("reference row object")
}

#[test]
fn short_rows_report_a_shape_error() {
    let schema = people_schema();
    let err = schema
        .cast_row(&people_rows()[0][..4], &CastRowOptions::default())
        .expect_err("four values against six fields");
    match err {
        Error::RowShape {
            expected, actual, ..
        } => {
            assert_eq!(expected, 6);
            assert_eq!(actual, 4);
        }
        other => panic!("expected a row shape error, got {other:?}"),
    }
}

#[test]
fn cast_row_collects_every_column_failure() {
    let schema = people_schema();
    let row = text_rows(&[&["x", "A", "not-an-email", "9.0", "-1", "2021-03-01"]]).remove(0);
    let err = schema
        .cast_row(&row, &CastRowOptions::default())
        .expect_err("several columns fail");
    let columns: Vec<Option<usize>> = err.nested().iter().map(Error::column_number).collect();
    assert_eq!(columns, vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);

    let fail_fast = CastRowOptions {
        fail_fast: true,
        ..CastRowOptions::default()
    };
    let err = schema.cast_row(&row, &fail_fast).expect_err("first column fails");
    assert_eq!(err.column_number(), Some(1));
    assert!(err.nested().is_empty());
}

#[test]
fn skipping_constraints_keeps_type_checks() {
    let schema = people_schema();
    let options = CastRowOptions {
        skip_constraints: true,
        ..CastRowOptions::default()
    };
    let row = text_rows(&[&["1", "A", "ada@example.org", "9.0", "-1", "2021-03-01"]]).remove(0);
    let values = schema.cast_row(&row, &options).expect("constraints skipped");
    assert_eq!(values[3], Value::Number(9.0));

    let bad_type = text_rows(&[&["one", "Ada", "", "1.7", "1", "2021-03-01"]]).remove(0);
    assert!(schema.cast_row(&bad_type, &options).is_err());
}

#[test]
fn duplicate_unique_value_yields_one_violation() {
    let table = Table::new(people_schema(), HeaderSpec::None);
    let mut rows = people_rows();
    let mut duplicate = rows[2].clone();
    duplicate[1] = json!("Linus Again");
    rows.push(duplicate);

    let results: Vec<_> = table.iter(MemorySource::new(rows), force_cast()).collect();
    assert_eq!(results.len(), 6);
    assert!(results[..5].iter().all(Result::is_ok));
    let err = results[5].as_ref().expect_err("duplicate primary key");
    assert_eq!(err.constraint_name(), Some("unique"));
    assert_eq!(err.row_number(), Some(6));
    assert_eq!(err.column_number(), Some(1));
}

#[test]
fn unique_constraint_yields_one_violation_after_five_rows() {
    let schema = strict_schema(json!({
        "fields": [
            {"name": "code", "type": "integer", "constraints": {"unique": true}},
            {"name": "label"}
        ]
    }));
    let table = Table::new(schema, HeaderSpec::None);
    let source = MemorySource::from_strings([
        ["1", "a"],
        ["2", "b"],
        ["3", "c"],
        ["4", "d"],
        ["5", "e"],
        ["3", "f"],
    ]);
    let results: Vec<_> = table.iter(source, force_cast()).collect();
    assert_eq!(results.len(), 6);
    assert!(results[..5].iter().all(Result::is_ok));
    let failures: Vec<&Error> = results.iter().filter_map(|r| r.as_ref().err()).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].constraint_name(), Some("unique"));
    assert_eq!(failures[0].row_number(), Some(6));
    assert_eq!(failures[0].column_number(), Some(1));
}

#[test]
fn unique_member_of_composite_key_is_checked_on_its_own() {
    let schema = strict_schema(json!({
        "fields": [
            {"name": "id", "type": "integer", "constraints": {"unique": true}},
            {"name": "version", "type": "integer"}
        ],
        "primaryKey": ["id", "version"]
    }));
    let table = Table::new(schema, HeaderSpec::None);
    let source = MemorySource::from_strings([["1", "1"], ["1", "2"], ["2", "1"]]);
    let results: Vec<_> = table.iter(source, force_cast()).collect();
    let failures: Vec<&Error> = results.iter().filter_map(|r| r.as_ref().err()).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].row_number(), Some(2));
    assert_eq!(failures[0].column_number(), Some(1));
}

#[test]
fn signed_zeros_are_duplicates() {
    let schema = strict_schema(json!({
        "fields": [{"name": "x", "type": "number", "constraints": {"unique": true}}]
    }));
    let table = Table::new(schema, HeaderSpec::None);
    let results: Vec<_> = table
        .iter(MemorySource::from_strings([["0.0"], ["-0.0"]]), force_cast())
        .collect();
    assert!(results[0].is_ok());
    let err = results[1].as_ref().expect_err("-0.0 repeats 0.0");
    assert_eq!(err.constraint_name(), Some("unique"));
}

#[test]
fn composite_primary_key_checks_the_tuple_only() {
    let schema = strict_schema(json!({
        "fields": [
            {"name": "height", "type": "integer"},
            {"name": "age", "type": "integer"}
        ],
        "primaryKey": ["height", "age"]
    }));
    let table = Table::new(schema, HeaderSpec::None);
    let source = MemorySource::from_strings([
        ["170", "30"],
        ["170", "31"],
        ["180", "30"],
        ["170", "30"],
    ]);
    let results: Vec<_> = table.iter(source, force_cast()).collect();
    let failures: Vec<&Error> = results.iter().filter_map(|r| r.as_ref().err()).collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].row_number(), Some(4));
    assert_eq!(failures[0].column_number(), None);
    assert_eq!(failures[0].constraint_name(), Some("unique"));
}

#[test]
fn foreign_keys_resolve_against_relations() {
    let schema = strict_schema(json!({
        "fields": [
            {"name": "id", "type": "integer"},
            {"name": "person", "type": "integer"}
        ],
        "foreignKeys": [
            {"fields": "person", "reference": {"resource": "people", "fields": "id"}}
        ]
    }));
    let table = Table::new(schema, HeaderSpec::None);
    let mut relations = HashMap::new();
    relations.insert(
        "people".to_string(),
        vec![reference_row(json!({"id": 1, "name": "x"}))],
    );
    let options = IterOptions {
        force_cast: true,
        relations: Some(relations),
        ..IterOptions::default()
    };
    let source = MemorySource::from_strings([["10", "1"], ["11", "2"], ["12", ""]]);
    let results: Vec<_> = table.iter(source, options).collect();

    let TableRow::Values(values) = results[0].as_ref().expect("matched row") else {
        panic!("expected positional values");
    };
    assert_eq!(values[0], Value::Integer(10));
    match &values[1] {
        Value::Object(row) => assert_eq!(row.get("name"), Some(&json!("x"))),
        other => panic!("expected the reference row, got {other:?}"),
    }

    match results[1].as_ref() {
        Err(Error::ForeignKeyViolation {
            resource,
            row_number,
            ..
        }) => {
            assert_eq!(resource, "people");
            assert_eq!(*row_number, Some(2));
        }
        other => panic!("expected a foreign key violation, got {other:?}"),
    }

    let TableRow::Values(values) = results[2].as_ref().expect("null key passes") else {
        panic!("expected positional values");
    };
    assert_eq!(values[1], Value::Null);
}

#[test]
fn foreign_keys_without_relations_are_not_checked() {
    let schema = Schema::load(&fixture_path("orders.schema.yaml"), SchemaOptions::strict())
        .expect("orders schema");
    let table = Table::new(schema, HeaderSpec::default());
    let source = CsvSource::new(
        File::open(fixture_path("orders.csv")).expect("orders fixture"),
        b',',
        encoding_rs::UTF_8,
    );
    let rows = table.read(source, IterOptions::default()).expect("no relations");
    assert_eq!(rows.len(), 3);
}

#[test]
fn relation_rows_from_text_match_typed_keys() {
    let schema = Schema::load(&fixture_path("orders.schema.yaml"), SchemaOptions::strict())
        .expect("orders schema");
    let people = reference_row(json!({"id": "1", "name": "Ada"}));
    let linus = reference_row(json!({"id": "3", "name": "Linus"}));
    let mut relations = HashMap::new();
    relations.insert("people".to_string(), vec![people, linus]);

    let table = Table::new(schema, HeaderSpec::default());
    let source = CsvSource::open(&fixture_path("orders.csv"), b',', encoding_rs::UTF_8)
        .expect("orders fixture");
    let options = IterOptions {
        relations: Some(relations),
        ..force_cast()
    };
    let results: Vec<_> = table.iter(source, options).collect();
    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_ok());
    assert!(matches!(
        results[2],
        Err(Error::ForeignKeyViolation { .. })
    ));
}

#[test]
fn concurrent_iterations_do_not_share_state() {
    let table = Table::new(people_schema(), HeaderSpec::None);
    thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let table = &table;
                scope.spawn(move || {
                    table
                        .read(MemorySource::new(people_rows()), IterOptions::default())
                        .expect("each pass sees fresh uniqueness state")
                        .len()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().expect("thread"), 5);
        }
    });

    let mut first = table.iter(MemorySource::new(people_rows()), IterOptions::default());
    let mut second = table.iter(MemorySource::new(people_rows()), IterOptions::default());
    for _ in 0..5 {
        assert!(first.next().expect("row").is_ok());
        assert!(second.next().expect("row").is_ok());
    }
}

#[test]
fn limit_cancels_the_stream() {
    let table = Table::new(people_schema(), HeaderSpec::None);
    let options = IterOptions {
        limit: Some(2),
        ..IterOptions::default()
    };
    let mut iter = table.iter(MemorySource::new(people_rows()), options);
    assert!(iter.next().expect("first").is_ok());
    assert!(iter.next().expect("second").is_ok());
    assert!(iter.next().is_none());
    assert_eq!(iter.state(), PipelineState::Cancelled);
    assert_eq!(iter.emitted(), 2);
    assert_eq!(iter.rows_read(), 2);
}

#[test]
fn limit_counts_substituted_errors() {
    let schema = strict_schema(json!({"fields": [{"name": "n", "type": "integer"}]}));
    let table = Table::new(schema, HeaderSpec::None);
    let options = IterOptions {
        limit: Some(2),
        ..force_cast()
    };
    let source = MemorySource::from_strings([["x"], ["1"], ["2"]]);
    let results: Vec<_> = table.iter(source, options).collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_err());
    assert!(results[1].is_ok());
}

#[test]
fn first_failure_stops_without_force_cast() {
    let schema = strict_schema(json!({"fields": [{"name": "n", "type": "integer"}]}));
    let table = Table::new(schema, HeaderSpec::None);
    let source = MemorySource::from_strings([["1"], ["x"], ["2"]]);
    let mut iter = table.iter(source, IterOptions::default());
    assert!(iter.next().expect("first").is_ok());
    let err = iter.next().expect("second").expect_err("cast failure");
    assert_eq!(err.row_number(), Some(2));
    assert_eq!(err.nested()[0].column_number(), Some(1));
    assert!(iter.next().is_none());
    assert_eq!(iter.state(), PipelineState::Failed);

    let err = table
        .read(
            MemorySource::from_strings([["1"], ["x"], ["2"]]),
            IterOptions::default(),
        )
        .expect_err("read stops at the failure");
    assert_eq!(err.row_number(), Some(2));
}

#[test]
fn read_skips_failures_under_force_cast() {
    let schema = strict_schema(json!({"fields": [{"name": "n", "type": "integer"}]}));
    let table = Table::new(schema, HeaderSpec::None);
    let rows = table
        .read(MemorySource::from_strings([["1"], ["x"], ["2"]]), force_cast())
        .expect("failures are skipped");
    assert_eq!(
        rows,
        vec![
            TableRow::Values(vec![Value::Integer(1)]),
            TableRow::Values(vec![Value::Integer(2)]),
        ]
    );
}

#[test]
fn csv_fixture_streams_typed_rows() {
    let table = Table::new(people_schema(), HeaderSpec::default());
    let source = CsvSource::open(&fixture_path("people.csv"), b',', encoding_rs::UTF_8)
        .expect("people fixture");
    let options = IterOptions {
        keyed: true,
        ..IterOptions::default()
    };
    let rows = table.read(source, options).expect("fixture is valid");
    assert_eq!(rows.len(), 5);
    let barbara = &rows[3];
    assert!(matches!(barbara, TableRow::Keyed(_)));
    assert_eq!(barbara.get("email"), Some(&Value::Null));
    assert_eq!(barbara.get("age"), Some(&Value::Integer(51)));
    assert_eq!(barbara.get("height"), Some(&Value::Number(1.62)));
    assert_eq!(
        barbara.get("joined").map(Value::as_display).as_deref(),
        Some("2019-06-30")
    );
    let TableRow::Keyed(pairs) = barbara else {
        panic!("expected keyed rows");
    };
    let names: Vec<&str> = pairs.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["id", "name", "email", "height", "age", "joined"]);
}

#[test]
fn degraded_fields_fail_rows_that_use_them() {
    let schema = lenient_schema(json!({
        "fields": [
            {"name": "id", "type": "integer"},
            {"name": "when", "type": "date", "format": "sometimes"}
        ]
    }));
    assert!(!schema.is_valid());
    let table = Table::new(schema, HeaderSpec::None);
    let results: Vec<_> = table
        .iter(MemorySource::from_strings([["1", "2024-01-01"]]), force_cast())
        .collect();
    let err = results[0].as_ref().expect_err("degraded field cannot cast");
    assert_eq!(err.nested()[0].column_number(), Some(2));
}

#[test]
fn serialized_errors_keep_positions() {
    let schema = strict_schema(json!({"fields": [{"name": "n", "type": "integer"}]}));
    let table = Table::new(schema, HeaderSpec::None);
    let err = table
        .read(MemorySource::from_strings([["x"]]), IterOptions::default())
        .expect_err("cast failure");
    let record = serde_json::to_value(err.to_record()).expect("serializable");
    assert_eq!(record["rowNumber"], json!(1));
    assert_eq!(record["errors"][0]["columnNumber"], json!(1));
}
