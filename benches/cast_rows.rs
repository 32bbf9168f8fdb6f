use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use serde_json::{Value as JsonValue, json};
use tabular_schema::cli::CastArgs;
use tabular_schema::process;
use tabular_schema::{HeaderSpec, IterOptions, MemorySource, Schema, SchemaOptions, Table};
use tempfile::TempDir;

fn descriptor() -> JsonValue {
    json!({
        "fields": [
            {"name": "id", "type": "integer", "constraints": {"required": true}},
            {"name": "ordered_at", "type": "date"},
            {"name": "ship_time", "type": "time"},
            {"name": "status", "type": "string",
             "constraints": {"enum": ["shipped", "pending", "processing"]}},
            {"name": "amount", "type": "number", "constraints": {"minimum": 0}}
        ],
        "primaryKey": "id"
    })
}

fn order_row(i: usize) -> [String; 5] {
    let status = match i % 3 {
        0 => "shipped",
        1 => "pending",
        _ => "processing",
    };
    let day = (i % 28) + 1;
    let hour = (i % 23) + 1;
    [
        i.to_string(),
        format!("2024-01-{day:02}"),
        format!("{hour:02}:00:00"),
        status.to_string(),
        format!("{}.{:02}", i % 500, i % 100),
    ]
}

fn generate_orders(rows: usize) -> (TempDir, PathBuf, PathBuf) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let csv_path = temp_dir.path().join("orders.csv");
    let mut file = File::create(&csv_path).expect("create csv");
    writeln!(file, "id,ordered_at,ship_time,status,amount").expect("header");
    for i in 0..rows {
        writeln!(file, "{}", order_row(i).join(",")).expect("row");
    }
    let schema_path = temp_dir.path().join("orders.schema.json");
    fs::write(&schema_path, descriptor().to_string()).expect("schema");
    (temp_dir, csv_path, schema_path)
}

fn cast_args(input: &Path, schema: &Path) -> CastArgs {
    CastArgs {
        input: input.to_path_buf(),
        schema: schema.to_path_buf(),
        force_cast: false,
        limit: None,
        table: false,
        relations: Vec::new(),
        delimiter: None,
        input_encoding: None,
    }
}

fn bench_cast_rows(c: &mut Criterion) {
    let schema =
        Schema::from_value(descriptor(), SchemaOptions::strict()).expect("valid descriptor");
    let table = Table::new(schema, HeaderSpec::None);
    let rows: Vec<[String; 5]> = (0..20_000).map(order_row).collect();

    let (temp_dir, csv_path, schema_path) = generate_orders(20_000);
    let args = cast_args(&csv_path, &schema_path);

    let mut group = c.benchmark_group("cast_rows");

    group.bench_function("table_read_in_memory", |b| {
        b.iter_batched(
            || MemorySource::from_strings(rows.clone()),
            |source| {
                table
                    .read(source, IterOptions::default())
                    .expect("rows cast");
            },
            BatchSize::LargeInput,
        );
    });

    group.bench_function("cast_command_csv", |b| {
        b.iter(|| {
            process::cast_into(&args, io::sink()).expect("cast command");
        });
    });

    drop(temp_dir);
    group.finish();
}

criterion_group!(benches, bench_cast_rows);
criterion_main!(benches);
