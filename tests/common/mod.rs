#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value as JsonValue;
use tabular_schema::{Schema, SchemaOptions};
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Scratch directory whose files are removed on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// Strictly built schema; panics with the descriptor errors otherwise.
pub fn strict_schema(descriptor: JsonValue) -> Schema {
    Schema::from_value(descriptor, SchemaOptions::strict()).expect("valid schema descriptor")
}

pub fn lenient_schema(descriptor: JsonValue) -> Schema {
    Schema::from_value(descriptor, SchemaOptions::default()).expect("non-strict build")
}

/// Rows of text cells, the shape a delimited source produces.
pub fn text_rows(rows: &[&[&str]]) -> Vec<Vec<JsonValue>> {
    rows.iter()
        .map(|row| row.iter().map(|cell| JsonValue::String(cell.to_string())).collect())
        .collect()
}
