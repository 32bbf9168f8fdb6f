//! Pull-based raw row sources consumed by the table pipeline.
//!
//! Any `Iterator<Item = anyhow::Result<Vec<serde_json::Value>>>` is a
//! [`RowSource`]. Two adapters are provided: [`MemorySource`] over an
//! in-memory row list and [`CsvSource`] over delimited text.

use std::{io::Read, path::Path};

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use serde_json::Value as JsonValue;

use crate::io_utils;

pub trait RowSource {
    /// `None` once the source is exhausted.
    fn next_row(&mut self) -> Option<Result<Vec<JsonValue>>>;
}

impl<I> RowSource for I
where
    I: Iterator<Item = Result<Vec<JsonValue>>>,
{
    fn next_row(&mut self) -> Option<Result<Vec<JsonValue>>> {
        self.next()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    rows: std::vec::IntoIter<Vec<JsonValue>>,
}

impl MemorySource {
    pub fn new(rows: Vec<Vec<JsonValue>>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }

    /// Convenience constructor for rows of plain text cells.
    pub fn from_strings<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self::new(
            rows.into_iter()
                .map(|row| {
                    row.into_iter()
                        .map(|cell| JsonValue::String(cell.into()))
                        .collect()
                })
                .collect(),
        )
    }
}

impl Iterator for MemorySource {
    type Item = Result<Vec<JsonValue>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next().map(Ok)
    }
}

/// Delimited text decoded with `encoding`; every record is yielded, header
/// rows included, so the pipeline decides which row holds the headers.
pub struct CsvSource<R: Read> {
    reader: csv::Reader<R>,
    encoding: &'static Encoding,
    record: csv::ByteRecord,
    line: u64,
}

impl<R: Read> std::fmt::Debug for CsvSource<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvSource")
            .field("encoding", &self.encoding.name())
            .field("line", &self.line)
            .finish()
    }
}

impl<R: Read> CsvSource<R> {
    pub fn new(reader: R, delimiter: u8, encoding: &'static Encoding) -> Self {
        Self {
            reader: io_utils::open_csv_reader(reader, delimiter),
            encoding,
            record: csv::ByteRecord::new(),
            line: 0,
        }
    }
}

impl CsvSource<Box<dyn Read>> {
    pub fn open(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<Self> {
        let reader = io_utils::open_input(path)?;
        Ok(Self::new(reader, delimiter, encoding))
    }
}

impl<R: Read> Iterator for CsvSource<R> {
    type Item = Result<Vec<JsonValue>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.line += 1;
        let line = self.line;
        match self.reader.read_byte_record(&mut self.record) {
            Ok(true) => Some(
                io_utils::decode_record(&self.record, self.encoding)
                    .map(|cells| cells.into_iter().map(JsonValue::String).collect())
                    .with_context(|| format!("Decoding record {line}")),
            ),
            Ok(false) => None,
            Err(err) => Some(Err(err).with_context(|| format!("Reading record {line}"))),
        }
    }
}
