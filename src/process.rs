//! The `cast` command: streams a delimited file through a schema pipeline and
//! writes typed rows as delimited text or an aligned table.

use std::{
    collections::HashMap,
    io::{self, Write},
    path::PathBuf,
};

use anyhow::{Context, Result, anyhow};
use log::{info, warn};

use crate::{
    cli::CastArgs,
    data::Value,
    error::Error,
    io_utils, render,
    schema::{Schema, SchemaOptions},
    source::CsvSource,
    table::{HeaderSpec, IterOptions, Relations, Table},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CastSummary {
    pub emitted: usize,
    pub failed: usize,
}

enum Output<W: Write> {
    Delimited(csv::Writer<W>),
    Table {
        writer: W,
        headers: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
}

impl<W: Write> Output<W> {
    fn new(writer: W, headers: Vec<String>, delimiter: u8, table: bool) -> Result<Self> {
        if table {
            return Ok(Output::Table {
                writer,
                headers,
                rows: Vec::new(),
            });
        }
        let mut csv_writer = io_utils::open_csv_writer(writer, delimiter);
        csv_writer
            .write_record(&headers)
            .context("Writing output headers")?;
        Ok(Output::Delimited(csv_writer))
    }

    fn push(&mut self, values: Vec<Value>) -> Result<()> {
        match self {
            Output::Delimited(writer) => writer
                .write_record(values.iter().map(Value::as_display))
                .context("Writing output row"),
            Output::Table { rows, .. } => {
                rows.push(values);
                Ok(())
            }
        }
    }

    fn finish(self) -> Result<()> {
        match self {
            Output::Delimited(mut writer) => writer.flush().context("Flushing output"),
            Output::Table {
                mut writer,
                headers,
                rows,
            } => {
                writer
                    .write_all(render::render_rows(&headers, &rows).as_bytes())
                    .context("Writing table output")?;
                writer.flush().context("Flushing output")
            }
        }
    }
}

pub fn execute(args: &CastArgs) -> Result<()> {
    let stdout = io::stdout();
    let summary = cast_into(args, stdout.lock())?;
    info!(
        "Cast {} row(s) from {:?}; {} row(s) failed",
        summary.emitted, args.input, summary.failed
    );
    Ok(())
}

/// Runs the pipeline and writes its output to `writer`. Without
/// `--force-cast` the first failing row ends the command with an error, after
/// the rows before it have been written.
pub fn cast_into<W: Write>(args: &CastArgs, writer: W) -> Result<CastSummary> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let schema = Schema::load(&args.schema, SchemaOptions::strict())?;
    info!(
        "Casting '{}' with {} field(s) from {:?} (delimiter '{}')",
        args.input.display(),
        schema.fields().len(),
        args.schema,
        crate::printable_delimiter(delimiter)
    );

    let relations = load_relations(&args.relations, encoding)?;
    let headers: Vec<String> = schema
        .field_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let table = Table::new(schema, HeaderSpec::default());
    let source = CsvSource::open(&args.input, delimiter, encoding)?;
    let options = IterOptions {
        force_cast: args.force_cast,
        relations: (!relations.is_empty()).then_some(relations),
        limit: args.limit,
        ..IterOptions::default()
    };

    let mut output = Output::new(writer, headers, delimiter, args.table)?;
    let mut summary = CastSummary::default();
    let mut fatal = None;
    for item in table.iter(source, options) {
        match item {
            Ok(row) => {
                summary.emitted += 1;
                output.push(row.values().into_iter().cloned().collect())?;
            }
            Err(err) => {
                summary.failed += 1;
                log_row_error(&err);
                if !args.force_cast || matches!(err, Error::Source(_)) {
                    fatal = Some(err);
                }
            }
        }
    }
    output.finish()?;
    match fatal {
        Some(err) => Err(anyhow!(err)).with_context(|| format!("Casting {:?}", args.input)),
        None => Ok(summary),
    }
}

fn log_row_error(err: &Error) {
    match err.row_number() {
        Some(row) => warn!("Row {row}: {err}"),
        None => warn!("{err}"),
    }
    for nested in err.nested() {
        match nested.column_number() {
            Some(column) => warn!("  column {column}: {nested}"),
            None => warn!("  {nested}"),
        }
    }
}

fn load_relations(
    specs: &[(String, PathBuf)],
    encoding: &'static encoding_rs::Encoding,
) -> Result<Relations> {
    let mut relations = HashMap::new();
    for (name, path) in specs {
        let delimiter = io_utils::resolve_input_delimiter(path, None);
        let rows = io_utils::read_keyed_rows(path, delimiter, encoding)
            .with_context(|| format!("Loading relation '{name}' from {path:?}"))?;
        info!("Loaded {} reference row(s) for '{name}'", rows.len());
        relations.insert(name.clone(), rows);
    }
    Ok(relations)
}
