pub mod cli;
pub mod constraints;
pub mod data;
pub mod error;
pub mod field;
pub mod infer;
pub mod io_utils;
pub mod process;
pub mod profile;
pub mod render;
pub mod schema;
pub mod source;
pub mod table;
pub mod types;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, error, info};

pub use crate::{
    data::Value,
    error::{Error, ErrorRecord},
    field::{Field, FieldDescriptor},
    schema::{CastRowOptions, Descriptor, Schema, SchemaOptions},
    source::{CsvSource, MemorySource, RowSource},
    table::{HeaderSpec, IterOptions, PipelineState, Table, TableRow},
    types::{CastOptions, FieldType, Format},
};

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("tabular_schema", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Validate(args) => handle_validate(&args),
        Commands::Infer(args) => handle_infer(&args),
        Commands::Cast(args) => process::execute(&args),
    }
}

fn handle_validate(args: &cli::ValidateArgs) -> Result<()> {
    let schema = Schema::load(&args.schema, SchemaOptions::default())?;
    if schema.is_valid() {
        info!(
            "Schema {:?} is valid ({} field(s))",
            args.schema,
            schema.fields().len()
        );
        println!("valid");
        return Ok(());
    }
    for err in schema.errors() {
        error!("{err}");
        println!("{err}");
    }
    bail!(
        "Schema {:?} has {} error(s)",
        args.schema,
        schema.errors().len()
    );
}

fn handle_infer(args: &cli::InferArgs) -> Result<()> {
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    info!(
        "Inferring schema from '{}' with delimiter '{}'",
        args.input.display(),
        printable_delimiter(delimiter)
    );
    let source = CsvSource::open(&args.input, delimiter, encoding)?;
    let schema = Table::infer(source, &HeaderSpec::default(), args.sample_rows)
        .with_context(|| format!("Inferring schema from {:?}", args.input))?;
    match &args.output {
        Some(path) => {
            schema.save(path)?;
            info!(
                "Inferred schema for {} field(s) written to {path:?}",
                schema.fields().len()
            );
        }
        None => {
            let rendered = serde_json::to_string_pretty(schema.descriptor())
                .context("Serializing inferred descriptor")?;
            println!("{rendered}");
        }
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
