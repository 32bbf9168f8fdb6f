use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Validate Table Schema descriptors and cast tabular data against them",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check a schema descriptor and report every problem found
    Validate(ValidateArgs),
    /// Infer a schema descriptor from a delimited file
    Infer(InferArgs),
    /// Stream a delimited file through a schema, emitting typed rows
    Cast(CastArgs),
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Schema descriptor (.json, .yml or .yaml)
    #[arg(short, long)]
    pub schema: PathBuf,
}

#[derive(Debug, Args)]
pub struct InferArgs {
    /// Input file to sample ('-' reads stdin)
    #[arg(short, long)]
    pub input: PathBuf,
    /// Destination descriptor (.json, .yml or .yaml); printed as JSON when omitted
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Number of data rows to sample
    #[arg(long, default_value_t = 1000)]
    pub sample_rows: usize,
    /// Delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct CastArgs {
    /// Input file to cast ('-' reads stdin)
    #[arg(short, long)]
    pub input: PathBuf,
    /// Schema descriptor (.json, .yml or .yaml)
    #[arg(short, long)]
    pub schema: PathBuf,
    /// Report failing rows and keep going instead of stopping at the first one
    #[arg(long)]
    pub force_cast: bool,
    /// Stop after this many rows
    #[arg(long)]
    pub limit: Option<usize>,
    /// Render an aligned table instead of delimited output
    #[arg(long)]
    pub table: bool,
    /// Reference dataset for foreign keys, as `resource=path.csv` (repeatable)
    #[arg(long = "relation", value_parser = parse_relation, action = clap::ArgAction::Append)]
    pub relations: Vec<(String, PathBuf)>,
    /// Delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

/// `name=path`; an empty name addresses self-referencing foreign keys.
pub fn parse_relation(value: &str) -> Result<(String, PathBuf), String> {
    let (name, path) = value
        .split_once('=')
        .ok_or_else(|| format!("Relation '{value}' must look like resource=path.csv"))?;
    if path.trim().is_empty() {
        return Err(format!("Relation '{value}' is missing a file path"));
    }
    Ok((name.trim().to_string(), PathBuf::from(path.trim())))
}
