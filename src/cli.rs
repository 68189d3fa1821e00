use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about = "Infer CSV schemas and build type-aware SQL diffs", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./dbx.yml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Sample a CSV file and print the inferred column types
    Infer(InferArgs),
    /// Write a psql script that imports two CSV files and diffs them
    Diff(DiffArgs),
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum InferFormat {
    #[default]
    Yaml,
    Json,
    Sql,
}

#[derive(Debug, Args)]
pub struct InputOptions {
    /// Number of data rows to sample (defaults to `sample_rows` from the config)
    #[arg(long)]
    pub sample_rows: Option<usize>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input files (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct InferArgs {
    /// Input CSV file to sample ('-' for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Output format
    #[arg(long, value_enum, default_value_t = InferFormat::Yaml)]
    pub format: InferFormat,
    /// Table name for `--format sql` (defaults to the file stem)
    #[arg(long)]
    pub table: Option<String>,
    #[command(flatten)]
    pub input_options: InputOptions,
}

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Initial-state CSV file (table A)
    pub source_a: PathBuf,
    /// Newer CSV file (table B)
    pub source_b: PathBuf,
    /// Join columns shared by both files
    #[arg(long = "using", value_delimiter = ',', default_value = "id")]
    pub using: Vec<String>,
    /// Columns to leave out of the comparison
    #[arg(long = "exclude", value_delimiter = ',')]
    pub exclude: Vec<String>,
    /// Emit only `<col>_diff` columns, without the `<col>_a` / `<col>_b` values
    #[arg(long = "suppress-side-columns")]
    pub suppress_side_columns: bool,
    /// Replace tables that already exist
    #[arg(long)]
    pub force: bool,
    /// Also create the `<diff>_stats` rollup table
    #[arg(long)]
    pub stats: bool,
    /// Skip per-column index creation after import
    #[arg(long = "no-index")]
    pub no_index: bool,
    /// Prefix the script with a `\connect` to the configured database
    #[arg(long)]
    pub connect: bool,
    /// Database URL for `--connect` (overrides DATABASE_URL and `db`)
    #[arg(long)]
    pub db: Option<String>,
    /// Script destination (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    #[command(flatten)]
    pub input_options: InputOptions,
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
