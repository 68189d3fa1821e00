pub mod catalog;
pub mod classify;
pub mod cli;
pub mod compare;
pub mod config;
pub mod diff;
pub mod diff_expr;
pub mod error;
pub mod import;
pub mod infer;
pub mod io_utils;
pub mod script;
pub mod sql;
pub mod stats;
pub mod types;

use std::{env, io::Write, path::Path, sync::Arc, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    cli::{Cli, Commands, InferFormat, InputOptions},
    config::Config,
    infer::{ColumnTypeMap, SchemaCache},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("dbx", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Loading configuration")?;
    match cli.command {
        Commands::Infer(args) => handle_infer(&args, &config),
        Commands::Diff(args) => compare::execute(&args, &config),
    }
}

/// Samples `path` through `cache` using the delimiter, encoding, and sample
/// size resolved from `options` and `config`.
pub(crate) fn infer_source(
    cache: &SchemaCache,
    path: &Path,
    options: &InputOptions,
    config: &Config,
) -> Result<Arc<ColumnTypeMap>> {
    let delimiter = io_utils::resolve_input_delimiter(path, options.delimiter);
    let encoding = io_utils::resolve_encoding(options.input_encoding.as_deref())?;
    let sample_rows = options.sample_rows.unwrap_or(config.sample_rows);
    let overrides = config.pattern_overrides()?;
    info!(
        "Sampling up to {} row(s) of '{}' with delimiter '{}'",
        sample_rows + 1,
        path.display(),
        printable_delimiter(delimiter)
    );
    let source_id = path.display().to_string();
    let types = cache
        .get_or_infer(&source_id, sample_rows, &overrides, || {
            io_utils::read_rows(path, delimiter, encoding)
        })
        .with_context(|| format!("Inferring column types from {path:?}"))?;
    Ok(types)
}

fn handle_infer(args: &cli::InferArgs, config: &Config) -> Result<()> {
    let cache = SchemaCache::new();
    let types = infer_source(&cache, &args.input, &args.input_options, config)?;
    let rendered = match args.format {
        InferFormat::Yaml => serde_yaml::to_string(types.as_ref()).context("Rendering YAML")?,
        InferFormat::Json => {
            let mut json =
                serde_json::to_string_pretty(types.as_ref()).context("Rendering JSON")?;
            json.push('\n');
            json
        }
        InferFormat::Sql => {
            let table = args
                .table
                .clone()
                .unwrap_or_else(|| import::table_name_for(&args.input));
            format!("{};\n", import::create_table_sql(&table, &types))
        }
    };
    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(rendered.as_bytes())
        .context("Writing inferred schema")?;
    info!("Inferred {} column(s) from {:?}", types.len(), args.input);
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
