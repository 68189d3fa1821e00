//! Import-and-diff workflow behind `dbx diff`.
//!
//! Both sources are sampled, their imports are written to the script, and the
//! diff (and optionally stats) statements are produced by running the core
//! against a [`ScriptConnection`]. The resulting script can be replayed with
//! `psql -f`.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::DiffArgs,
    config::Config,
    diff::{DiffSpec, run_diff},
    import::{ImportRequest, import_table, table_name_for},
    infer::SchemaCache,
    infer_source, io_utils,
    script::ScriptConnection,
    stats::run_stats,
};

pub fn execute(args: &DiffArgs, config: &Config) -> Result<()> {
    let connection = build_script(args, config)?;
    let mut writer = io_utils::open_output(args.output.as_deref())?;
    connection.write_to(&mut writer)?;
    if let Some(path) = &args.output {
        info!("Script written to {path:?}");
    }
    Ok(())
}

/// Records every statement of the import-and-diff run into a script.
pub fn build_script(args: &DiffArgs, config: &Config) -> Result<ScriptConnection> {
    let mut connection = ScriptConnection::new();
    connection.comment(format!(
        "dbx diff of {} and {}",
        args.source_a.display(),
        args.source_b.display()
    ));
    if args.connect {
        let url = config
            .database_url(args.db.as_deref())
            .context("Resolving database for --connect")?;
        connection.meta(format!("\\connect {url}"));
    }

    let cache = SchemaCache::new();
    let tables = table_names(&args.source_a, &args.source_b);
    let sources = [&args.source_a, &args.source_b];
    for (position, (source, table)) in sources.into_iter().zip(&tables).enumerate() {
        let types = infer_source(&cache, source, &args.input_options, config)?;
        if position == 1 && tables[0] == tables[1] {
            info!("Table {table} already imported; reusing it");
            continue;
        }
        let request = ImportRequest {
            source,
            table,
            delimiter: io_utils::resolve_input_delimiter(source, args.input_options.delimiter),
            force: args.force,
            index: !args.no_index,
        };
        import_table(&mut connection, &request, &types)
            .with_context(|| format!("Importing {source:?}"))?;
    }

    let spec = DiffSpec::new(&tables[0], &tables[1], &args.using, &args.exclude)
        .with_force(args.force)
        .with_suppressed_side_columns(args.suppress_side_columns);
    let statements = run_diff(&spec, &mut connection)
        .with_context(|| format!("Building diff of {} and {}", tables[0], tables[1]))?;
    connection.register_table(&statements.diff_table, statements.output_columns.clone());
    info!(
        "Diff table {} compares {} column(s) on ({})",
        statements.diff_table,
        statements.plan.len(),
        spec.join_keys().join(", ")
    );

    if args.stats {
        let stats = run_stats(&statements.diff_table, args.force, &mut connection)
            .with_context(|| format!("Building stats for {}", statements.diff_table))?;
        info!(
            "Stats table {} aggregates {} column(s)",
            stats.stats_table,
            stats.columns.len()
        );
    }
    Ok(connection)
}

/// Table names for both sources. The same file maps to one table; distinct
/// files sharing a file stem get a `_b` suffix on the second table.
pub fn table_names(source_a: &Path, source_b: &Path) -> [String; 2] {
    let table_a = table_name_for(source_a);
    let mut table_b = table_name_for(source_b);
    if table_a == table_b && !same_file(source_a, source_b) {
        table_b.push_str("_b");
        info!("{source_b:?} shares its table name with {source_a:?}; importing it as {table_b}");
    }
    [table_a, table_b]
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
