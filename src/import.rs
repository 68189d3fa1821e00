//! Import statements for an inferred CSV source.
//!
//! The physical load is delegated to psql: the table is created from the
//! inferred [`ColumnTypeMap`], filled with `\copy`, and indexed one column at
//! a time.

use std::path::Path;

use itertools::Itertools;
use log::info;

use crate::{
    catalog::{Catalog, Connection, catalogue_from_types},
    error::{DbxError, Result},
    infer::ColumnTypeMap,
    script::ScriptConnection,
    sql::{drop_table_if_exists, ident, literal},
};

/// Table name for a source file: its file name without the extension.
pub fn table_name_for(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

pub fn create_table_sql(table: &str, types: &ColumnTypeMap) -> String {
    let columns = types
        .iter()
        .map(|(name, datatype)| format!("{} {} NULL", ident(name), datatype.physical_type()))
        .join(",\n  ");
    format!("CREATE TABLE {} (\n  {columns}\n)", ident(table))
}

pub fn copy_command(table: &str, types: &ColumnTypeMap, source: &Path, delimiter: u8) -> String {
    let columns = types.names().map(ident).join(", ");
    let mut options = String::from("CSV HEADER");
    if delimiter != b',' {
        options.push_str(&format!(
            " DELIMITER {}",
            literal(&(delimiter as char).to_string())
        ));
    }
    format!(
        "\\copy {}({columns}) FROM {} {options}",
        ident(table),
        literal(&source.to_string_lossy())
    )
}

/// Index name for the `position`-th column, e.g. `idx_people_03`.
pub fn index_name(table: &str, position: usize) -> String {
    format!("idx_{table}_{position:02}")
}

pub fn index_statements(table: &str, types: &ColumnTypeMap) -> Vec<String> {
    types
        .names()
        .enumerate()
        .map(|(position, column)| {
            format!(
                "CREATE INDEX {} ON {} ({})",
                ident(&index_name(table, position)),
                ident(table),
                ident(column)
            )
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct ImportRequest<'a> {
    pub source: &'a Path,
    pub table: &'a str,
    pub delimiter: u8,
    pub force: bool,
    pub index: bool,
}

/// Emits the import of one source into the script and registers the new
/// table's catalogue so later diff synthesis can read it back.
pub fn import_table(
    connection: &mut ScriptConnection,
    request: &ImportRequest<'_>,
    types: &ColumnTypeMap,
) -> Result<()> {
    let table = request.table;
    if !request.force && connection.table_exists(table).map_err(DbxError::Execution)? {
        return Err(DbxError::SchemaConflict {
            table: table.to_string(),
        });
    }
    info!(
        "Importing {:?} into {table} ({} column(s))",
        request.source,
        types.len()
    );
    if request.force {
        connection
            .execute(&drop_table_if_exists(table))
            .map_err(DbxError::Execution)?;
    }
    connection
        .execute(&create_table_sql(table, types))
        .map_err(DbxError::Execution)?;
    connection.meta(copy_command(table, types, request.source, request.delimiter));
    if request.index {
        for statement in index_statements(table, types) {
            connection.execute(&statement).map_err(DbxError::Execution)?;
        }
    }
    connection.register_table(table, catalogue_from_types(types));
    Ok(())
}
