//! Aggregate rollup of a diff table.
//!
//! Every `<col>_diff` column of the diff table becomes one aggregate in a
//! single-row stats table: `SUM` for numeric, date, and interval storage (the
//! physical storage kind decides, not the logical type), `COUNT` of non-NULL
//! diffs for everything else. Date diffs carry `±1` presence sentinels, so
//! their sums count appearances minus disappearances rather than days.

use itertools::Itertools;
use log::{debug, info};

use crate::{
    catalog::{CatalogColumn, Connection},
    error::{DbxError, Result},
    sql::{create_table_as, drop_table_if_exists, ident, suffixed},
};

pub const DIFF_SUFFIX: &str = "_diff";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Count,
}

impl Aggregate {
    pub fn for_column(column: &CatalogColumn) -> Self {
        if column.storage_kind().is_summable() {
            Aggregate::Sum
        } else {
            Aggregate::Count
        }
    }

    pub fn function(&self) -> &'static str {
        match self {
            Aggregate::Sum => "SUM",
            Aggregate::Count => "COUNT",
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            Aggregate::Sum => "sum",
            Aggregate::Count => "count",
        }
    }
}

/// One output column of the stats table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatColumn {
    pub base: String,
    pub source: String,
    pub aggregate: Aggregate,
}

impl StatColumn {
    pub fn name(&self) -> String {
        format!("{}_{}", self.base, self.aggregate.suffix())
    }

    pub fn projection(&self) -> String {
        format!(
            "{}({}) AS {}",
            self.aggregate.function(),
            ident(&self.source),
            suffixed(&self.base, self.aggregate.suffix())
        )
    }
}

#[derive(Debug, Clone)]
pub struct StatsStatements {
    pub stats_table: String,
    pub drop: Option<String>,
    pub create: String,
    pub columns: Vec<StatColumn>,
}

impl StatsStatements {
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.drop
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.create.as_str()))
    }
}

pub fn stats_table_name(diff_table: &str) -> String {
    format!("{diff_table}_stats")
}

/// Aggregates planned for a diff table catalogue, in catalogue order.
pub fn stat_columns(catalogue: &[CatalogColumn]) -> Vec<StatColumn> {
    catalogue
        .iter()
        .filter_map(|column| {
            let base = column.name.strip_suffix(DIFF_SUFFIX)?;
            if base.is_empty() {
                return None;
            }
            Some(StatColumn {
                base: base.to_string(),
                source: column.name.clone(),
                aggregate: Aggregate::for_column(column),
            })
        })
        .collect()
}

/// Builds the stats statements from an already-read diff table catalogue.
/// `stats_exists` tells whether the stats table is already present.
pub fn aggregate(
    diff_table: &str,
    catalogue: &[CatalogColumn],
    force: bool,
    stats_exists: bool,
) -> Result<StatsStatements> {
    let stats_table = stats_table_name(diff_table);
    if stats_exists && !force {
        return Err(DbxError::SchemaConflict { table: stats_table });
    }
    let columns = stat_columns(catalogue);
    if columns.is_empty() {
        return Err(DbxError::NoDiffColumns(diff_table.to_string()));
    }
    let select = format!(
        "SELECT\n  {}\nFROM {}",
        columns.iter().map(StatColumn::projection).join(",\n  "),
        ident(diff_table)
    );
    let create = create_table_as(&stats_table, &select);
    debug!("Stats statement for {stats_table}:\n{create}");
    Ok(StatsStatements {
        drop: force.then(|| drop_table_if_exists(&stats_table)),
        stats_table,
        create,
        columns,
    })
}

/// Reads the diff table catalogue back and creates its stats table.
pub fn run_stats<C>(diff_table: &str, force: bool, connection: &mut C) -> Result<StatsStatements>
where
    C: Connection + ?Sized,
{
    let catalogue = connection
        .columns(diff_table)
        .map_err(DbxError::Execution)?;
    if catalogue.is_empty() {
        return Err(DbxError::UnknownTable(diff_table.to_string()));
    }
    let stats_exists = connection
        .table_exists(&stats_table_name(diff_table))
        .map_err(DbxError::Execution)?;
    let statements = aggregate(diff_table, &catalogue, force, stats_exists)?;
    info!("Creating stats table {}", statements.stats_table);
    for sql in statements.statements() {
        connection.execute(sql).map_err(DbxError::Execution)?;
    }
    Ok(statements)
}
