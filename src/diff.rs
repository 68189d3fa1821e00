//! Diff table synthesis.
//!
//! [`synthesize()`] reads table A's catalogue and assembles
//!
//! ```sql
//! CREATE TABLE diff_a_b AS
//! SELECT <join keys>, <per-column projections>
//! FROM a AS a
//! FULL OUTER JOIN b AS b USING (<join keys>)
//! WHERE <any compared column differs, or the row exists on one side only>
//! ```
//!
//! together with a row-count summary query. [`run_diff()`] executes the
//! statements through a [`Connection`] and reports the counts.

use std::collections::BTreeSet;

use itertools::Itertools;
use log::{debug, info};

use crate::{
    catalog::{Catalog, CatalogColumn, Connection, Row},
    diff_expr::{DiffColumnPlan, SIDE_A, SIDE_B, key_projection, one_sided},
    error::{DbxError, Result},
    sql::{create_table_as, drop_table_if_exists, ident},
};

/// A requested comparison of two tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSpec {
    pub table_a: String,
    pub table_b: String,
    join_keys: Vec<String>,
    exclude_columns: BTreeSet<String>,
    pub suppress_side_columns: bool,
    pub force: bool,
}

impl DiffSpec {
    /// Join keys are lower-cased and deduplicated keeping their first
    /// position; exclusions are lower-cased.
    pub fn new<K, X>(
        table_a: impl Into<String>,
        table_b: impl Into<String>,
        join_keys: K,
        exclude_columns: X,
    ) -> Self
    where
        K: IntoIterator,
        K::Item: AsRef<str>,
        X: IntoIterator,
        X::Item: AsRef<str>,
    {
        let join_keys = join_keys
            .into_iter()
            .map(|key| key.as_ref().trim().to_ascii_lowercase())
            .filter(|key| !key.is_empty())
            .unique()
            .collect();
        let exclude_columns = exclude_columns
            .into_iter()
            .map(|column| column.as_ref().trim().to_ascii_lowercase())
            .filter(|column| !column.is_empty())
            .collect();
        Self {
            table_a: table_a.into(),
            table_b: table_b.into(),
            join_keys,
            exclude_columns,
            suppress_side_columns: false,
            force: false,
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_suppressed_side_columns(mut self, suppress: bool) -> Self {
        self.suppress_side_columns = suppress;
        self
    }

    pub fn join_keys(&self) -> &[String] {
        &self.join_keys
    }

    pub fn exclude_columns(&self) -> &BTreeSet<String> {
        &self.exclude_columns
    }

    pub fn diff_table(&self) -> String {
        diff_table_name(&self.table_a, &self.table_b)
    }

    /// Whether a catalogue column takes part in the comparison.
    pub fn is_compared(&self, column: &str) -> bool {
        let lowered = column.to_ascii_lowercase();
        !self.join_keys.contains(&lowered) && !self.exclude_columns.contains(&lowered)
    }
}

pub fn diff_table_name(table_a: &str, table_b: &str) -> String {
    format!("diff_{table_a}_{table_b}")
}

/// Everything needed to materialize one diff table.
#[derive(Debug, Clone)]
pub struct DiffStatements {
    pub diff_table: String,
    /// `DROP TABLE IF EXISTS`, only when `force` was requested.
    pub drop: Option<String>,
    pub create: String,
    pub count_summary: String,
    pub plan: Vec<DiffColumnPlan>,
    /// Catalogue the created diff table will have.
    pub output_columns: Vec<CatalogColumn>,
}

impl DiffStatements {
    pub fn statements(&self) -> impl Iterator<Item = &str> {
        self.drop
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.create.as_str()))
    }
}

/// Builds the diff statements for `spec` from table A's catalogue.
pub fn synthesize<C>(spec: &DiffSpec, catalog: &C) -> Result<DiffStatements>
where
    C: Catalog + ?Sized,
{
    if spec.join_keys.is_empty() {
        return Err(DbxError::MissingJoinKeys {
            table_a: spec.table_a.clone(),
            table_b: spec.table_b.clone(),
        });
    }
    let diff_table = spec.diff_table();
    if !spec.force && catalog.table_exists(&diff_table).map_err(DbxError::Execution)? {
        return Err(DbxError::SchemaConflict { table: diff_table });
    }

    let catalogue = catalog
        .columns(&spec.table_a)
        .map_err(DbxError::Execution)?;
    if catalogue.is_empty() {
        return Err(DbxError::UnknownTable(spec.table_a.clone()));
    }

    let keys = resolve_keys(spec, &catalogue)?;
    let plan = plan_columns(spec, catalogue);

    let select = [
        select_list(&keys, &plan, spec.suppress_side_columns),
        join_clause(spec, &keys),
        where_clause(&keys, &plan),
    ]
    .join("\n");
    let create = create_table_as(&diff_table, &select);
    debug!("Diff statement for {diff_table}:\n{create}");

    let output_columns = keys
        .into_iter()
        .chain(
            plan.iter()
                .flat_map(|column| column.output_columns(spec.suppress_side_columns)),
        )
        .collect();

    Ok(DiffStatements {
        drop: spec.force.then(|| drop_table_if_exists(&diff_table)),
        count_summary: count_summary(&spec.table_a, &spec.table_b, &diff_table),
        create,
        diff_table,
        plan,
        output_columns,
    })
}

/// Compared columns of table A, in catalogue order.
pub fn plan_columns(spec: &DiffSpec, catalogue: Vec<CatalogColumn>) -> Vec<DiffColumnPlan> {
    catalogue
        .into_iter()
        .filter(|column| spec.is_compared(&column.name))
        .map(DiffColumnPlan::new)
        .collect()
}

/// Catalogue columns of table A named by the join keys, in key order. An
/// exact match wins over a case-insensitive one.
pub fn resolve_keys(spec: &DiffSpec, catalogue: &[CatalogColumn]) -> Result<Vec<CatalogColumn>> {
    spec.join_keys
        .iter()
        .map(|key| {
            catalogue
                .iter()
                .find(|column| column.name == *key)
                .or_else(|| {
                    catalogue
                        .iter()
                        .find(|column| column.name.eq_ignore_ascii_case(key))
                })
                .cloned()
                .ok_or_else(|| DbxError::UnknownColumn {
                    table: spec.table_a.clone(),
                    column: key.clone(),
                })
        })
        .collect()
}

/// `SELECT` list: join keys once, then every planned column.
pub fn select_list(
    keys: &[CatalogColumn],
    plan: &[DiffColumnPlan],
    suppress_side_columns: bool,
) -> String {
    let projections = keys
        .iter()
        .map(|key| key_projection(&key.name))
        .chain(plan.iter().map(|column| column.projection(suppress_side_columns)))
        .join(",\n  ");
    format!("SELECT\n  {projections}")
}

pub fn join_clause(spec: &DiffSpec, keys: &[CatalogColumn]) -> String {
    format!(
        "FROM {} AS {SIDE_A}\nFULL OUTER JOIN {} AS {SIDE_B} USING ({})",
        ident(&spec.table_a),
        ident(&spec.table_b),
        keys.iter().map(|key| ident(&key.name)).join(", ")
    )
}

/// Keeps rows where any compared column differs. Rows present on one side
/// only are kept through the first join key being NULL on the other side.
pub fn where_clause(keys: &[CatalogColumn], plan: &[DiffColumnPlan]) -> String {
    let predicates = plan
        .iter()
        .map(DiffColumnPlan::inequality)
        .chain(keys.first().map(|key| one_sided(&key.name)))
        .join("\n  OR ");
    format!("WHERE\n  {predicates}")
}

pub fn count_summary(table_a: &str, table_b: &str, diff_table: &str) -> String {
    format!(
        "SELECT\n  (SELECT COUNT(*) FROM {}) AS count_table_a,\n  (SELECT COUNT(*) FROM {}) AS count_table_b,\n  (SELECT COUNT(*) FROM {}) AS diffs",
        ident(table_a),
        ident(table_b),
        ident(diff_table)
    )
}

/// Synthesizes and executes a diff, then runs the count summary.
///
/// Nothing is rolled back on failure: a created diff table survives a failed
/// summary query.
pub fn run_diff<C>(spec: &DiffSpec, connection: &mut C) -> Result<DiffStatements>
where
    C: Connection + ?Sized,
{
    let statements = synthesize(spec, &*connection)?;
    info!("Creating diff table {}", statements.diff_table);
    for sql in statements.statements() {
        connection.execute(sql).map_err(DbxError::Execution)?;
    }
    let rows = connection
        .query(&statements.count_summary)
        .map_err(DbxError::Execution)?;
    if let Some(row) = rows.first() {
        info!("{}", describe_row(row));
    }
    info!(
        "Diff complete. Result details in: {}",
        statements.diff_table
    );
    Ok(statements)
}

fn describe_row(row: &Row) -> String {
    row.iter()
        .map(|(name, value)| format!("{name}={}", value.as_deref().unwrap_or("NULL")))
        .join(", ")
}
