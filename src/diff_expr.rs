//! Per-column diff projections.
//!
//! Each compared column contributes `<col>_a`, `<col>_b` (unless side columns
//! are suppressed) and `<col>_diff`. How `<col>_diff` is computed depends on
//! the column's logical type:
//!
//! | variant        | types               | one side NULL         | both equal |
//! |----------------|---------------------|-----------------------|------------|
//! | `NumericDiff`  | integer, decimal    | the non-NULL value    | NULL       |
//! | `DateDiff`     | date                | `1` / `-1`            | NULL       |
//! | `IntervalDiff` | datetime            | `±1 day` interval     | NULL       |
//! | `BooleanDiff`  | everything else     | `TRUE`                | NULL       |
//!
//! Numeric columns surface the surviving raw value while date-like columns
//! surface a fixed presence flag.

use crate::{
    catalog::CatalogColumn,
    sql::{ident, qualified, suffixed},
    types::AtomicType,
};

pub const SIDE_A: &str = "a";
pub const SIDE_B: &str = "b";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffVariant {
    NumericDiff,
    DateDiff,
    IntervalDiff,
    BooleanDiff,
}

impl DiffVariant {
    pub fn for_type(datatype: AtomicType) -> Self {
        match datatype {
            AtomicType::Integer | AtomicType::Decimal => DiffVariant::NumericDiff,
            AtomicType::Date => DiffVariant::DateDiff,
            AtomicType::DateTime => DiffVariant::IntervalDiff,
            AtomicType::String | AtomicType::Uuid | AtomicType::Boolean => {
                DiffVariant::BooleanDiff
            }
        }
    }

    /// Storage type of the resulting `<col>_diff` column given the source
    /// column's storage type.
    pub fn diff_storage_type<'a>(&self, source_physical: &'a str) -> &'a str {
        match self {
            DiffVariant::NumericDiff => source_physical,
            DiffVariant::DateDiff => "integer",
            DiffVariant::IntervalDiff => "interval",
            DiffVariant::BooleanDiff => "boolean",
        }
    }

    /// SQL expression computing the diff of `a` and `b`.
    pub fn expression(&self, a: &str, b: &str) -> String {
        match self {
            DiffVariant::NumericDiff => format!(
                "CASE WHEN {a} IS NULL THEN {b} WHEN {b} IS NULL THEN {a} ELSE NULLIF({b} - {a}, 0) END"
            ),
            DiffVariant::DateDiff => format!(
                "CASE WHEN {a} IS NULL AND {b} IS NULL THEN NULL WHEN {a} IS NULL THEN 1 WHEN {b} IS NULL THEN -1 ELSE NULLIF({b} - {a}, 0) END"
            ),
            DiffVariant::IntervalDiff => format!(
                "CASE WHEN {a} IS NULL AND {b} IS NULL THEN NULL WHEN {a} IS NULL THEN INTERVAL '1 day' WHEN {b} IS NULL THEN INTERVAL '-1 day' ELSE NULLIF({b} - {a}, INTERVAL '0') END"
            ),
            DiffVariant::BooleanDiff => format!("NULLIF({a} IS DISTINCT FROM {b}, FALSE)"),
        }
    }
}

/// One compared column of table A and how it is diffed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffColumnPlan {
    pub column: CatalogColumn,
    pub variant: DiffVariant,
}

impl DiffColumnPlan {
    pub fn new(column: CatalogColumn) -> Self {
        let variant = DiffVariant::for_type(column.logical);
        Self { column, variant }
    }

    pub fn name(&self) -> &str {
        &self.column.name
    }

    pub fn projection(&self, suppress_side_columns: bool) -> String {
        build(self.name(), self.variant, suppress_side_columns)
    }

    pub fn inequality(&self) -> String {
        inequality(self.name())
    }

    /// Columns this plan contributes to the diff table, in order.
    pub fn output_columns(&self, suppress_side_columns: bool) -> Vec<CatalogColumn> {
        let name = self.name();
        let mut columns = Vec::with_capacity(3);
        if !suppress_side_columns {
            columns.push(side_column(&self.column, SIDE_A));
            columns.push(side_column(&self.column, SIDE_B));
        }
        columns.push(CatalogColumn::from_physical(
            format!("{name}_diff"),
            self.variant.diff_storage_type(&self.column.physical),
        ));
        columns
    }
}

fn side_column(column: &CatalogColumn, side: &str) -> CatalogColumn {
    CatalogColumn::new(
        format!("{}_{side}", column.name),
        column.logical,
        column.physical.clone(),
    )
}

/// Projection fragment for one column: side values (optional) and the diff.
pub fn build(column: &str, variant: DiffVariant, suppress_side_columns: bool) -> String {
    let a = qualified(SIDE_A, column);
    let b = qualified(SIDE_B, column);
    let diff = format!(
        "({}) AS {}",
        variant.expression(&a, &b),
        suffixed(column, "diff")
    );
    if suppress_side_columns {
        diff
    } else {
        format!(
            "{a} AS {}, {b} AS {}, {diff}",
            suffixed(column, SIDE_A),
            suffixed(column, SIDE_B)
        )
    }
}

/// Raw inequality between both sides; used as the row filter.
pub fn inequality(column: &str) -> String {
    format!(
        "({} <> {})",
        qualified(SIDE_A, column),
        qualified(SIDE_B, column)
    )
}

/// Predicate that keeps rows present on only one side of the join.
pub fn one_sided(key: &str) -> String {
    format!(
        "({} IS NULL) OR ({} IS NULL)",
        qualified(SIDE_A, key),
        qualified(SIDE_B, key)
    )
}

/// Bare join key projection; `USING` merges both sides into one column.
pub fn key_projection(key: &str) -> String {
    ident(key).into_owned()
}
