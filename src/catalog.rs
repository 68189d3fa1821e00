//! Database collaborator seam.
//!
//! The diff and stats builders never talk to a database directly. They read
//! column catalogues through [`Catalog`] and issue statements through
//! [`Connection`]; the host decides whether that is a live database or the
//! dry-run [`crate::script::ScriptConnection`].

use anyhow::Result;

use crate::{infer::ColumnTypeMap, types::AtomicType};

/// One row returned by [`Connection::query`]: column name and textual value.
pub type Row = Vec<(String, Option<String>)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogColumn {
    pub name: String,
    pub logical: AtomicType,
    pub physical: String,
}

impl CatalogColumn {
    pub fn new(name: impl Into<String>, logical: AtomicType, physical: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            logical,
            physical: physical.into(),
        }
    }

    /// Builds a column from its storage type, deriving the logical type.
    pub fn from_physical(name: impl Into<String>, physical: impl Into<String>) -> Self {
        let physical = physical.into();
        Self {
            name: name.into(),
            logical: AtomicType::from_physical(&physical),
            physical,
        }
    }

    pub fn storage_kind(&self) -> StorageKind {
        StorageKind::of(&self.physical)
    }
}

/// Physical storage families that matter for aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Numeric,
    Temporal,
    Interval,
    Boolean,
    Other,
}

impl StorageKind {
    pub fn of(physical: &str) -> Self {
        let normalized = physical.trim().to_ascii_lowercase();
        if normalized.starts_with("interval") {
            return StorageKind::Interval;
        }
        match AtomicType::from_physical(&normalized) {
            AtomicType::Integer | AtomicType::Decimal => StorageKind::Numeric,
            AtomicType::Date | AtomicType::DateTime => StorageKind::Temporal,
            AtomicType::Boolean => StorageKind::Boolean,
            AtomicType::String | AtomicType::Uuid => StorageKind::Other,
        }
    }

    /// Whether `SUM` is meaningful for values of this kind.
    pub fn is_summable(&self) -> bool {
        matches!(
            self,
            StorageKind::Numeric | StorageKind::Temporal | StorageKind::Interval
        )
    }
}

/// Catalogue as imported from an inferred schema.
pub fn catalogue_from_types(types: &ColumnTypeMap) -> Vec<CatalogColumn> {
    types
        .iter()
        .map(|(name, datatype)| CatalogColumn::new(name, datatype, datatype.physical_type()))
        .collect()
}

pub trait Catalog {
    /// Ordered columns of `table`; empty when the table does not exist.
    fn columns(&self, table: &str) -> Result<Vec<CatalogColumn>>;

    fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(!self.columns(table)?.is_empty())
    }
}

pub trait Connection: Catalog {
    fn execute(&mut self, sql: &str) -> Result<()>;

    fn query(&mut self, sql: &str) -> Result<Vec<Row>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::InferredColumn;

    #[test]
    fn storage_kind_separates_intervals_from_numbers() {
        assert_eq!(StorageKind::of("interval"), StorageKind::Interval);
        assert_eq!(StorageKind::of("INTERVAL DAY"), StorageKind::Interval);
        assert_eq!(StorageKind::of("bigint"), StorageKind::Numeric);
        assert_eq!(StorageKind::of("numeric(12,2)"), StorageKind::Numeric);
        assert_eq!(StorageKind::of("date"), StorageKind::Temporal);
        assert_eq!(
            StorageKind::of("timestamp with time zone"),
            StorageKind::Temporal
        );
        assert_eq!(StorageKind::of("boolean"), StorageKind::Boolean);
        assert_eq!(StorageKind::of("text"), StorageKind::Other);
    }

    #[test]
    fn only_numeric_and_temporal_kinds_are_summable() {
        assert!(StorageKind::Interval.is_summable());
        assert!(StorageKind::Numeric.is_summable());
        assert!(!StorageKind::Boolean.is_summable());
        assert!(!StorageKind::Other.is_summable());
    }

    #[test]
    fn catalogue_uses_import_storage_types() {
        let types = ColumnTypeMap {
            columns: vec![
                InferredColumn {
                    name: "id".to_string(),
                    datatype: AtomicType::Integer,
                },
                InferredColumn {
                    name: "seen_at".to_string(),
                    datatype: AtomicType::DateTime,
                },
            ],
        };
        let catalogue = catalogue_from_types(&types);
        assert_eq!(catalogue[0], CatalogColumn::new("id", AtomicType::Integer, "bigint"));
        assert_eq!(catalogue[1].physical, "timestamp");
    }
}
