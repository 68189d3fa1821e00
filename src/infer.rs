//! Sampling-based column type inference.
//!
//! [`infer_column_types()`] consumes raw rows (header first) and folds each
//! sampled cell through [`classify()`] into a per-column running type. Three
//! rules shape the fold:
//!
//! - a column that has been typed `string` stays `string` for the rest of the
//!   run, whether that came from a value or from a name pattern;
//! - a matching name pattern assigns its type before the value is looked at;
//! - otherwise the observation is merged with [`AtomicType::widen`].
//!
//! Columns that never saw a non-blank value default to `string`.
//!
//! [`SchemaCache`] memoizes results per source identifier for one run of the
//! tool so a source that is compared more than once is only sampled once.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    classify::classify,
    config::PatternOverrides,
    error::{DbxError, Result},
    types::AtomicType,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferredColumn {
    pub name: String,
    pub datatype: AtomicType,
}

/// Ordered column name → type mapping produced from one header row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnTypeMap {
    pub columns: Vec<InferredColumn>,
}

impl ColumnTypeMap {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<AtomicType> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .map(|column| column.datatype)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, AtomicType)> {
        self.columns
            .iter()
            .map(|column| (column.name.as_str(), column.datatype))
    }
}

/// Infers column types from `rows`, where the first row is the header.
///
/// Sampling stops once more than `sample_rows` data rows were consumed, so up
/// to `sample_rows + 1` rows influence the result.
pub fn infer_column_types<I, E>(
    rows: I,
    sample_rows: usize,
    overrides: &PatternOverrides,
) -> Result<ColumnTypeMap>
where
    I: IntoIterator<Item = std::result::Result<Vec<String>, E>>,
    E: Into<anyhow::Error>,
{
    let mut rows = rows.into_iter();
    let headers = match rows.next() {
        Some(header) => header.map_err(|err| DbxError::Read(err.into()))?,
        None => return Ok(ColumnTypeMap::default()),
    };

    let mut running: Vec<Option<AtomicType>> = vec![None; headers.len()];
    let mut sampled = 0usize;
    for row in rows {
        let row = row.map_err(|err| DbxError::Read(err.into()))?;
        for (idx, header) in headers.iter().enumerate() {
            if running[idx] == Some(AtomicType::String) {
                continue;
            }
            if let Some(pinned) = overrides.type_for(header) {
                running[idx] = Some(pinned);
                continue;
            }
            let value = row.get(idx).map(String::as_str).unwrap_or_default();
            let Some(observed) = classify(value) else {
                continue;
            };
            running[idx] = Some(AtomicType::widen(running[idx], observed));
        }
        sampled += 1;
        if sampled > sample_rows {
            break;
        }
    }
    debug!("Sampled {sampled} row(s) across {} column(s)", headers.len());

    let columns = headers
        .into_iter()
        .zip(running)
        .map(|(name, datatype)| InferredColumn {
            name,
            datatype: datatype.unwrap_or(AtomicType::String),
        })
        .collect();
    Ok(ColumnTypeMap { columns })
}

/// Per-run memo of inferred schemas keyed by source identifier.
///
/// The lock is held while a missing entry is inferred, so two callers asking
/// for the same source never sample it twice.
#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: Mutex<HashMap<String, Arc<ColumnTypeMap>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A panic while inferring leaves no entry behind, so a poisoned map is
    /// still consistent and is used as is.
    fn entries(&self) -> MutexGuard<'_, HashMap<String, Arc<ColumnTypeMap>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, source_id: &str) -> Option<Arc<ColumnTypeMap>> {
        self.entries().get(source_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the cached map for `source_id`, or opens the source with
    /// `open_rows` and infers it. `open_rows` is not called on a cache hit.
    pub fn get_or_infer<F, I, E>(
        &self,
        source_id: &str,
        sample_rows: usize,
        overrides: &PatternOverrides,
        open_rows: F,
    ) -> Result<Arc<ColumnTypeMap>>
    where
        F: FnOnce() -> anyhow::Result<I>,
        I: IntoIterator<Item = std::result::Result<Vec<String>, E>>,
        E: Into<anyhow::Error>,
    {
        let mut entries = self.entries();
        if let Some(existing) = entries.get(source_id) {
            debug!("Using cached column types for '{source_id}'");
            return Ok(Arc::clone(existing));
        }
        let rows = open_rows().map_err(DbxError::Read)?;
        let inferred = Arc::new(infer_column_types(rows, sample_rows, overrides)?);
        entries.insert(source_id.to_string(), Arc::clone(&inferred));
        Ok(inferred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnPattern;
    use anyhow::anyhow;
    use std::{
        convert::Infallible,
        panic::{AssertUnwindSafe, catch_unwind},
    };

    fn rows(data: &[&[&str]]) -> Vec<std::result::Result<Vec<String>, Infallible>> {
        data.iter()
            .map(|row| Ok(row.iter().map(|cell| cell.to_string()).collect()))
            .collect()
    }

    fn single_column(values: &[&str]) -> Vec<std::result::Result<Vec<String>, Infallible>> {
        let mut data: Vec<&[&str]> = vec![&["value"]];
        let cells: Vec<[&str; 1]> = values.iter().map(|v| [*v]).collect();
        data.extend(cells.iter().map(|cell| cell.as_slice()));
        rows(&data)
    }

    fn infer_one(values: &[&str]) -> AtomicType {
        let map = infer_column_types(single_column(values), 100, &PatternOverrides::default())
            .expect("infer");
        map.get("value").expect("column present")
    }

    #[test]
    fn integers_widen_to_decimal_in_any_order() {
        assert_eq!(infer_one(&["1", "22", "333"]), AtomicType::Integer);
        assert_eq!(infer_one(&["1", "2.5", "3"]), AtomicType::Decimal);
        assert_eq!(infer_one(&["2.5", "1", "3"]), AtomicType::Decimal);
    }

    #[test]
    fn dates_widen_to_datetime() {
        assert_eq!(
            infer_one(&["2024-01-01", "2024-01-02 10:00:00", "2024-01-03"]),
            AtomicType::DateTime
        );
    }

    #[test]
    fn first_string_observation_locks_the_column() {
        assert_eq!(infer_one(&["abc", "1", "2", "3"]), AtomicType::String);
        assert_eq!(infer_one(&["1", "abc", "2"]), AtomicType::String);
    }

    #[test]
    fn incomparable_types_let_the_last_observation_win() {
        assert_eq!(
            infer_one(&["0b6f4c2e-9d1a-4f3b-8e2d-7c5a1b9e3f40", "12"]),
            AtomicType::Integer
        );
    }

    #[test]
    fn blanks_do_not_change_running_type() {
        assert_eq!(infer_one(&["", "123", ""]), AtomicType::Integer);
        assert_eq!(infer_one(&["", "  ", ""]), AtomicType::String);
    }

    #[test]
    fn pattern_override_dominates_sampled_values() {
        let overrides = PatternOverrides::compile(&[ColumnPattern {
            pattern: "_ref$".to_string(),
            datatype: AtomicType::Uuid,
        }])
        .unwrap();
        let map = infer_column_types(
            rows(&[&["order_ref", "qty"], &["1", "1"], &["2", "2"]]),
            100,
            &overrides,
        )
        .unwrap();
        assert_eq!(map.get("order_ref"), Some(AtomicType::Uuid));
        assert_eq!(map.get("qty"), Some(AtomicType::Integer));
    }

    #[test]
    fn string_override_locks_column() {
        let overrides = PatternOverrides::compile(&[ColumnPattern {
            pattern: "^zip".to_string(),
            datatype: AtomicType::String,
        }])
        .unwrap();
        let map =
            infer_column_types(rows(&[&["zipcode"], &["02134"]]), 100, &overrides).unwrap();
        assert_eq!(map.get("zipcode"), Some(AtomicType::String));
    }

    #[test]
    fn sampling_reads_one_row_past_the_limit() {
        let data = single_column(&["1", "2", "3", "x", "y"]);
        let map = infer_column_types(data, 2, &PatternOverrides::default()).unwrap();
        assert_eq!(map.get("value"), Some(AtomicType::Integer));

        let data = single_column(&["1", "2", "x", "4", "5"]);
        let map = infer_column_types(data, 2, &PatternOverrides::default()).unwrap();
        assert_eq!(map.get("value"), Some(AtomicType::String));
    }

    #[test]
    fn short_rows_and_missing_data_default_to_string() {
        let map = infer_column_types(
            rows(&[&["id", "note"], &["1"], &["2"]]),
            100,
            &PatternOverrides::default(),
        )
        .unwrap();
        assert_eq!(map.get("id"), Some(AtomicType::Integer));
        assert_eq!(map.get("note"), Some(AtomicType::String));
        assert_eq!(map.names().collect::<Vec<_>>(), vec!["id", "note"]);
    }

    #[test]
    fn empty_input_produces_empty_map() {
        let map = infer_column_types(rows(&[]), 10, &PatternOverrides::default()).unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn read_errors_surface_as_read_variant() {
        let data: Vec<std::result::Result<Vec<String>, anyhow::Error>> = vec![
            Ok(vec!["id".to_string()]),
            Err(anyhow!("truncated record")),
        ];
        let err = infer_column_types(data, 10, &PatternOverrides::default()).unwrap_err();
        assert!(matches!(err, DbxError::Read(_)));
    }

    #[test]
    fn cache_reads_each_source_once() {
        let cache = SchemaCache::new();
        let overrides = PatternOverrides::default();
        let first = cache
            .get_or_infer("a.csv", 10, &overrides, || {
                Ok(rows(&[&["id"], &["1"]]))
            })
            .unwrap();
        let second = cache
            .get_or_infer("a.csv", 10, &overrides, || -> anyhow::Result<Vec<std::result::Result<Vec<String>, Infallible>>> {
                panic!("cached source must not be reopened")
            })
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get("a.csv").and_then(|map| map.get("id")),
            Some(AtomicType::Integer)
        );
    }

    #[test]
    fn cache_stays_usable_after_a_panicking_source() {
        let cache = SchemaCache::new();
        let overrides = PatternOverrides::default();
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            cache.get_or_infer("a.csv", 10, &overrides, || -> anyhow::Result<Vec<std::result::Result<Vec<String>, Infallible>>> {
                panic!("source vanished mid-read")
            })
        }));
        assert!(outcome.is_err());
        assert!(cache.is_empty());
        assert!(cache.get("a.csv").is_none());

        let inferred = cache
            .get_or_infer("a.csv", 10, &overrides, || Ok(rows(&[&["id"], &["7"]])))
            .unwrap();
        assert_eq!(inferred.get("id"), Some(AtomicType::Integer));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("a.csv").is_some());
    }
}
