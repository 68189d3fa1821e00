mod common;

use std::convert::Infallible;

use dbx::{
    catalog::{Catalog, CatalogColumn, Connection, catalogue_from_types},
    config::{ColumnPattern, PatternOverrides},
    diff::{DiffSpec, run_diff, synthesize},
    diff_expr::DiffVariant,
    error::DbxError,
    infer::{SchemaCache, infer_column_types},
    io_utils,
    script::ScriptConnection,
    stats::run_stats,
    types::AtomicType,
};
use encoding_rs::UTF_8;

use common::{ACCOUNTS_A, TestWorkspace};

fn rows(data: &[&[&str]]) -> Vec<Result<Vec<String>, Infallible>> {
    data.iter()
        .map(|row| Ok(row.iter().map(|cell| cell.to_string()).collect()))
        .collect()
}

fn accounts_connection() -> ScriptConnection {
    let columns = vec![
        CatalogColumn::new("id", AtomicType::Integer, "bigint"),
        CatalogColumn::new("amount", AtomicType::Decimal, "numeric"),
        CatalogColumn::new("signup_date", AtomicType::Date, "date"),
    ];
    let mut connection = ScriptConnection::new();
    connection.register_table("A", columns.clone());
    connection.register_table("B", columns);
    connection
}

#[test]
fn inferred_csv_drives_diff_plan() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("accounts.csv", ACCOUNTS_A);
    let rows = io_utils::read_rows(&path, b',', UTF_8).expect("open rows");
    let types = infer_column_types(rows, 100, &PatternOverrides::default()).expect("infer");
    assert_eq!(types.get("id"), Some(AtomicType::Integer));
    assert_eq!(types.get("amount"), Some(AtomicType::Decimal));
    assert_eq!(types.get("signup_date"), Some(AtomicType::Date));
    assert_eq!(types.get("email"), Some(AtomicType::String));

    let mut connection = ScriptConnection::new();
    connection.register_table("accounts_a", catalogue_from_types(&types));
    let spec = DiffSpec::new("accounts_a", "accounts_b", ["id"], ["email"]);
    let statements = synthesize(&spec, &connection).expect("synthesize");
    let variants: Vec<_> = statements.plan.iter().map(|plan| plan.variant).collect();
    assert_eq!(variants, vec![DiffVariant::NumericDiff, DiffVariant::DateDiff]);
}

#[test]
fn end_to_end_diff_table_layout_and_stats() {
    let mut connection = accounts_connection();
    let spec = DiffSpec::new("A", "B", ["id"], Vec::<String>::new());
    let statements = run_diff(&spec, &mut connection).expect("diff");
    assert_eq!(statements.diff_table, "diff_A_B");
    let names: Vec<_> = statements
        .output_columns
        .iter()
        .map(|column| column.name.as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            "id",
            "amount_a",
            "amount_b",
            "amount_diff",
            "signup_date_a",
            "signup_date_b",
            "signup_date_diff",
        ]
    );
    assert!(statements.create.starts_with("CREATE TABLE \"diff_A_B\" AS"));
    assert!(statements.create.contains("FROM \"A\" AS a\nFULL OUTER JOIN \"B\" AS b USING (id)"));

    connection.register_table(&statements.diff_table, statements.output_columns.clone());
    let stats = run_stats(&statements.diff_table, false, &mut connection).expect("stats");
    assert_eq!(stats.stats_table, "diff_A_B_stats");
    assert!(stats.create.contains("SUM(amount_diff) AS amount_sum"));
    assert!(stats.create.contains("SUM(signup_date_diff) AS signup_date_sum"));
    assert!(stats.create.ends_with("FROM \"diff_A_B\""));
}

#[test]
fn rerunning_without_force_conflicts() {
    let mut connection = accounts_connection();
    let spec = DiffSpec::new("A", "B", ["id"], Vec::<String>::new());
    run_diff(&spec, &mut connection).expect("first diff");
    assert!(connection.table_exists("diff_A_B").unwrap());

    let err = run_diff(&spec, &mut connection).unwrap_err();
    assert!(matches!(err, DbxError::SchemaConflict { ref table } if table == "diff_A_B"));

    run_diff(&spec.clone().with_force(true), &mut connection).expect("forced diff");
}

struct FailingQueries(ScriptConnection);

impl Catalog for FailingQueries {
    fn columns(&self, table: &str) -> anyhow::Result<Vec<CatalogColumn>> {
        self.0.columns(table)
    }
}

impl Connection for FailingQueries {
    fn execute(&mut self, sql: &str) -> anyhow::Result<()> {
        self.0.execute(sql)
    }

    fn query(&mut self, _sql: &str) -> anyhow::Result<Vec<dbx::catalog::Row>> {
        Err(anyhow::anyhow!("connection reset"))
    }
}

#[test]
fn execution_failures_propagate_and_leave_created_table() {
    let mut connection = FailingQueries(accounts_connection());
    let spec = DiffSpec::new("A", "B", ["id"], Vec::<String>::new());
    let err = run_diff(&spec, &mut connection).unwrap_err();
    assert!(matches!(err, DbxError::Execution(_)));
    assert_eq!(err.to_string(), "connection reset");
    assert!(connection.0.table_exists("diff_A_B").unwrap());
}

#[test]
fn schema_cache_scopes_overrides_to_first_inference() {
    let cache = SchemaCache::new();
    let overrides = PatternOverrides::compile(&[ColumnPattern {
        pattern: "^id$".to_string(),
        datatype: AtomicType::Uuid,
    }])
    .unwrap();
    let first = cache
        .get_or_infer("accounts", 10, &overrides, || {
            Ok(rows(&[&["id", "qty"], &["1", "2"]]))
        })
        .unwrap();
    assert_eq!(first.get("id"), Some(AtomicType::Uuid));

    let second = cache
        .get_or_infer("accounts", 10, &PatternOverrides::default(), || {
            Ok(rows(&[&["id", "qty"], &["x", "y"]]))
        })
        .unwrap();
    assert_eq!(second.get("id"), Some(AtomicType::Uuid));
    assert_eq!(second.get("qty"), Some(AtomicType::Integer));
}
