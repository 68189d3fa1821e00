use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbxError>;

#[derive(Debug, Error)]
pub enum DbxError {
    /// Missing or invalid configuration; fix the configuration and rerun.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The target table already exists and `force` was not requested.
    #[error("table '{table}' already exists; rerun with force to replace it")]
    SchemaConflict { table: String },
    #[error("diff of '{table_a}' and '{table_b}' requires at least one join key")]
    MissingJoinKeys { table_a: String, table_b: String },
    #[error("table '{0}' was not found in the catalogue")]
    UnknownTable(String),
    #[error("column '{column}' was not found in table '{table}'")]
    UnknownColumn { table: String, column: String },
    #[error("table '{0}' has no *_diff columns to aggregate")]
    NoDiffColumns(String),
    #[error("failed to read sampled rows")]
    Read(#[source] anyhow::Error),
    /// Failure reported by the connection; passed through untouched.
    #[error(transparent)]
    Execution(anyhow::Error),
}

impl DbxError {
    pub fn configuration(message: impl Into<String>) -> Self {
        DbxError::Configuration(message.into())
    }

    pub fn is_schema_conflict(&self) -> bool {
        matches!(self, DbxError::SchemaConflict { .. })
    }
}
