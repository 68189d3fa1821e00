//! `dbx.yml` configuration.
//!
//! ```yaml
//! sample_rows: 250
//! db: postgres://localhost/compare
//! column_patterns:
//!   - pattern: "_id$"
//!     type: uuid
//!   - pattern: "^zip"
//!     type: string
//! ```
//!
//! Every key is optional. A missing default file yields the defaults; an
//! explicitly requested file must exist.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use log::debug;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    error::{DbxError, Result},
    types::AtomicType,
};

pub const DEFAULT_CONFIG_PATH: &str = "dbx.yml";
pub const DEFAULT_SAMPLE_ROWS: usize = 100;
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ColumnPattern {
    pub pattern: String,
    #[serde(rename = "type")]
    pub datatype: AtomicType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub sample_rows: usize,
    pub column_patterns: Vec<ColumnPattern>,
    pub db: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rows: DEFAULT_SAMPLE_ROWS,
            column_patterns: Vec::new(),
            db: None,
        }
    }
}

impl Config {
    /// Loads `path`, or `dbx.yml` from the working directory when `path` is
    /// `None` (falling back to defaults if that file does not exist).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };
        if !path.is_file() {
            if required {
                return Err(DbxError::configuration(format!(
                    "config file {path:?} does not exist"
                )));
            }
            debug!("No {DEFAULT_CONFIG_PATH} found; using default configuration");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path).map_err(|err| {
            DbxError::configuration(format!("reading config file {path:?}: {err}"))
        })?;
        Self::from_yaml(&raw)
            .map_err(|err| DbxError::configuration(format!("{path:?}: {err}")))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
            .map_err(|err| DbxError::configuration(format!("invalid configuration: {err}")))
    }

    pub fn pattern_overrides(&self) -> Result<PatternOverrides> {
        PatternOverrides::compile(&self.column_patterns)
    }

    /// Connection target: explicit value, then `DATABASE_URL`, then `db`.
    pub fn database_url(&self, explicit: Option<&str>) -> Result<String> {
        explicit
            .map(str::to_string)
            .or_else(|| env::var(DATABASE_URL_ENV).ok().filter(|v| !v.trim().is_empty()))
            .or_else(|| self.db.clone())
            .ok_or_else(|| {
                DbxError::configuration(format!(
                    "`db` not set on the command line, in {DATABASE_URL_ENV}, or in {DEFAULT_CONFIG_PATH}"
                ))
            })
    }
}

/// Ordered name-pattern overrides; the first matching pattern decides.
#[derive(Debug, Clone, Default)]
pub struct PatternOverrides {
    patterns: Vec<(Regex, AtomicType)>,
}

impl PatternOverrides {
    pub fn compile(patterns: &[ColumnPattern]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|entry| {
                Regex::new(&entry.pattern)
                    .map(|regex| (regex, entry.datatype))
                    .map_err(|err| {
                        DbxError::configuration(format!(
                            "invalid column pattern '{}': {err}",
                            entry.pattern
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn type_for(&self, column: &str) -> Option<AtomicType> {
        self.patterns
            .iter()
            .find(|(regex, _)| regex.is_match(column))
            .map(|(_, datatype)| *datatype)
    }
}
