//! Dry-run connection that records statements into a psql script.
//!
//! Tables become visible to the catalogue either by registration (imports and
//! planned diff tables, whose columns are known up front) or by a recorded
//! `CREATE TABLE`, in which case only their existence is known.

use std::{
    collections::{HashMap, HashSet},
    io::Write,
};

use anyhow::{Context, Result};

use crate::catalog::{Catalog, CatalogColumn, Connection, Row};

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScriptEntry {
    Sql(String),
    Meta(String),
    Comment(String),
}

#[derive(Debug, Default)]
pub struct ScriptConnection {
    tables: HashMap<String, Vec<CatalogColumn>>,
    created: HashSet<String>,
    entries: Vec<ScriptEntry>,
}

impl ScriptConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_table(&mut self, name: impl Into<String>, columns: Vec<CatalogColumn>) {
        let name = name.into();
        self.created.insert(name.clone());
        self.tables.insert(name, columns);
    }

    /// psql meta-command such as `\copy` or `\connect`.
    pub fn meta(&mut self, command: impl Into<String>) {
        self.entries.push(ScriptEntry::Meta(command.into()));
    }

    pub fn comment(&mut self, text: impl Into<String>) {
        self.entries.push(ScriptEntry::Comment(text.into()));
    }

    /// SQL statements recorded so far, without meta-commands or comments.
    pub fn statements(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter_map(|entry| match entry {
                ScriptEntry::Sql(sql) => Some(sql.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn render(&self) -> String {
        let mut script = String::new();
        for entry in &self.entries {
            match entry {
                ScriptEntry::Sql(sql) => {
                    script.push_str(sql);
                    script.push_str(";\n\n");
                }
                ScriptEntry::Meta(command) => {
                    script.push_str(command);
                    script.push('\n');
                }
                ScriptEntry::Comment(text) => {
                    for line in text.lines() {
                        script.push_str("-- ");
                        script.push_str(line);
                        script.push('\n');
                    }
                }
            }
        }
        script
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer
            .write_all(self.render().as_bytes())
            .context("Writing SQL script")?;
        writer.flush().context("Flushing SQL script")
    }

    fn track_ddl(&mut self, sql: &str) {
        let trimmed = sql.trim_start();
        if let Some(rest) = strip_keyword(trimmed, "DROP TABLE IF EXISTS") {
            if let Some(name) = leading_identifier(rest) {
                self.created.remove(&name);
                self.tables.remove(&name);
            }
        } else if let Some(rest) = strip_keyword(trimmed, "CREATE TABLE")
            && let Some(name) = leading_identifier(rest)
        {
            self.created.insert(name);
        }
    }
}

impl Catalog for ScriptConnection {
    fn columns(&self, table: &str) -> Result<Vec<CatalogColumn>> {
        Ok(self.tables.get(table).cloned().unwrap_or_default())
    }

    fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.created.contains(table))
    }
}

impl Connection for ScriptConnection {
    fn execute(&mut self, sql: &str) -> Result<()> {
        self.track_ddl(sql);
        self.entries.push(ScriptEntry::Sql(sql.to_string()));
        Ok(())
    }

    /// Queries are recorded; no rows come back from a dry run.
    fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        self.entries.push(ScriptEntry::Sql(sql.to_string()));
        Ok(Vec::new())
    }
}

fn strip_keyword<'a>(sql: &'a str, keyword: &str) -> Option<&'a str> {
    let head = sql.get(..keyword.len())?;
    head.eq_ignore_ascii_case(keyword)
        .then(|| sql[keyword.len()..].trim_start())
}

/// First identifier of `sql`, unquoting `"..."` names.
fn leading_identifier(sql: &str) -> Option<String> {
    if let Some(quoted) = sql.strip_prefix('"') {
        let mut name = String::new();
        let mut chars = quoted.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    name.push('"');
                } else {
                    return Some(name);
                }
            } else {
                name.push(c);
            }
        }
        return None;
    }
    let name: String = sql
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '.')
        .collect();
    (!name.is_empty()).then_some(name)
}
