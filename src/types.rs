//! Logical column types shared by inference, import, and diff synthesis.
//!
//! [`AtomicType`] is the closed set of types the classifier can produce (plus
//! `Boolean`, which only appears when read back from a database catalogue).
//! Besides parsing and display it owns the two mappings the rest of the crate
//! relies on: widening between successive observations, and the translation
//! to and from PostgreSQL storage types.

use std::{fmt, str::FromStr};

use anyhow::anyhow;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomicType {
    String,
    Integer,
    Decimal,
    Uuid,
    Date,
    DateTime,
    Boolean,
}

impl AtomicType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AtomicType::String => "string",
            AtomicType::Integer => "integer",
            AtomicType::Decimal => "decimal",
            AtomicType::Uuid => "uuid",
            AtomicType::Date => "date",
            AtomicType::DateTime => "datetime",
            AtomicType::Boolean => "boolean",
        }
    }

    pub fn variants() -> &'static [&'static str] {
        &[
            "string", "integer", "decimal", "uuid", "date", "datetime", "boolean",
        ]
    }

    /// Merges a newly classified value into a column's running type.
    ///
    /// `Decimal` absorbs `Integer` and `DateTime` absorbs `Date`; for every
    /// other combination the incoming observation replaces the current one.
    pub fn widen(current: Option<AtomicType>, incoming: AtomicType) -> AtomicType {
        match (current, incoming) {
            (Some(AtomicType::Decimal), AtomicType::Integer) => AtomicType::Decimal,
            (Some(AtomicType::DateTime), AtomicType::Date) => AtomicType::DateTime,
            _ => incoming,
        }
    }

    /// PostgreSQL storage type used when creating an import table.
    pub fn physical_type(&self) -> &'static str {
        match self {
            AtomicType::String => "text",
            AtomicType::Integer => "bigint",
            AtomicType::Decimal => "numeric",
            AtomicType::Uuid => "uuid",
            AtomicType::Date => "date",
            AtomicType::DateTime => "timestamp",
            AtomicType::Boolean => "boolean",
        }
    }

    /// Best logical reading of a catalogue storage type. Unknown kinds
    /// (text, json, interval, ...) compare as strings.
    pub fn from_physical(physical: &str) -> AtomicType {
        let normalized = physical.trim().to_ascii_lowercase();
        let base = normalized
            .split(['(', '['])
            .next()
            .unwrap_or_default()
            .trim();
        match base {
            "smallint" | "integer" | "int" | "int2" | "int4" | "int8" | "bigint" | "serial"
            | "bigserial" => AtomicType::Integer,
            "numeric" | "decimal" | "real" | "double precision" | "float4" | "float8" => {
                AtomicType::Decimal
            }
            "uuid" => AtomicType::Uuid,
            "date" => AtomicType::Date,
            "boolean" | "bool" => AtomicType::Boolean,
            other if other.starts_with("timestamp") => AtomicType::DateTime,
            _ => AtomicType::String,
        }
    }
}

impl fmt::Display for AtomicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AtomicType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().trim_start_matches(':').to_ascii_lowercase();
        match normalized.as_str() {
            "string" | "text" => Ok(AtomicType::String),
            "integer" | "int" => Ok(AtomicType::Integer),
            "decimal" | "numeric" => Ok(AtomicType::Decimal),
            "uuid" | "guid" => Ok(AtomicType::Uuid),
            "date" => Ok(AtomicType::Date),
            "datetime" | "timestamp" => Ok(AtomicType::DateTime),
            "boolean" | "bool" => Ok(AtomicType::Boolean),
            _ => Err(anyhow!(
                "Unknown column type '{value}'. Supported types: {}",
                AtomicType::variants().join(", ")
            )),
        }
    }
}

impl Serialize for AtomicType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AtomicType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        AtomicType::from_str(&token).map_err(|err| de::Error::custom(err.to_string()))
    }
}
