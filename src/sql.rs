use std::borrow::Cow;

/// Reserved words that cannot be used as bare column or table names.
const RESERVED: &[&str] = &[
    "all", "and", "as", "asc", "case", "check", "column", "create", "default", "desc",
    "distinct", "else", "end", "false", "from", "full", "group", "having", "in", "join", "limit",
    "not", "null", "on", "or", "order", "select", "table", "then", "to", "true", "union", "user",
    "using", "when", "where", "with",
];

/// Quotes `name` unless it is already a plain lower-case SQL identifier.
pub fn ident(name: &str) -> Cow<'_, str> {
    let mut chars = name.chars();
    let plain = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !RESERVED.contains(&name);
    if plain {
        Cow::Borrowed(name)
    } else {
        Cow::Owned(format!("\"{}\"", name.replace('"', "\"\"")))
    }
}

/// `alias.column` with the column quoted as needed.
pub fn qualified(alias: &str, column: &str) -> String {
    format!("{alias}.{}", ident(column))
}

/// Identifier built from `name` plus a fixed suffix, e.g. `amount_diff`.
pub fn suffixed(name: &str, suffix: &str) -> String {
    ident(&format!("{name}_{suffix}")).into_owned()
}

pub fn drop_table_if_exists(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {}", ident(table))
}

pub fn create_table_as(table: &str, select: &str) -> String {
    format!("CREATE TABLE {} AS\n{select}", ident(table))
}

pub fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
