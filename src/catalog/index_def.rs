//! Heuristic parser for PostgreSQL `pg_indexes.indexdef` strings.
//!
//! Only used when the structured `pg_index` query is unavailable. The parser
//! takes the first parenthesised group as the column list and classifies the
//! access method and uniqueness by substring match. It is fragile against
//! expression indexes (`lower(email)`), partial indexes (`WHERE ...`),
//! `INCLUDE` lists and non-default collations or operator classes; those come
//! back with mangled or extra column names rather than an error.

use std::sync::LazyLock;

use regex::Regex;

use crate::metadata::RelationalIndex;

/// Access methods recognised in `USING <method>`.
pub const KNOWN_METHODS: &[&str] = &["btree", "hash", "gist", "spgist", "gin", "brin"];

/// Reported when no known method matches.
pub const OTHER_METHOD: &str = "OTHER";

const UNIQUE_PHRASE: &str = "UNIQUE INDEX";

static COLUMN_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\(([^)]*)\)").expect("column list pattern is valid"));

static USING_METHOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\busing\s+([a-z_]+)").expect("method pattern is valid"));

/// What the heuristic could recover from one definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedIndexDefinition {
    pub columns: Vec<String>,
    /// Upper-case method name, or [`OTHER_METHOD`].
    pub method: String,
    pub unique: bool,
}

/// Parse one `CREATE [UNIQUE] INDEX ... USING method (cols)` definition.
pub fn parse_index_definition(definition: &str) -> ParsedIndexDefinition {
    let columns = COLUMN_LIST
        .captures(definition)
        .and_then(|caps| caps.get(1))
        .map(|list| {
            list.as_str()
                .trim_start_matches('(')
                .split(',')
                .map(|col| col.trim().trim_matches('"').to_string())
                .filter(|col| !col.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let method = USING_METHOD
        .captures(definition)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
        .filter(|m| KNOWN_METHODS.contains(&m.as_str()))
        .map(|m| m.to_ascii_uppercase())
        .unwrap_or_else(|| OTHER_METHOD.to_string());

    let unique = definition.to_ascii_uppercase().contains(UNIQUE_PHRASE);

    ParsedIndexDefinition {
        columns,
        method,
        unique,
    }
}

/// Expand one definition into per-column index entries.
pub fn index_entries(index_name: &str, definition: &str) -> Vec<RelationalIndex> {
    let parsed = parse_index_definition(definition);
    parsed
        .columns
        .iter()
        .enumerate()
        .map(|(i, column)| RelationalIndex {
            index_name: index_name.to_string(),
            column_name: column.clone(),
            non_unique: if parsed.unique { 0 } else { 1 },
            seq_in_index: (i + 1) as u32,
            index_type: parsed.method.clone(),
        })
        .collect()
}
