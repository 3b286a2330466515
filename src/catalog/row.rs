//! Typed accessors over loosely typed result rows.
//!
//! Catalog queries come back as text from some drivers and as JSON numbers
//! or booleans from others, so every accessor accepts both.

use serde_json::Value;

use crate::metadata::Row;

fn get<'a>(row: &'a Row, column: &str) -> Option<&'a Value> {
    row.get(column).or_else(|| {
        row.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    })
}

/// Column value as text. `NULL` and missing columns are `None`.
pub fn text(row: &Row, column: &str) -> Option<String> {
    match get(row, column)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// First present column among `columns`, as text.
pub fn text_any(row: &Row, columns: &[&str]) -> Option<String> {
    columns.iter().find_map(|column| text(row, column))
}

/// Column value as a non-negative integer.
///
/// Negative estimates (PostgreSQL reports -1 for never-analysed tables) and
/// fractional values are clamped or truncated.
pub fn uint(row: &Row, column: &str) -> Option<u64> {
    match get(row, column)? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_i64().map(|v| v.max(0) as u64))
            .or_else(|| n.as_f64().map(|v| v.max(0.0) as u64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| s.parse::<i64>().ok().map(|v| v.max(0) as u64))
                .or_else(|| s.parse::<f64>().ok().map(|v| v.max(0.0) as u64))
        }
        Value::Bool(b) => Some(u64::from(*b)),
        _ => None,
    }
}

/// First present column among `columns`, as an integer.
pub fn uint_any(row: &Row, columns: &[&str]) -> Option<u64> {
    columns.iter().find_map(|column| uint(row, column))
}
