//! Field inference over sampled documents.
//!
//! Every document is walked recursively. Nested objects produce dotted paths
//! (`address.city`); arrays of objects produce indexed paths for their first
//! three elements (`items[0].sku`). Per path we keep a type histogram, null
//! and total counts, and up to ten distinct sample values.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;

use super::Document;
use crate::metadata::{ColumnDescriptor, DocumentFieldStats, Nullability};

/// Dominant-type tie-break order. The first present type wins.
pub const TYPE_PRIORITY: [&str; 6] = ["string", "number", "boolean", "object", "array", "null"];

const MAX_SAMPLE_VALUES: usize = 10;
const MAX_INDEXED_ELEMENTS: usize = 3;
const OBJECT_SAMPLE: &str = "[object]";

#[derive(Debug, Default)]
struct FieldStats {
    types: BTreeMap<&'static str, u64>,
    null_count: u64,
    total_count: u64,
    is_array: bool,
    is_nested: bool,
    element_types: BTreeSet<&'static str>,
    samples: Vec<Value>,
}

impl FieldStats {
    fn add_sample(&mut self, value: Value) {
        if self.samples.len() < MAX_SAMPLE_VALUES && !self.samples.contains(&value) {
            self.samples.push(value);
        }
    }

    fn into_column(self, path: String) -> ColumnDescriptor {
        let observed: Vec<String> = TYPE_PRIORITY
            .iter()
            .filter(|t| self.types.contains_key(*t))
            .map(|t| t.to_string())
            .collect();

        let data_type = dominant_type(self.types.keys().copied());
        let null_percentage = if self.total_count == 0 {
            0.0
        } else {
            let pct = self.null_count as f64 / self.total_count as f64 * 100.0;
            (pct * 100.0).round() / 100.0
        };

        let mut column = ColumnDescriptor::new(path, data_type, Nullability::from(self.null_count > 0));
        column.document = Some(DocumentFieldStats {
            is_array: self.is_array,
            is_nested: self.is_nested,
            null_percentage,
            observed_types: observed,
            occurrence_count: self.total_count,
            element_types: TYPE_PRIORITY
                .iter()
                .filter(|t| self.element_types.contains(*t))
                .map(|t| t.to_string())
                .collect(),
            sample_values: self.samples,
        });
        column
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Pick the dominant type from a set of observed type names.
pub fn dominant_type<'a>(observed: impl IntoIterator<Item = &'a str>) -> &'static str {
    let observed: BTreeSet<&str> = observed.into_iter().collect();
    TYPE_PRIORITY
        .iter()
        .copied()
        .find(|t| observed.contains(t))
        .unwrap_or("null")
}

fn walk(document: &Document, prefix: &str, fields: &mut BTreeMap<String, FieldStats>) {
    for (key, value) in document {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        record(path, value, fields);
    }
}

fn record(path: String, value: &Value, fields: &mut BTreeMap<String, FieldStats>) {
    let stats = fields.entry(path.clone()).or_default();
    stats.total_count += 1;
    *stats.types.entry(type_name(value)).or_insert(0) += 1;

    match value {
        Value::Null => stats.null_count += 1,
        Value::Array(items) => {
            stats.is_array = true;
            stats.element_types.extend(items.iter().map(type_name));
            for (i, item) in items.iter().take(MAX_INDEXED_ELEMENTS).enumerate() {
                if let Value::Object(inner) = item {
                    walk(inner, &format!("{}[{}]", path, i), fields);
                }
            }
        }
        Value::Object(inner) => {
            stats.is_nested = true;
            stats.add_sample(Value::String(OBJECT_SAMPLE.to_string()));
            walk(inner, &path, fields);
        }
        scalar => stats.add_sample(scalar.clone()),
    }
}

/// Infer one column per field path, sorted by path.
///
/// An empty sample yields no fields.
pub fn infer_fields(documents: &[Document]) -> Vec<ColumnDescriptor> {
    let mut fields = BTreeMap::new();
    for document in documents {
        walk(document, "", &mut fields);
    }

    fields
        .into_iter()
        .map(|(path, stats)| stats.into_column(path))
        .collect()
}
