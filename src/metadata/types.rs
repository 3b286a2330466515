//! Normalised metadata shared by every backend.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One result row, keyed by column name.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Qualified entity name → columns in ordinal order.
pub type SchemaMap = BTreeMap<String, Vec<ColumnDescriptor>>;

/// Qualified entity name → indexes ordered by sequence within each index.
pub type IndexMap = BTreeMap<String, Vec<IndexDescriptor>>;

/// Qualified entity name → estimated row or document count.
pub type TableSizeCache = BTreeMap<String, u64>;

/// Catalog-style nullability flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Nullability {
    #[serde(rename = "YES")]
    Yes,
    #[serde(rename = "NO")]
    No,
}

impl Nullability {
    /// Parse an `IS_NULLABLE` catalog value. Anything but `YES` is `NO`.
    pub fn from_catalog(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("yes") || value.trim().eq_ignore_ascii_case("true") {
            Nullability::Yes
        } else {
            Nullability::No
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, Nullability::Yes)
    }
}

impl From<bool> for Nullability {
    fn from(nullable: bool) -> Self {
        if nullable {
            Nullability::Yes
        } else {
            Nullability::No
        }
    }
}

/// A column of a table, or an inferred field of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    /// Column name, or dotted field path for documents. Unique per entity.
    pub name: String,
    /// Backend type name, or the dominant type for documents.
    pub data_type: String,
    pub nullable: Nullability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
    /// 1-based ordinal position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    /// Backend-specific extra information (e.g. `auto_increment`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
    /// Statistics for fields inferred from sampled documents.
    #[serde(flatten)]
    pub document: Option<DocumentFieldStats>,
}

impl ColumnDescriptor {
    /// Create a descriptor with only the required fields set.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: Nullability) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable,
            default_value: None,
            max_length: None,
            precision: None,
            scale: None,
            position: None,
            extra: None,
            document: None,
        }
    }
}

/// Inference statistics attached to document fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentFieldStats {
    pub is_array: bool,
    pub is_nested: bool,
    /// Share of occurrences that were null, 0-100, two decimals.
    pub null_percentage: f64,
    /// Every type seen for the field, in priority order.
    pub observed_types: Vec<String>,
    /// Number of sampled documents in which the field appeared.
    pub occurrence_count: u64,
    /// Types of array elements, when the field held arrays.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub element_types: Vec<String>,
    /// Up to ten distinct scalar values.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample_values: Vec<serde_json::Value>,
}

/// One column of a relational index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationalIndex {
    pub index_name: String,
    pub column_name: String,
    /// 0 for unique indexes, 1 otherwise.
    pub non_unique: u8,
    /// 1-based position of the column within the index.
    pub seq_in_index: u32,
    /// Access method, e.g. `BTREE`.
    pub index_type: String,
}

/// One index of a document collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentIndex {
    pub index_name: String,
    /// Key specification, e.g. `{"email": 1}`.
    pub keys: serde_json::Map<String, serde_json::Value>,
    pub unique: bool,
    pub sparse: bool,
    /// More than one key field.
    pub compound: bool,
    pub fields: Vec<String>,
    pub text_index: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_filter: Option<serde_json::Value>,
}

/// An index entry, shaped by the backend family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexDescriptor {
    Relational(RelationalIndex),
    Document(DocumentIndex),
}

impl IndexDescriptor {
    pub fn index_name(&self) -> &str {
        match self {
            IndexDescriptor::Relational(index) => &index.index_name,
            IndexDescriptor::Document(index) => &index.index_name,
        }
    }
}

/// Knobs shared by the loaders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Documents sampled per collection.
    pub sample_size: usize,
    /// Tables described concurrently by the warehouse size collector.
    pub size_batch_size: usize,
    /// Only load these schemas (multi-schema and warehouse backends).
    pub schemas: Option<Vec<String>>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            sample_size: 100,
            size_batch_size: 10,
            schemas: None,
        }
    }
}

impl LoadOptions {
    /// Whether a schema passes the configured filter.
    pub fn includes_schema(&self, schema: &str) -> bool {
        self.schemas
            .as_ref()
            .map_or(true, |allowed| allowed.iter().any(|s| s == schema))
    }
}

impl From<&crate::config::MetadataSettings> for LoadOptions {
    fn from(settings: &crate::config::MetadataSettings) -> Self {
        Self {
            sample_size: settings.sample_size,
            size_batch_size: settings.size_batch_size.max(1),
            schemas: settings.schemas.clone(),
        }
    }
}
