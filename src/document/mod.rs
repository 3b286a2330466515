//! Schema-less document backend.
//!
//! Collections have no catalog, so their fields are inferred from a random
//! sample of documents (see [`infer_fields`]). Index specs and estimated
//! counts come straight from the store.

mod catalog;
mod inference;

pub use catalog::DocumentCatalog;
pub use inference::{dominant_type, infer_fields, TYPE_PRIORITY};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MetadataResult;
use crate::metadata::Row;

/// A sampled document, already converted to JSON.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// An index spec as the document store reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocumentIndex {
    pub name: String,
    /// Ordered key specification, e.g. `{"customer_id": 1, "created": -1}`.
    pub keys: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub sparse: bool,
    #[serde(default)]
    pub partial_filter: Option<serde_json::Value>,
}

/// Read access to a document database.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Collection names in `database`.
    async fn list_collections(&self, database: &str) -> MetadataResult<Vec<String>>;

    /// Up to `size` randomly chosen documents.
    async fn sample_documents(&self, database: &str, collection: &str, size: usize) -> MetadataResult<Vec<Document>>;

    async fn list_indexes(&self, database: &str, collection: &str) -> MetadataResult<Vec<RawDocumentIndex>>;

    /// Estimated document count from collection metadata.
    async fn estimated_count(&self, database: &str, collection: &str) -> MetadataResult<u64>;

    /// Run a database command and return its reply.
    async fn run_command(&self, database: &str, command: Document) -> MetadataResult<Row>;

    async fn close(&self);
}
