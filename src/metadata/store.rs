//! Snapshot-swapping metadata store.
//!
//! The store owns one `Arc<MetadataSnapshot>`. Loaders build a complete
//! replacement map and swap it in under the write lock, so a reader sees
//! either the previous map or the new one, never a half-populated map.
//! Readers that already hold a snapshot keep it unchanged; the next write
//! clones the snapshot instead of mutating theirs.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use super::types::{IndexMap, SchemaMap, TableSizeCache};

/// The three normalised maps for one configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataSnapshot {
    pub schema_map: SchemaMap,
    pub index_map: IndexMap,
    pub table_size_cache: TableSizeCache,
}

/// Caller-owned metadata cache.
#[derive(Debug, Default)]
pub struct MetadataStore {
    current: RwLock<Arc<MetadataSnapshot>>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot.
    pub async fn snapshot(&self) -> Arc<MetadataSnapshot> {
        self.current.read().await.clone()
    }

    /// Replace the schema map wholesale.
    pub async fn replace_schema_map(&self, schema_map: SchemaMap) {
        let mut current = self.current.write().await;
        Arc::make_mut(&mut current).schema_map = schema_map;
    }

    /// Replace the index map wholesale.
    pub async fn replace_index_map(&self, index_map: IndexMap) {
        let mut current = self.current.write().await;
        Arc::make_mut(&mut current).index_map = index_map;
    }

    /// Replace the table size cache wholesale.
    pub async fn replace_table_sizes(&self, table_size_cache: TableSizeCache) {
        let mut current = self.current.write().await;
        Arc::make_mut(&mut current).table_size_cache = table_size_cache;
    }

    /// Swap in a complete snapshot.
    pub async fn replace_all(&self, snapshot: MetadataSnapshot) {
        *self.current.write().await = Arc::new(snapshot);
    }

    /// Drop all cached metadata.
    pub async fn reset(&self) {
        self.replace_all(MetadataSnapshot::default()).await;
    }
}
