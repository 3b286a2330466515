//! Loader entry points.
//!
//! Each `load_*` call asks the backend for a complete map and swaps it into
//! the [`MetadataStore`]. [`init_metadata`] opens a backend, runs the loaders
//! in backend order, closes what it opened, and returns the new snapshot.

use std::sync::Arc;

use tracing::{info, warn};

use super::provider::MetadataBackend;
use super::registry::BackendRegistry;
use super::store::{MetadataSnapshot, MetadataStore};
use super::types::LoadOptions;
use crate::config::ConnectionConfig;
use crate::error::MetadataResult;

/// Load columns into the store's schema map.
pub async fn load_schema_map(
    store: &MetadataStore,
    backend: &dyn MetadataBackend,
    database: &str,
    options: &LoadOptions,
) -> MetadataResult<()> {
    let schema_map = backend.load_schema(database, options).await?;
    info!(
        backend = %backend.kind(),
        database,
        entities = schema_map.len(),
        "loaded schema map"
    );
    store.replace_schema_map(schema_map).await;
    Ok(())
}

/// Load indexes into the store's index map.
pub async fn load_indexes(
    store: &MetadataStore,
    backend: &dyn MetadataBackend,
    database: &str,
) -> MetadataResult<()> {
    let index_map = backend.load_indexes(database).await?;
    info!(
        backend = %backend.kind(),
        database,
        entities = index_map.len(),
        "loaded index map"
    );
    store.replace_index_map(index_map).await;
    Ok(())
}

/// Load row/document counts into the store's size cache.
pub async fn load_table_sizes(
    store: &MetadataStore,
    backend: &dyn MetadataBackend,
    database: &str,
    options: &LoadOptions,
) -> MetadataResult<()> {
    let sizes = backend.load_sizes(database, options).await?;
    info!(
        backend = %backend.kind(),
        database,
        entities = sizes.len(),
        "loaded table sizes"
    );
    store.replace_table_sizes(sizes).await;
    Ok(())
}

/// Reload every map for `config` and return the fresh snapshot.
///
/// Relational backends load schema, then indexes, then sizes. Document and
/// warehouse backends load schema, then sizes, and their index map is reset
/// to empty. The backend opened here is closed before returning, whether or
/// not loading succeeded.
pub async fn init_metadata(
    registry: &BackendRegistry,
    store: &MetadataStore,
    config: &ConnectionConfig,
    options: &LoadOptions,
) -> MetadataResult<Arc<MetadataSnapshot>> {
    let backend = registry.connect(config).await?;

    let result = load_all(store, backend.as_ref(), config, options).await;
    backend.close().await;

    if let Err(err) = &result {
        warn!(backend = %config.backend, error = %err, "metadata reload failed");
    }
    result?;

    Ok(store.snapshot().await)
}

async fn load_all(
    store: &MetadataStore,
    backend: &dyn MetadataBackend,
    config: &ConnectionConfig,
    options: &LoadOptions,
) -> MetadataResult<()> {
    let database = config.database.as_str();

    load_schema_map(store, backend, database, options).await?;
    if config.backend.is_relational() {
        load_indexes(store, backend, database).await?;
    } else {
        store.replace_index_map(Default::default()).await;
    }
    load_table_sizes(store, backend, database, options).await
}
