//! The capability contract every backend implements.

use async_trait::async_trait;

use super::types::{IndexMap, LoadOptions, Row, SchemaMap, TableSizeCache};
use crate::config::BackendKind;
use crate::error::MetadataResult;

/// Metadata and query access to one connected backend.
///
/// Each method returns a complete map; storing it is the caller's job. A
/// loader that fails for a single schema or collection logs the failure and
/// leaves that entity out instead of failing the whole call.
///
/// # Example
///
/// ```ignore
/// use schemascope::metadata::{LoadOptions, MetadataBackend};
///
/// async fn example(backend: &dyn MetadataBackend) -> MetadataResult<()> {
///     let options = LoadOptions::default();
///     let schema = backend.load_schema("shop", &options).await?;
///     let sizes = backend.load_sizes("shop", &options).await?;
///     backend.close().await;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait MetadataBackend: Send + Sync {
    /// Which backend this is.
    fn kind(&self) -> BackendKind;

    /// Load columns for every table or collection in `database`.
    async fn load_schema(&self, database: &str, options: &LoadOptions) -> MetadataResult<SchemaMap>;

    /// Load indexes for every table or collection in `database`.
    async fn load_indexes(&self, database: &str) -> MetadataResult<IndexMap>;

    /// Estimate row or document counts for `database`.
    async fn load_sizes(&self, database: &str, options: &LoadOptions) -> MetadataResult<TableSizeCache>;

    /// Run a statement and return every row.
    async fn execute_query(&self, sql: &str) -> MetadataResult<Vec<Row>>;

    /// Release the connection this backend was opened with.
    async fn close(&self);
}
