//! Catalog loaders for relational backends.
//!
//! Both loaders read `information_schema`-style catalogs through a
//! [`SqlExecutor`], so the same code runs against a live driver or an
//! in-memory double.

pub mod index_def;
mod mysql;
mod postgres;
pub mod row;

pub use mysql::MySqlCatalog;
pub use postgres::PostgresCatalog;

use async_trait::async_trait;

use crate::error::MetadataResult;
use crate::metadata::{ColumnDescriptor, Nullability, Row};

/// Runs SQL against a relational backend.
///
/// Placeholders follow the backend's own syntax (`?` for MySQL, `$1` for
/// PostgreSQL); `binds` are bound as text in order.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn fetch_all(&self, sql: &str, binds: &[&str]) -> MetadataResult<Vec<Row>>;

    /// Close the underlying connection pool.
    async fn close(&self);
}

/// Build a column descriptor from an `information_schema.columns` row
/// selected with the lower-case aliases used by the catalog queries.
pub(crate) fn column_from_row(row: &Row) -> Option<ColumnDescriptor> {
    let name = row::text(row, "column_name")?;
    let data_type = row::text(row, "data_type").unwrap_or_else(|| "unknown".to_string());
    let nullable = row::text(row, "is_nullable")
        .map(|v| Nullability::from_catalog(&v))
        .unwrap_or(Nullability::Yes);

    let mut column = ColumnDescriptor::new(name, data_type, nullable);
    column.default_value = row::text(row, "column_default");
    column.max_length = row::uint(row, "character_maximum_length");
    column.precision = row::uint(row, "numeric_precision").map(|v| v as u32);
    column.scale = row::uint(row, "numeric_scale").map(|v| v as u32);
    column.position = row::uint(row, "ordinal_position").map(|v| v as u32);
    column.extra = row::text(row, "extra").filter(|e| !e.is_empty());
    Some(column)
}
