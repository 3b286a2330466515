use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::pool::WarehousePool;
use crate::catalog::{column_from_row, row};
use crate::config::{BackendKind, ConnectionConfig};
use crate::error::MetadataResult;
use crate::metadata::{
    BackendConnector, IndexMap, LoadOptions, MetadataBackend, Row, SchemaMap, TableSizeCache,
};

pub(super) const INFORMATION_SCHEMA: &str = "information_schema";

/// Quote an identifier with backticks.
pub(super) fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a string literal with single quotes.
pub(super) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Warehouse metadata, read through the pool.
///
/// The configured `database` is the catalog; every key is
/// `catalog.schema.table`.
pub struct WarehouseCatalog {
    pool: Arc<WarehousePool>,
    config: ConnectionConfig,
}

impl WarehouseCatalog {
    pub fn new(pool: Arc<WarehousePool>, config: ConnectionConfig) -> Self {
        Self { pool, config }
    }

    pub(super) async fn run(&self, sql: &str) -> MetadataResult<Vec<Row>> {
        self.pool.execute_query(sql, &self.config).await
    }

    fn columns_sql(catalog: &str) -> String {
        format!(
            "SELECT table_schema, table_name, column_name, data_type, is_nullable, column_default, \
                    character_maximum_length, numeric_precision, numeric_scale, ordinal_position \
             FROM {}.information_schema.columns \
             WHERE table_schema <> 'information_schema' \
             ORDER BY table_schema, table_name, ordinal_position",
            quote_ident(catalog)
        )
    }
}

#[async_trait]
impl MetadataBackend for WarehouseCatalog {
    fn kind(&self) -> BackendKind {
        BackendKind::Databricks
    }

    async fn load_schema(&self, database: &str, options: &LoadOptions) -> MetadataResult<SchemaMap> {
        let rows = self.run(&Self::columns_sql(database)).await?;
        debug!(catalog = database, rows = rows.len(), "fetched warehouse columns");

        let mut schema_map = SchemaMap::new();
        for row in &rows {
            let (Some(schema), Some(table)) = (row::text(row, "table_schema"), row::text(row, "table_name")) else {
                continue;
            };
            if schema == INFORMATION_SCHEMA || !options.includes_schema(&schema) {
                continue;
            }
            let Some(column) = column_from_row(row) else {
                continue;
            };
            let columns = schema_map
                .entry(BackendKind::Databricks.qualify(database, &schema, &table))
                .or_default();
            if !columns.iter().any(|c| c.name == column.name) {
                columns.push(column);
            }
        }

        Ok(schema_map)
    }

    /// The warehouse has no index catalog.
    async fn load_indexes(&self, _database: &str) -> MetadataResult<IndexMap> {
        Ok(IndexMap::new())
    }

    async fn load_sizes(&self, database: &str, options: &LoadOptions) -> MetadataResult<TableSizeCache> {
        self.collect_table_sizes(database, options).await
    }

    async fn execute_query(&self, sql: &str) -> MetadataResult<Vec<Row>> {
        self.run(sql).await
    }

    /// Pooled connections outlive the backend; the pool sweeps them.
    async fn close(&self) {}
}

/// Opens [`WarehouseCatalog`]s on a shared pool.
pub struct WarehouseConnector {
    pool: Arc<WarehousePool>,
}

impl WarehouseConnector {
    pub fn new(pool: Arc<WarehousePool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BackendConnector for WarehouseConnector {
    async fn connect(&self, config: &ConnectionConfig) -> MetadataResult<Arc<dyn MetadataBackend>> {
        self.pool.get_connection(config).await?;
        Ok(Arc::new(WarehouseCatalog::new(self.pool.clone(), config.clone())))
    }
}
