//! MySQL catalog loader (single catalog, bare table names).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{column_from_row, row, SqlExecutor};
use crate::config::BackendKind;
use crate::error::MetadataResult;
use crate::metadata::{
    IndexDescriptor, IndexMap, LoadOptions, MetadataBackend, RelationalIndex, Row, SchemaMap,
    TableSizeCache,
};

const COLUMNS_SQL: &str = "\
SELECT CAST(TABLE_NAME AS CHAR) AS table_name, \
       CAST(COLUMN_NAME AS CHAR) AS column_name, \
       CAST(DATA_TYPE AS CHAR) AS data_type, \
       CAST(IS_NULLABLE AS CHAR) AS is_nullable, \
       CAST(COLUMN_DEFAULT AS CHAR) AS column_default, \
       CAST(CHARACTER_MAXIMUM_LENGTH AS CHAR) AS character_maximum_length, \
       CAST(NUMERIC_PRECISION AS CHAR) AS numeric_precision, \
       CAST(NUMERIC_SCALE AS CHAR) AS numeric_scale, \
       CAST(ORDINAL_POSITION AS CHAR) AS ordinal_position, \
       CAST(EXTRA AS CHAR) AS extra \
FROM information_schema.COLUMNS \
WHERE TABLE_SCHEMA = ? \
ORDER BY TABLE_NAME, ORDINAL_POSITION";

const INDEXES_SQL: &str = "\
SELECT CAST(TABLE_NAME AS CHAR) AS table_name, \
       CAST(INDEX_NAME AS CHAR) AS index_name, \
       CAST(COLUMN_NAME AS CHAR) AS column_name, \
       CAST(NON_UNIQUE AS CHAR) AS non_unique, \
       CAST(SEQ_IN_INDEX AS CHAR) AS seq_in_index, \
       CAST(INDEX_TYPE AS CHAR) AS index_type \
FROM information_schema.STATISTICS \
WHERE TABLE_SCHEMA = ? \
ORDER BY TABLE_NAME, INDEX_NAME, SEQ_IN_INDEX";

const SIZES_SQL: &str = "\
SELECT CAST(TABLE_NAME AS CHAR) AS table_name, \
       CAST(TABLE_ROWS AS CHAR) AS table_rows \
FROM information_schema.TABLES \
WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE'";

/// Loads MySQL metadata from `information_schema`.
pub struct MySqlCatalog {
    executor: Arc<dyn SqlExecutor>,
}

impl MySqlCatalog {
    pub fn new(executor: Arc<dyn SqlExecutor>) -> Self {
        Self { executor }
    }

    fn index_from_row(row: &Row) -> Option<(String, RelationalIndex)> {
        let table = row::text(row, "table_name")?;
        let index = RelationalIndex {
            index_name: row::text(row, "index_name")?,
            column_name: row::text(row, "column_name").unwrap_or_default(),
            non_unique: if row::uint(row, "non_unique").unwrap_or(1) == 0 { 0 } else { 1 },
            seq_in_index: row::uint(row, "seq_in_index").unwrap_or(1) as u32,
            index_type: row::text(row, "index_type").unwrap_or_else(|| "BTREE".to_string()),
        };
        Some((table, index))
    }
}

#[async_trait]
impl MetadataBackend for MySqlCatalog {
    fn kind(&self) -> BackendKind {
        BackendKind::MySql
    }

    async fn load_schema(&self, database: &str, _options: &LoadOptions) -> MetadataResult<SchemaMap> {
        let rows = self.executor.fetch_all(COLUMNS_SQL, &[database]).await?;
        debug!(database, rows = rows.len(), "fetched mysql columns");

        let mut schema_map = SchemaMap::new();
        for row in &rows {
            let Some(table) = row::text(row, "table_name") else {
                continue;
            };
            let Some(column) = column_from_row(row) else {
                continue;
            };
            let key = BackendKind::MySql.qualify("", "", &table);
            let columns = schema_map.entry(key).or_default();
            if !columns.iter().any(|c| c.name == column.name) {
                columns.push(column);
            }
        }

        Ok(schema_map)
    }

    async fn load_indexes(&self, database: &str) -> MetadataResult<IndexMap> {
        let rows = self.executor.fetch_all(INDEXES_SQL, &[database]).await?;

        let mut index_map = IndexMap::new();
        for (table, index) in rows.iter().filter_map(Self::index_from_row) {
            let key = BackendKind::MySql.qualify("", "", &table);
            index_map
                .entry(key)
                .or_default()
                .push(IndexDescriptor::Relational(index));
        }

        Ok(index_map)
    }

    async fn load_sizes(&self, database: &str, _options: &LoadOptions) -> MetadataResult<TableSizeCache> {
        let rows = self.executor.fetch_all(SIZES_SQL, &[database]).await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let table = row::text(row, "table_name")?;
                let count = row::uint(row, "table_rows").unwrap_or(0);
                Some((BackendKind::MySql.qualify("", "", &table), count))
            })
            .collect())
    }

    async fn execute_query(&self, sql: &str) -> MetadataResult<Vec<Row>> {
        self.executor.fetch_all(sql, &[]).await
    }

    async fn close(&self) {
        self.executor.close().await;
    }
}
