//! PostgreSQL catalog loader (multiple schemas, `schema.table` names).

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{column_from_row, index_def, row, SqlExecutor};
use crate::config::BackendKind;
use crate::error::{MetadataError, MetadataResult};
use crate::metadata::{
    IndexDescriptor, IndexMap, LoadOptions, MetadataBackend, RelationalIndex, Row, SchemaMap,
    TableSizeCache,
};

const SCHEMAS_SQL: &str = "\
SELECT schema_name::text AS schema_name \
FROM information_schema.schemata \
WHERE schema_name NOT IN ('pg_catalog', 'information_schema') \
  AND schema_name NOT LIKE 'pg_toast%' \
  AND schema_name NOT LIKE 'pg_temp%' \
ORDER BY schema_name";

const COLUMNS_SQL: &str = "\
SELECT c.table_name::text AS table_name, \
       c.column_name::text AS column_name, \
       c.data_type::text AS data_type, \
       c.is_nullable::text AS is_nullable, \
       c.column_default::text AS column_default, \
       c.character_maximum_length::text AS character_maximum_length, \
       c.numeric_precision::text AS numeric_precision, \
       c.numeric_scale::text AS numeric_scale, \
       c.ordinal_position::text AS ordinal_position \
FROM information_schema.columns c \
JOIN information_schema.tables t \
  ON c.table_schema = t.table_schema AND c.table_name = t.table_name \
WHERE c.table_schema = $1 AND t.table_type = 'BASE TABLE' \
ORDER BY c.table_name, c.ordinal_position";

/// Structured index catalog: one row per indexed column.
const INDEX_CATALOG_SQL: &str = "\
SELECT n.nspname::text AS schema_name, \
       t.relname::text AS table_name, \
       i.relname::text AS index_name, \
       a.attname::text AS column_name, \
       (NOT ix.indisunique)::int::text AS non_unique, \
       k.ord::text AS seq_in_index, \
       upper(am.amname)::text AS index_type \
FROM pg_index ix \
JOIN pg_class t ON t.oid = ix.indrelid \
JOIN pg_class i ON i.oid = ix.indexrelid \
JOIN pg_namespace n ON n.oid = t.relnamespace \
JOIN pg_am am ON am.oid = i.relam \
CROSS JOIN LATERAL unnest(ix.indkey) WITH ORDINALITY AS k(attnum, ord) \
JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum \
WHERE n.nspname NOT IN ('pg_catalog', 'information_schema') \
  AND n.nspname NOT LIKE 'pg_toast%' \
ORDER BY n.nspname, t.relname, i.relname, k.ord";

/// Textual index definitions, parsed heuristically.
const INDEX_DEFINITIONS_SQL: &str = "\
SELECT schemaname::text AS schema_name, \
       tablename::text AS table_name, \
       indexname::text AS index_name, \
       indexdef::text AS index_definition \
FROM pg_indexes \
WHERE schemaname NOT IN ('pg_catalog', 'information_schema') \
ORDER BY schemaname, tablename, indexname";

const SIZES_SQL: &str = "\
SELECT schemaname::text AS schema_name, \
       relname::text AS table_name, \
       n_live_tup::text AS row_estimate \
FROM pg_stat_user_tables";

/// Loads PostgreSQL metadata schema by schema.
pub struct PostgresCatalog {
    executor: Arc<dyn SqlExecutor>,
}

impl PostgresCatalog {
    pub fn new(executor: Arc<dyn SqlExecutor>) -> Self {
        Self { executor }
    }

    /// Non-system schemas. A failed listing logs and yields no schemas.
    async fn list_schemas(&self, options: &LoadOptions) -> Vec<String> {
        match self.executor.fetch_all(SCHEMAS_SQL, &[]).await {
            Ok(rows) => rows
                .iter()
                .filter_map(|row| row::text(row, "schema_name"))
                .filter(|schema| options.includes_schema(schema))
                .collect(),
            Err(err) => {
                warn!(error = %err, "failed to list postgres schemas");
                Vec::new()
            }
        }
    }

    async fn load_schema_columns(&self, schema: &str, schema_map: &mut SchemaMap) -> MetadataResult<()> {
        let rows = self.executor.fetch_all(COLUMNS_SQL, &[schema]).await?;
        debug!(schema, rows = rows.len(), "fetched postgres columns");

        for row in &rows {
            let Some(table) = row::text(row, "table_name") else {
                continue;
            };
            let Some(column) = column_from_row(row) else {
                continue;
            };
            let key = BackendKind::Postgres.qualify("", schema, &table);
            let columns = schema_map.entry(key).or_default();
            if !columns.iter().any(|c| c.name == column.name) {
                columns.push(column);
            }
        }
        Ok(())
    }

    async fn indexes_from_catalog(&self) -> MetadataResult<IndexMap> {
        let rows = self.executor.fetch_all(INDEX_CATALOG_SQL, &[]).await?;

        let mut index_map = IndexMap::new();
        for row in &rows {
            let (Some(schema), Some(table), Some(index_name), Some(column)) = (
                row::text(row, "schema_name"),
                row::text(row, "table_name"),
                row::text(row, "index_name"),
                row::text(row, "column_name"),
            ) else {
                continue;
            };

            let index = RelationalIndex {
                index_name,
                column_name: column,
                non_unique: if row::uint(row, "non_unique").unwrap_or(1) == 0 { 0 } else { 1 },
                seq_in_index: row::uint(row, "seq_in_index").unwrap_or(1) as u32,
                index_type: row::text(row, "index_type").unwrap_or_else(|| index_def::OTHER_METHOD.to_string()),
            };
            index_map
                .entry(BackendKind::Postgres.qualify("", &schema, &table))
                .or_default()
                .push(IndexDescriptor::Relational(index));
        }
        Ok(index_map)
    }

    async fn indexes_from_definitions(&self) -> MetadataResult<IndexMap> {
        let rows = self.executor.fetch_all(INDEX_DEFINITIONS_SQL, &[]).await?;

        let mut index_map = IndexMap::new();
        for row in &rows {
            let (Some(schema), Some(table), Some(index_name), Some(definition)) = (
                row::text(row, "schema_name"),
                row::text(row, "table_name"),
                row::text(row, "index_name"),
                row::text(row, "index_definition"),
            ) else {
                continue;
            };

            let entries = index_def::index_entries(&index_name, &definition);
            index_map
                .entry(BackendKind::Postgres.qualify("", &schema, &table))
                .or_default()
                .extend(entries.into_iter().map(IndexDescriptor::Relational));
        }
        Ok(index_map)
    }
}

#[async_trait]
impl MetadataBackend for PostgresCatalog {
    fn kind(&self) -> BackendKind {
        BackendKind::Postgres
    }

    async fn load_schema(&self, _database: &str, options: &LoadOptions) -> MetadataResult<SchemaMap> {
        let schemas = self.list_schemas(options).await;

        let mut schema_map = SchemaMap::new();
        for schema in &schemas {
            if let Err(err) = self.load_schema_columns(schema, &mut schema_map).await {
                let err = MetadataError::partial(format!("schema {}", schema), &err);
                warn!(schema = %schema, error = %err, "skipping schema");
            }
        }

        Ok(schema_map)
    }

    async fn load_indexes(&self, _database: &str) -> MetadataResult<IndexMap> {
        match self.indexes_from_catalog().await {
            Ok(index_map) => Ok(index_map),
            Err(err) => {
                warn!(error = %err, "pg_index catalog unavailable, parsing index definitions");
                self.indexes_from_definitions().await
            }
        }
    }

    async fn load_sizes(&self, _database: &str, options: &LoadOptions) -> MetadataResult<TableSizeCache> {
        let rows = self.executor.fetch_all(SIZES_SQL, &[]).await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let schema = row::text(row, "schema_name")?;
                if !options.includes_schema(&schema) {
                    return None;
                }
                let table = row::text(row, "table_name")?;
                let count = row::uint(row, "row_estimate").unwrap_or(0);
                Some((BackendKind::Postgres.qualify("", &schema, &table), count))
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
