//! Two-tier row count collection for the warehouse.
//!
//! Tier 1 lists managed tables from the system catalog and describes them in
//! concurrent batches. When the system catalog is unavailable or empty, tier 2
//! walks `SHOW SCHEMAS` / `SHOW TABLES` and reads the `Statistics` line of
//! `DESCRIBE TABLE EXTENDED` one table at a time. A table that cannot be
//! described is recorded with a count of zero.

use std::sync::LazyLock;

use futures::future::join_all;
use regex::Regex;
use tracing::{debug, info, warn};

use super::catalog::{quote_ident, quote_literal, WarehouseCatalog, INFORMATION_SCHEMA};
use crate::catalog::row;
use crate::config::BackendKind;
use crate::error::MetadataResult;
use crate::metadata::{LoadOptions, TableSizeCache};

/// Row count fields reported by `DESCRIBE DETAIL`, in preference order.
const DETAIL_COUNT_FIELDS: &[&str] = &["numRecords", "num_records", "row_count"];

static STATISTICS_ROWS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s+rows").expect("statistics pattern is valid"));

#[derive(Debug, Clone)]
struct TableRef {
    catalog: String,
    schema: String,
    table: String,
}

impl TableRef {
    fn quoted(&self) -> String {
        format!(
            "{}.{}.{}",
            quote_ident(&self.catalog),
            quote_ident(&self.schema),
            quote_ident(&self.table)
        )
    }

    fn key(&self) -> String {
        BackendKind::Databricks.qualify(&self.catalog, &self.schema, &self.table)
    }
}

/// Extract `N` from a `Statistics` value such as `12345 bytes, 678 rows`.
pub(crate) fn parse_statistics_rows(statistics: &str) -> Option<u64> {
    STATISTICS_ROWS
        .captures(statistics)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

impl WarehouseCatalog {
    pub(super) async fn collect_table_sizes(
        &self,
        catalog: &str,
        options: &LoadOptions,
    ) -> MetadataResult<TableSizeCache> {
        match self.managed_tables(catalog, options).await {
            Ok(tables) if !tables.is_empty() => {
                debug!(catalog, tables = tables.len(), "describing managed tables");
                Ok(self.describe_in_batches(&tables, options.size_batch_size.max(1)).await)
            }
            Ok(_) => {
                info!(catalog, "system catalog lists no managed tables, walking schemas");
                self.describe_each_table(catalog, options).await
            }
            Err(err) => {
                info!(catalog, error = %err, "system catalog unavailable, walking schemas");
                self.describe_each_table(catalog, options).await
            }
        }
    }

    async fn managed_tables(&self, catalog: &str, options: &LoadOptions) -> MetadataResult<Vec<TableRef>> {
        let sql = format!(
            "SELECT table_catalog, table_schema, table_name \
             FROM system.information_schema.tables \
             WHERE table_type = 'MANAGED' AND table_catalog = {}",
            quote_literal(catalog)
        );
        let rows = self.run(&sql).await?;

        Ok(rows
            .iter()
            .filter_map(|r| {
                let schema = row::text(r, "table_schema")?;
                if schema == INFORMATION_SCHEMA || !options.includes_schema(&schema) {
                    return None;
                }
                Some(TableRef {
                    catalog: row::text(r, "table_catalog").unwrap_or_else(|| catalog.to_string()),
                    schema,
                    table: row::text(r, "table_name")?,
                })
            })
            .collect())
    }

    async fn describe_detail(&self, table: &TableRef) -> u64 {
        match self.run(&format!("DESCRIBE DETAIL {}", table.quoted())).await {
            Ok(rows) => rows
                .first()
                .and_then(|r| row::uint_any(r, DETAIL_COUNT_FIELDS))
                .unwrap_or(0),
            Err(err) => {
                warn!(table = %table.key(), error = %err, "describe detail failed, recording zero rows");
                0
            }
        }
    }

    async fn describe_in_batches(&self, tables: &[TableRef], batch_size: usize) -> TableSizeCache {
        let mut sizes = TableSizeCache::new();
        for batch in tables.chunks(batch_size) {
            let counts = join_all(batch.iter().map(|table| self.describe_detail(table))).await;
            for (table, count) in batch.iter().zip(counts) {
                sizes.insert(table.key(), count);
            }
        }
        sizes
    }

    async fn describe_extended(&self, table: &TableRef) -> u64 {
        match self.run(&format!("DESCRIBE TABLE EXTENDED {}", table.quoted())).await {
            Ok(rows) => rows
                .iter()
                .find(|r| row::text(r, "col_name").is_some_and(|name| name.trim() == "Statistics"))
                .and_then(|r| row::text(r, "data_type"))
                .and_then(|statistics| parse_statistics_rows(&statistics))
                .unwrap_or(0),
            Err(err) => {
                warn!(table = %table.key(), error = %err, "describe extended failed, recording zero rows");
                0
            }
        }
    }

    async fn describe_each_table(&self, catalog: &str, options: &LoadOptions) -> MetadataResult<TableSizeCache> {
        let schema_rows = self
            .run(&format!("SHOW SCHEMAS IN {}", quote_ident(catalog)))
            .await?;

        let schemas: Vec<String> = schema_rows
            .iter()
            .filter_map(|r| row::text_any(r, &["databaseName", "namespace", "schema_name"]))
            .filter(|schema| schema != INFORMATION_SCHEMA && options.includes_schema(schema))
            .collect();

        let mut sizes = TableSizeCache::new();
        for schema in schemas {
            let sql = format!("SHOW TABLES IN {}.{}", quote_ident(catalog), quote_ident(&schema));
            let table_rows = match self.run(&sql).await {
                Ok(rows) => rows,
                Err(err) => {
                    warn!(catalog, schema = %schema, error = %err, "failed to list tables");
                    continue;
                }
            };

            for r in &table_rows {
                let Some(table) = row::text_any(r, &["tableName", "table_name"]) else {
                    continue;
                };
                let table = TableRef {
                    catalog: catalog.to_string(),
                    schema: schema.clone(),
                    table,
                };
                let count = self.describe_extended(&table).await;
                sizes.insert(table.key(), count);
            }
        }

        Ok(sizes)
    }
}
