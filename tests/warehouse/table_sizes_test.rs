use std::sync::Arc;
use std::time::Duration;

use schemascope::config::{ConnectionConfig, PoolSettings};
use schemascope::metadata::{LoadOptions, MetadataBackend};
use schemascope::testing::{row, MockWarehouseDriver};
use schemascope::warehouse::{WarehouseCatalog, WarehousePool};
use serde_json::json;

const MANAGED_TABLES: &str = "system.information_schema.tables";

fn config() -> ConnectionConfig {
    ConnectionConfig::databricks("dbc.example.com", "/sql/1.0/warehouses/abc", "dapi", "main")
}

fn catalog(driver: &MockWarehouseDriver) -> WarehouseCatalog {
    let pool = WarehousePool::new(Arc::new(driver.clone()), PoolSettings::default());
    WarehouseCatalog::new(pool, config())
}

fn managed(count: usize) -> Vec<serde_json::Map<String, serde_json::Value>> {
    (0..count)
        .map(|i| row(json!({"table_catalog": "main", "table_schema": "sales", "table_name": format!("t{:02}", i)})))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_managed_tables_described_in_batches() {
    let driver = MockWarehouseDriver::new()
        .on(MANAGED_TABLES, managed(25))
        .on("DESCRIBE DETAIL", vec![row(json!({"numRecords": 1000}))])
        .query_delay(Duration::from_millis(50));
    let catalog = catalog(&driver);

    let options = LoadOptions {
        size_batch_size: 10,
        ..Default::default()
    };
    let sizes = catalog.load_sizes("main", &options).await.unwrap();

    assert_eq!(sizes.len(), 25);
    assert_eq!(sizes["main.sales.t00"], 1000);
    assert_eq!(sizes["main.sales.t24"], 1000);
    assert_eq!(driver.max_concurrent_queries(), 10);

    let describes = driver
        .executed()
        .iter()
        .filter(|sql| sql.starts_with("DESCRIBE DETAIL"))
        .count();
    assert_eq!(describes, 25);
    assert!(driver.executed().iter().all(|sql| !sql.starts_with("SHOW")));
}

#[tokio::test]
async fn test_failed_describe_records_zero() {
    let driver = MockWarehouseDriver::new()
        .on(MANAGED_TABLES, managed(3))
        .fail_query("`t01`")
        .on("DESCRIBE DETAIL", vec![row(json!({"num_records": "12"}))]);
    let catalog = catalog(&driver);

    let sizes = catalog.load_sizes("main", &LoadOptions::default()).await.unwrap();

    assert_eq!(sizes["main.sales.t00"], 12);
    assert_eq!(sizes["main.sales.t01"], 0);
    assert_eq!(sizes["main.sales.t02"], 12);
}

#[tokio::test]
async fn test_falls_back_to_describe_extended() {
    let driver = MockWarehouseDriver::new()
        .fail_query(MANAGED_TABLES)
        .on(
            "SHOW SCHEMAS",
            vec![
                row(json!({"databaseName": "information_schema"})),
                row(json!({"databaseName": "sales"})),
                row(json!({"databaseName": "ops"})),
            ],
        )
        .on("SHOW TABLES IN `main`.`sales`", vec![
            row(json!({"database": "sales", "tableName": "orders", "isTemporary": false})),
            row(json!({"database": "sales", "tableName": "refunds", "isTemporary": false})),
        ])
        .fail_query("SHOW TABLES IN `main`.`ops`")
        .on(
            "`sales`.`orders`",
            vec![
                row(json!({"col_name": "id", "data_type": "bigint"})),
                row(json!({"col_name": "Statistics", "data_type": "52428 bytes, 3130 rows"})),
            ],
        )
        .on(
            "`sales`.`refunds`",
            vec![row(json!({"col_name": "Statistics", "data_type": "2048 bytes"}))],
        );
    let catalog = catalog(&driver);

    let sizes = catalog.load_sizes("main", &LoadOptions::default()).await.unwrap();

    assert_eq!(sizes.len(), 2);
    assert_eq!(sizes["main.sales.orders"], 3130);
    assert_eq!(sizes["main.sales.refunds"], 0);
    assert!(driver
        .executed()
        .iter()
        .any(|sql| sql == "DESCRIBE TABLE EXTENDED `main`.`sales`.`orders`"));
}

#[tokio::test]
async fn test_empty_system_catalog_also_falls_back() {
    let driver = MockWarehouseDriver::new()
        .on(MANAGED_TABLES, vec![])
        .on("SHOW SCHEMAS", vec![row(json!({"namespace": "sales"}))])
        .on("SHOW TABLES", vec![row(json!({"tableName": "orders"}))])
        .on(
            "DESCRIBE TABLE EXTENDED",
            vec![row(json!({"col_name": "Statistics", "data_type": "10 bytes, 4 rows"}))],
        );
    let catalog = catalog(&driver);

    let sizes = catalog.load_sizes("main", &LoadOptions::default()).await.unwrap();
    assert_eq!(sizes["main.sales.orders"], 4);
}
