use std::sync::Arc;

use schemascope::catalog::{MySqlCatalog, PostgresCatalog};
use schemascope::config::{BackendKind, ConnectionConfig, PoolSettings};
use schemascope::document::DocumentCatalog;
use schemascope::metadata::{
    init_metadata, load_indexes, load_schema_map, BackendRegistry, LoadOptions, MetadataBackend,
    MetadataStore,
};
use schemascope::testing::{row, MockConnector, MockDocumentSource, MockSqlExecutor, MockWarehouseDriver};
use schemascope::warehouse::WarehousePool;
use serde_json::json;

fn shop_executor(tables: &[&str]) -> MockSqlExecutor {
    let columns = tables
        .iter()
        .flat_map(|table| {
            vec![
                row(json!({"table_name": table, "column_name": "id", "data_type": "int", "is_nullable": "NO", "ordinal_position": "1"})),
                row(json!({"table_name": table, "column_name": "name", "data_type": "varchar", "is_nullable": "YES", "ordinal_position": "2"})),
            ]
        })
        .collect();
    let indexes = tables
        .iter()
        .map(|table| row(json!({"table_name": table, "index_name": "PRIMARY", "column_name": "id", "non_unique": "0", "seq_in_index": "1", "index_type": "BTREE"})))
        .collect();
    let sizes = tables
        .iter()
        .map(|table| row(json!({"table_name": table, "table_rows": "10"})))
        .collect();

    MockSqlExecutor::new()
        .on("information_schema.COLUMNS", columns)
        .on("information_schema.STATISTICS", indexes)
        .on("information_schema.TABLES", sizes)
}

fn mysql_backend(executor: &MockSqlExecutor) -> Arc<dyn MetadataBackend> {
    Arc::new(MySqlCatalog::new(Arc::new(executor.clone())))
}

fn registry_with(kind: BackendKind, connector: MockConnector) -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register(kind, Arc::new(connector));
    registry
}

#[tokio::test]
async fn test_init_metadata_populates_all_maps() {
    let executor = shop_executor(&["customers", "orders"]);
    let registry = registry_with(BackendKind::MySql, MockConnector::new(mysql_backend(&executor)));
    let store = MetadataStore::new();

    let snapshot = init_metadata(&registry, &store, &ConnectionConfig::mysql("db", "shop"), &LoadOptions::default())
        .await
        .unwrap();

    assert_eq!(snapshot.schema_map.keys().collect::<Vec<_>>(), vec!["customers", "orders"]);
    assert_eq!(snapshot.index_map["orders"].len(), 1);
    assert_eq!(snapshot.table_size_cache["customers"], 10);
    assert_eq!(executor.close_count(), 1);
}

#[tokio::test]
async fn test_relational_load_order_is_schema_indexes_sizes() {
    let executor = shop_executor(&["orders"]);
    let registry = registry_with(BackendKind::MySql, MockConnector::new(mysql_backend(&executor)));
    let store = MetadataStore::new();

    init_metadata(&registry, &store, &ConnectionConfig::mysql("db", "shop"), &LoadOptions::default())
        .await
        .unwrap();

    let order: Vec<String> = executor.executed().into_iter().map(|(sql, _)| sql).collect();
    assert_eq!(order.len(), 3);
    assert!(order[0].contains("information_schema.COLUMNS"));
    assert!(order[1].contains("information_schema.STATISTICS"));
    assert!(order[2].contains("information_schema.TABLES"));
}

#[tokio::test]
async fn test_reload_is_idempotent() {
    let executor = shop_executor(&["customers", "orders"]);
    let registry = registry_with(BackendKind::MySql, MockConnector::new(mysql_backend(&executor)));
    let store = MetadataStore::new();
    let config = ConnectionConfig::mysql("db", "shop");

    let first = init_metadata(&registry, &store, &config, &LoadOptions::default()).await.unwrap();
    let second = init_metadata(&registry, &store, &config, &LoadOptions::default()).await.unwrap();

    assert_eq!(*first, *second);
    assert_eq!(second.schema_map["orders"].len(), 2);
}

#[tokio::test]
async fn test_reload_does_not_accumulate_tables() {
    let before = shop_executor(&["customers", "orders", "legacy_orders"]);
    let after = shop_executor(&["customers", "orders"]);
    let connector = MockConnector::sequence(vec![mysql_backend(&before), mysql_backend(&after)]);
    let registry = registry_with(BackendKind::MySql, connector.clone());
    let store = MetadataStore::new();
    let config = ConnectionConfig::mysql("db", "shop");

    let first = init_metadata(&registry, &store, &config, &LoadOptions::default()).await.unwrap();
    assert!(first.schema_map.contains_key("legacy_orders"));

    let second = init_metadata(&registry, &store, &config, &LoadOptions::default()).await.unwrap();
    assert!(!second.schema_map.contains_key("legacy_orders"));
    assert!(!second.index_map.contains_key("legacy_orders"));
    assert!(!second.table_size_cache.contains_key("legacy_orders"));
    assert_eq!(connector.connect_count(), 2);
}

#[tokio::test]
async fn test_failed_reload_closes_backend_and_keeps_error() {
    let executor = MockSqlExecutor::new().fail("information_schema.COLUMNS", "access denied");
    let registry = registry_with(BackendKind::MySql, MockConnector::new(mysql_backend(&executor)));
    let store = MetadataStore::new();

    let err = init_metadata(&registry, &store, &ConnectionConfig::mysql("db", "shop"), &LoadOptions::default())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("access denied"));
    assert_eq!(executor.close_count(), 1);
    assert!(store.snapshot().await.schema_map.is_empty());
}

#[tokio::test]
async fn test_document_init_skips_index_loading() {
    let source = MockDocumentSource::new()
        .collection("events", vec![json!({"kind": "click"}), json!({"kind": "view"})])
        .count("events", 420);
    let backend: Arc<dyn MetadataBackend> = Arc::new(DocumentCatalog::new(Arc::new(source.clone()), "analytics"));
    let registry = registry_with(BackendKind::MongoDb, MockConnector::new(backend.clone()));
    let store = MetadataStore::new();

    // Leftover indexes from an earlier explicit load are cleared by init.
    load_indexes(&store, backend.as_ref(), "analytics").await.unwrap();
    assert!(store.snapshot().await.index_map.contains_key("events"));

    let snapshot = init_metadata(&registry, &store, &ConnectionConfig::mongodb("mongo", "analytics"), &LoadOptions::default())
        .await
        .unwrap();

    assert_eq!(snapshot.schema_map["events"][0].name, "kind");
    assert_eq!(snapshot.table_size_cache["events"], 420);
    assert!(snapshot.index_map.is_empty());
    assert_eq!(source.close_count(), 1);
}

#[tokio::test]
async fn test_postgres_loads_into_qualified_keys() {
    let executor = MockSqlExecutor::new()
        .on("information_schema.schemata", vec![row(json!({"schema_name": "public"}))])
        .on_binds(
            "information_schema.columns",
            &["public"],
            vec![row(json!({"table_name": "orders", "column_name": "id", "data_type": "integer", "is_nullable": "NO"}))],
        );
    let backend = PostgresCatalog::new(Arc::new(executor));
    let store = MetadataStore::new();

    load_schema_map(&store, &backend, "shop", &LoadOptions::default()).await.unwrap();

    assert!(store.snapshot().await.schema_map.contains_key("public.orders"));
}

#[tokio::test]
async fn test_warehouse_init_leaves_pool_open() {
    let driver = MockWarehouseDriver::new()
        .on(
            "information_schema.columns",
            vec![row(json!({"table_schema": "sales", "table_name": "orders", "column_name": "id", "data_type": "bigint", "is_nullable": "NO"}))],
        )
        .on(
            "system.information_schema.tables",
            vec![row(json!({"table_catalog": "main", "table_schema": "sales", "table_name": "orders"}))],
        )
        .on("DESCRIBE DETAIL", vec![row(json!({"numRecords": 77}))]);
    let pool = WarehousePool::new(Arc::new(driver.clone()), PoolSettings::default());
    let mut registry = BackendRegistry::new();
    registry.register_warehouse(pool.clone());
    let store = MetadataStore::new();
    let config = ConnectionConfig::databricks("dbc.example.com", "/sql/1.0/warehouses/abc", "dapi", "main");

    let snapshot = init_metadata(&registry, &store, &config, &LoadOptions::default()).await.unwrap();

    assert!(snapshot.schema_map.contains_key("main.sales.orders"));
    assert_eq!(snapshot.table_size_cache["main.sales.orders"], 77);
    assert!(snapshot.index_map.is_empty());
    assert!(pool.contains(&config));
    assert_eq!(driver.connect_attempts(), 1);

    registry.shutdown().await;
    assert!(pool.is_empty());
    assert_eq!(driver.closed_clients(), 1);
}
