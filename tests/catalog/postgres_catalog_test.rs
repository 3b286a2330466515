use std::sync::Arc;

use schemascope::catalog::PostgresCatalog;
use schemascope::metadata::{IndexDescriptor, LoadOptions, MetadataBackend, RelationalIndex};
use schemascope::testing::{row, MockSqlExecutor};
use serde_json::json;

const SCHEMAS: &str = "information_schema.schemata";
const COLUMNS: &str = "information_schema.columns";
const INDEX_CATALOG: &str = "FROM pg_index ix";
const INDEX_DEFINITIONS: &str = "FROM pg_indexes";

fn orders_columns(id_type: &str) -> Vec<serde_json::Map<String, serde_json::Value>> {
    vec![
        row(json!({"table_name": "orders", "column_name": "id", "data_type": id_type, "is_nullable": "NO", "ordinal_position": "1"})),
        row(json!({"table_name": "orders", "column_name": "placed_at", "data_type": "timestamp", "is_nullable": "YES", "ordinal_position": "2"})),
    ]
}

fn two_schemas() -> MockSqlExecutor {
    MockSqlExecutor::new()
        .on(
            SCHEMAS,
            vec![row(json!({"schema_name": "public"})), row(json!({"schema_name": "sales"}))],
        )
        .on_binds(COLUMNS, &["public"], orders_columns("integer"))
        .on_binds(COLUMNS, &["sales"], orders_columns("bigint"))
}

fn relational(index: &IndexDescriptor) -> &RelationalIndex {
    match index {
        IndexDescriptor::Relational(index) => index,
        other => panic!("expected relational index, got {:?}", other),
    }
}

#[tokio::test]
async fn test_same_table_in_two_schemas_gets_two_keys() {
    let catalog = PostgresCatalog::new(Arc::new(two_schemas()));
    let schema = catalog.load_schema("shop", &LoadOptions::default()).await.unwrap();

    assert_eq!(schema.keys().collect::<Vec<_>>(), vec!["public.orders", "sales.orders"]);
    assert_eq!(schema["public.orders"][0].data_type, "integer");
    assert_eq!(schema["sales.orders"][0].data_type, "bigint");
}

#[tokio::test]
async fn test_failed_schema_is_skipped() {
    let executor = MockSqlExecutor::new()
        .on(
            SCHEMAS,
            vec![
                row(json!({"schema_name": "audit"})),
                row(json!({"schema_name": "public"})),
            ],
        )
        .fail_binds(COLUMNS, &["audit"], "permission denied for schema audit")
        .on_binds(COLUMNS, &["public"], orders_columns("integer"));
    let catalog = PostgresCatalog::new(Arc::new(executor));

    let schema = catalog.load_schema("shop", &LoadOptions::default()).await.unwrap();
    assert_eq!(schema.keys().collect::<Vec<_>>(), vec!["public.orders"]);
}

#[tokio::test]
async fn test_schema_listing_failure_yields_empty_map() {
    let executor = MockSqlExecutor::new().fail(SCHEMAS, "connection reset");
    let catalog = PostgresCatalog::new(Arc::new(executor));

    let schema = catalog.load_schema("shop", &LoadOptions::default()).await.unwrap();
    assert!(schema.is_empty());
}

#[tokio::test]
async fn test_schema_filter() {
    let mock = two_schemas();
    let catalog = PostgresCatalog::new(Arc::new(mock.clone()));
    let options = LoadOptions {
        schemas: Some(vec!["sales".to_string()]),
        ..Default::default()
    };

    let schema = catalog.load_schema("shop", &options).await.unwrap();
    assert_eq!(schema.keys().collect::<Vec<_>>(), vec!["sales.orders"]);
    assert!(mock
        .executed()
        .iter()
        .all(|(_, binds)| binds != &vec!["public".to_string()]));
}

#[tokio::test]
async fn test_indexes_from_structured_catalog() {
    let executor = MockSqlExecutor::new().on(
        INDEX_CATALOG,
        vec![
            row(json!({"schema_name": "sales", "table_name": "orders", "index_name": "orders_pkey", "column_name": "id", "non_unique": "0", "seq_in_index": "1", "index_type": "BTREE"})),
            row(json!({"schema_name": "sales", "table_name": "orders", "index_name": "orders_cust_idx", "column_name": "customer_id", "non_unique": "1", "seq_in_index": "1", "index_type": "BTREE"})),
            row(json!({"schema_name": "sales", "table_name": "orders", "index_name": "orders_cust_idx", "column_name": "placed_at", "non_unique": "1", "seq_in_index": "2", "index_type": "BTREE"})),
        ],
    );
    let mock = executor.clone();
    let catalog = PostgresCatalog::new(Arc::new(executor));

    let indexes = catalog.load_indexes("shop").await.unwrap();
    let orders = &indexes["sales.orders"];
    assert_eq!(orders.len(), 3);
    assert_eq!(relational(&orders[0]).non_unique, 0);
    assert_eq!(relational(&orders[2]).column_name, "placed_at");
    assert_eq!(relational(&orders[2]).seq_in_index, 2);
    assert!(mock.executed().iter().all(|(sql, _)| !sql.contains(INDEX_DEFINITIONS)));
}

#[tokio::test]
async fn test_indexes_fall_back_to_definitions() {
    let executor = MockSqlExecutor::new()
        .fail(INDEX_CATALOG, "relation \"pg_index\" does not exist")
        .on(
            INDEX_DEFINITIONS,
            vec![
                row(json!({"schema_name": "public", "table_name": "orders", "index_name": "orders_pkey", "index_definition": "CREATE UNIQUE INDEX orders_pkey ON public.orders USING btree (id)"})),
                row(json!({"schema_name": "public", "table_name": "orders", "index_name": "orders_search", "index_definition": "CREATE INDEX orders_search ON public.orders USING gin (notes, tags)"})),
            ],
        );
    let catalog = PostgresCatalog::new(Arc::new(executor));

    let indexes = catalog.load_indexes("shop").await.unwrap();
    let orders = &indexes["public.orders"];
    assert_eq!(orders.len(), 3);

    let pkey = relational(&orders[0]);
    assert_eq!(pkey.index_name, "orders_pkey");
    assert_eq!(pkey.non_unique, 0);
    assert_eq!(pkey.index_type, "BTREE");

    let tags = relational(&orders[2]);
    assert_eq!(tags.column_name, "tags");
    assert_eq!(tags.seq_in_index, 2);
    assert_eq!(tags.index_type, "GIN");
    assert_eq!(tags.non_unique, 1);
}

#[tokio::test]
async fn test_sizes_from_statistics_view() {
    let executor = MockSqlExecutor::new().on(
        "pg_stat_user_tables",
        vec![
            row(json!({"schema_name": "public", "table_name": "orders", "row_estimate": "1500"})),
            row(json!({"schema_name": "sales", "table_name": "orders", "row_estimate": "-1"})),
        ],
    );
    let catalog = PostgresCatalog::new(Arc::new(executor));

    let sizes = catalog.load_sizes("shop", &LoadOptions::default()).await.unwrap();
    assert_eq!(sizes["public.orders"], 1500);
    assert_eq!(sizes["sales.orders"], 0);
}
