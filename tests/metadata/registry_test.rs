use std::sync::Arc;

use schemascope::catalog::MySqlCatalog;
use schemascope::config::{BackendKind, ConnectionConfig, PoolSettings, Settings};
use schemascope::error::MetadataError;
use schemascope::metadata::{BackendRegistry, LoadOptions, MetadataBackend};
use schemascope::testing::{MockConnector, MockSqlExecutor, MockWarehouseDriver};
use schemascope::warehouse::WarehousePool;

#[tokio::test]
async fn test_unregistered_backend_names_the_missing_feature() {
    let registry = BackendRegistry::new();
    let err = registry
        .connect(&ConnectionConfig::mongodb("localhost", "crm"))
        .await
        .err()
        .unwrap();

    assert_eq!(
        err,
        MetadataError::DriverUnavailable {
            backend: BackendKind::MongoDb,
            feature: "mongodb",
        }
    );
    assert!(err.to_string().contains("mongodb"));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_dispatch_by_backend_kind() {
    let backend: Arc<dyn MetadataBackend> = Arc::new(MySqlCatalog::new(Arc::new(MockSqlExecutor::new())));
    let connector = MockConnector::new(backend);
    let mut registry = BackendRegistry::new();
    registry.register(BackendKind::MySql, Arc::new(connector.clone()));

    let opened = registry.connect(&ConnectionConfig::mysql("db", "shop")).await.unwrap();
    assert_eq!(opened.kind(), BackendKind::MySql);
    assert_eq!(connector.connect_count(), 1);

    assert!(registry
        .connect(&ConnectionConfig::postgres("db", "shop"))
        .await
        .is_err());
    assert_eq!(connector.connect_count(), 1);
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_connecting() {
    let connector = MockConnector::sequence(vec![]);
    let mut registry = BackendRegistry::new();
    registry.register(BackendKind::MySql, Arc::new(connector.clone()));

    let err = registry
        .connect(&ConnectionConfig::mysql("", "shop"))
        .await
        .err()
        .unwrap();

    assert!(matches!(err, MetadataError::Configuration(_)));
    assert_eq!(connector.connect_count(), 0);
}

#[test]
fn test_unknown_backend_in_settings_is_configuration_error() {
    let settings = Settings::from_toml_str(
        r#"
        [connections.legacy]
        backend = "oracle"
        host = "ora.internal"
        database = "erp"
        "#,
    )
    .unwrap();

    let err = settings.connection("legacy").unwrap_err();
    assert!(err.to_string().contains("oracle"));
}

#[tokio::test]
async fn test_warehouse_registration_exposes_pool() {
    let pool = WarehousePool::new(Arc::new(MockWarehouseDriver::new()), PoolSettings::default());
    let mut registry = BackendRegistry::new();
    registry.register_warehouse(pool.clone());

    assert!(registry.supports(BackendKind::Databricks));
    assert!(Arc::ptr_eq(registry.warehouse_pool().unwrap(), &pool));

    let config = ConnectionConfig::databricks("dbc.example.com", "/sql/1.0/warehouses/abc", "dapi", "main");
    let backend = registry.connect(&config).await.unwrap();
    assert_eq!(backend.kind(), BackendKind::Databricks);
    assert!(backend.load_indexes("main").await.unwrap().is_empty());
    assert!(backend
        .load_schema("main", &LoadOptions::default())
        .await
        .unwrap()
        .is_empty());
}
