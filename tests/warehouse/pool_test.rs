use std::sync::Arc;
use std::time::Duration;

use schemascope::config::{ConnectionConfig, PoolSettings};
use schemascope::error::MetadataError;
use schemascope::testing::{row, MockWarehouseDriver};
use schemascope::warehouse::WarehousePool;
use serde_json::json;

fn config() -> ConnectionConfig {
    ConnectionConfig::databricks("dbc.example.com", "/sql/1.0/warehouses/abc", "dapi", "main")
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_share_one_connect() {
    let driver = MockWarehouseDriver::new().connect_delay(Duration::from_secs(2));
    let pool = WarehousePool::new(Arc::new(driver.clone()), PoolSettings::default());

    let cfg = config();
    let (a, b) = tokio::join!(pool.get_connection(&cfg), pool.get_connection(&cfg));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.id(), b.id());
    assert_eq!(driver.connect_attempts(), 1);
    assert_eq!(pool.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_different_keys_connect_separately() {
    let driver = MockWarehouseDriver::new().connect_delay(Duration::from_millis(100));
    let pool = WarehousePool::new(Arc::new(driver.clone()), PoolSettings::default());

    let main = config();
    let mut other = config();
    other.database = "staging".to_string();

    let (a, b) = tokio::join!(pool.get_connection(&main), pool.get_connection(&other));
    assert_ne!(a.unwrap().id(), b.unwrap().id());
    assert_eq!(driver.connect_attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout() {
    let driver = MockWarehouseDriver::new().connect_delay(Duration::from_secs(31));
    let pool = WarehousePool::new(Arc::new(driver.clone()), PoolSettings::default());

    let err = pool.get_connection(&config()).await.unwrap_err();
    assert_eq!(
        err,
        MetadataError::ConnectionTimeout {
            target: "dbc.example.com:443".to_string(),
            seconds: 30,
        }
    );
    assert!(pool.is_empty());

    // Nothing was cached, so the next call tries again.
    let _ = pool.get_connection(&config()).await;
    assert_eq!(driver.connect_attempts(), 2);
}

#[tokio::test]
async fn test_execute_query_returns_rows() {
    let driver = MockWarehouseDriver::new().on("SELECT 42", vec![row(json!({"answer": 42}))]);
    let pool = WarehousePool::new(Arc::new(driver.clone()), PoolSettings::default());

    let rows = pool.execute_query("SELECT 42 AS answer", &config()).await.unwrap();
    assert_eq!(rows[0]["answer"], 42);
    assert_eq!(driver.executed(), vec!["SELECT 42 AS answer".to_string()]);
}

#[tokio::test]
async fn test_failed_query_forces_reconnect() {
    let driver = MockWarehouseDriver::new().fail_query("FROM missing_table");
    let pool = WarehousePool::new(Arc::new(driver.clone()), PoolSettings::default());

    let err = pool
        .execute_query("SELECT * FROM missing_table", &config())
        .await
        .unwrap_err();
    assert!(err.marks_connection_stale());

    pool.execute_query("SELECT 1", &config()).await.unwrap();
    assert_eq!(driver.connect_attempts(), 2);
    assert_eq!(driver.closed_clients(), 1);
    assert_eq!(pool.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_idle_handle_is_evicted_by_sweep() {
    let driver = MockWarehouseDriver::new();
    let pool = WarehousePool::start(Arc::new(driver.clone()), PoolSettings::default());

    pool.get_connection(&config()).await.unwrap();
    assert!(pool.contains(&config()));

    // Sweeps run every 60s; the handle is older than 300s at the 360s tick.
    tokio::time::sleep(Duration::from_secs(361)).await;

    assert!(!pool.contains(&config()));
    assert_eq!(driver.closed_clients(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_recently_used_handle_survives_sweep() {
    let driver = MockWarehouseDriver::new();
    let pool = WarehousePool::start(Arc::new(driver.clone()), PoolSettings::default());

    pool.get_connection(&config()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(250)).await;
    pool.get_connection(&config()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(111)).await;

    assert!(pool.contains(&config()));
    assert_eq!(driver.connect_attempts(), 1);
    assert_eq!(driver.closed_clients(), 0);
}

#[tokio::test]
async fn test_explicit_sweep_respects_threshold() {
    let driver = MockWarehouseDriver::new();
    let settings = PoolSettings {
        idle_timeout_secs: 0,
        ..Default::default()
    };
    let pool = WarehousePool::new(Arc::new(driver.clone()), settings);

    pool.get_connection(&config()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert_eq!(pool.sweep_idle().await, 1);
    assert!(pool.is_empty());
}

#[tokio::test]
async fn test_close_all_closes_every_handle() {
    let driver = MockWarehouseDriver::new();
    let pool = WarehousePool::start(Arc::new(driver.clone()), PoolSettings::default());

    let mut staging = config();
    staging.database = "staging".to_string();
    pool.get_connection(&config()).await.unwrap();
    pool.get_connection(&staging).await.unwrap();
    assert_eq!(pool.len(), 2);

    pool.close_all().await;
    assert!(pool.is_empty());
    assert_eq!(driver.closed_clients(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_sweep_leaves_long_running_query_alone() {
    let driver = MockWarehouseDriver::new()
        .on("SELECT slow", vec![row(json!({"done": true}))])
        .query_delay(Duration::from_secs(400));
    let pool = WarehousePool::start(Arc::new(driver.clone()), PoolSettings::default());
    let cfg = config();

    let (result, ()) = tokio::join!(pool.execute_query("SELECT slow", &cfg), async {
        // Past the 360s sweep while the query is still running.
        tokio::time::sleep(Duration::from_secs(370)).await;
        assert!(pool.contains(&cfg));
        assert_eq!(driver.closed_clients(), 0);
    });

    assert_eq!(result.unwrap()[0]["done"], true);
    assert!(pool.contains(&cfg));
    assert_eq!(driver.closed_clients(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_connect_finishing_after_close_all_is_closed() {
    let driver = MockWarehouseDriver::new().connect_delay(Duration::from_secs(5));
    let pool = WarehousePool::start(Arc::new(driver.clone()), PoolSettings::default());
    let cfg = config();

    let (result, ()) = tokio::join!(pool.get_connection(&cfg), async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        pool.close_all().await;
    });

    assert_eq!(
        result.unwrap_err(),
        MetadataError::PoolClosed {
            target: "dbc.example.com:443".to_string(),
        }
    );
    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert!(pool.is_empty());
    assert_eq!(driver.closed_clients(), 1);

    // The pool still hands out connections after being closed.
    pool.get_connection(&cfg).await.unwrap();
    assert_eq!(driver.connect_attempts(), 2);
    assert_eq!(pool.len(), 1);
}

#[tokio::test]
async fn test_close_on_signal_closes_handles() {
    let driver = MockWarehouseDriver::new();
    let pool = WarehousePool::start(Arc::new(driver.clone()), PoolSettings::default());
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let task = pool.close_on(async {
        let _ = rx.await;
    });

    pool.get_connection(&config()).await.unwrap();
    assert_eq!(driver.closed_clients(), 0);

    tx.send(()).unwrap();
    task.await.unwrap();

    assert!(pool.is_empty());
    assert_eq!(driver.closed_clients(), 1);
}

#[tokio::test]
async fn test_closing_a_dropped_pool_does_nothing() {
    let driver = MockWarehouseDriver::new();
    let pool = WarehousePool::new(Arc::new(driver.clone()), PoolSettings::default());
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let task = pool.close_on(async {
        let _ = rx.await;
    });

    drop(pool);
    tx.send(()).unwrap();
    task.await.unwrap();
    assert_eq!(driver.closed_clients(), 0);
}
