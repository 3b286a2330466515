//! Warehouse backend: pooled, session-oriented connections.
//!
//! # Architecture
//!
//! ```text
//! WarehouseConnector ──► WarehouseCatalog ──► WarehousePool ──► WarehouseDriver
//!                         schema / sizes       key → handle       connect()
//!                                              pending connects
//!                                              idle sweeper
//! ```
//!
//! A handle is keyed by `host:port:user:database`. Queries open a session on
//! the handle's client, execute, and close the session. A failed query marks
//! the handle stale; the next caller for that key gets a fresh connection.

mod catalog;
mod handle;
mod pool;
mod sizes;

pub use catalog::{WarehouseCatalog, WarehouseConnector};
pub use handle::ConnectionHandle;
pub use pool::WarehousePool;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ConnectionConfig;
use crate::error::MetadataResult;
use crate::metadata::Row;

/// Opens warehouse clients.
#[async_trait]
pub trait WarehouseDriver: Send + Sync {
    async fn connect(&self, config: &ConnectionConfig) -> MetadataResult<Arc<dyn WarehouseClient>>;
}

/// A connected warehouse client that hands out sessions.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    async fn open_session(&self) -> MetadataResult<Box<dyn WarehouseSession>>;

    async fn close(&self);
}

/// One session-scoped operation.
#[async_trait]
pub trait WarehouseSession: Send + Sync {
    /// Execute `sql` and fetch every row.
    async fn execute(&mut self, sql: &str) -> MetadataResult<Vec<Row>>;

    async fn close(self: Box<Self>);
}
