//! Backend dispatch.
//!
//! A [`BackendRegistry`] maps each [`BackendKind`] to the connector that can
//! open it. Kinds without a registered connector fail up front with
//! [`MetadataError::DriverUnavailable`] instead of at first query.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::provider::MetadataBackend;
use crate::config::{BackendKind, ConnectionConfig};
use crate::error::{MetadataError, MetadataResult};
use crate::warehouse::WarehousePool;

/// Opens a [`MetadataBackend`] for a validated configuration.
#[async_trait]
pub trait BackendConnector: Send + Sync {
    async fn connect(&self, config: &ConnectionConfig) -> MetadataResult<Arc<dyn MetadataBackend>>;
}

/// Registered connectors, one per backend kind.
#[derive(Default, Clone)]
pub struct BackendRegistry {
    connectors: HashMap<BackendKind, Arc<dyn BackendConnector>>,
    warehouse_pool: Option<Arc<WarehousePool>>,
}

impl BackendRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every driver compiled into this build.
    ///
    /// With the `databricks` feature this starts a [`WarehousePool`] that
    /// closes its connections on Ctrl-C or SIGTERM, so it must be called from
    /// within a Tokio runtime.
    #[allow(unused_mut, unused_variables)]
    pub fn with_default_drivers(settings: &crate::config::Settings) -> Self {
        let mut registry = Self::new();

        #[cfg(feature = "mysql")]
        registry.register(BackendKind::MySql, Arc::new(crate::drivers::MySqlConnector));

        #[cfg(feature = "postgres")]
        registry.register(BackendKind::Postgres, Arc::new(crate::drivers::PostgresConnector));

        #[cfg(feature = "mongodb")]
        registry.register(BackendKind::MongoDb, Arc::new(crate::drivers::MongoConnector));

        #[cfg(feature = "databricks")]
        {
            let pool = WarehousePool::start(
                Arc::new(crate::drivers::DatabricksDriver::new()),
                settings.pool.clone(),
            );
            pool.close_on_shutdown();
            registry.register_warehouse(pool);
        }

        registry
    }

    /// Register (or replace) the connector for a backend kind.
    pub fn register(&mut self, kind: BackendKind, connector: Arc<dyn BackendConnector>) -> &mut Self {
        self.connectors.insert(kind, connector);
        self
    }

    /// Register the warehouse backend on top of a running pool.
    pub fn register_warehouse(&mut self, pool: Arc<WarehousePool>) -> &mut Self {
        self.connectors.insert(
            BackendKind::Databricks,
            Arc::new(crate::warehouse::WarehouseConnector::new(pool.clone())),
        );
        self.warehouse_pool = Some(pool);
        self
    }

    /// Whether a connector is registered for `kind`.
    pub fn supports(&self, kind: BackendKind) -> bool {
        self.connectors.contains_key(&kind)
    }

    /// The warehouse pool, when the warehouse backend is registered.
    pub fn warehouse_pool(&self) -> Option<&Arc<WarehousePool>> {
        self.warehouse_pool.as_ref()
    }

    /// Look up the connector for `kind`.
    pub fn connector(&self, kind: BackendKind) -> MetadataResult<Arc<dyn BackendConnector>> {
        self.connectors
            .get(&kind)
            .cloned()
            .ok_or(MetadataError::DriverUnavailable {
                backend: kind,
                feature: kind.driver_feature(),
            })
    }

    /// Validate `config` and open its backend.
    pub async fn connect(&self, config: &ConnectionConfig) -> MetadataResult<Arc<dyn MetadataBackend>> {
        config.validate()?;
        let connector = self.connector(config.backend)?;
        tracing::debug!(backend = %config.backend, target = %config.display_target(), "opening backend");
        connector.connect(config).await
    }

    /// Close pooled warehouse connections, if any.
    pub async fn shutdown(&self) {
        if let Some(pool) = &self.warehouse_pool {
            pool.close_all().await;
        }
    }
}
