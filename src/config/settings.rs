//! TOML-based configuration.
//!
//! Example configuration:
//! ```toml
//! [connections.shop]
//! backend = "mysql"
//! host = "db.internal"
//! user = "reader"
//! password = "secret"
//! database = "shop"
//!
//! [connections.lakehouse]
//! backend = "databricks"
//! host = "dbc-1234.cloud.databricks.com"
//! password = "dapi..."
//! database = "main"
//! http_path = "/sql/1.0/warehouses/abc123"
//!
//! [pool]
//! connect_timeout_secs = 30
//! idle_timeout_secs = 300
//! sweep_interval_secs = 60
//!
//! [metadata]
//! sample_size = 100
//! size_batch_size = 10
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::connection::{BackendKind, ConnectionConfig};
use crate::error::MetadataError;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error(transparent)]
    Invalid(#[from] MetadataError),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Named backend connections.
    pub connections: HashMap<String, ConnectionSettings>,

    /// Warehouse pool configuration.
    pub pool: PoolSettings,

    /// Metadata loading configuration.
    pub metadata: MetadataSettings,
}

/// One `[connections.<name>]` table.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionSettings {
    /// Backend name (mysql, postgres, mongodb, databricks).
    pub backend: String,

    #[serde(default)]
    pub host: String,

    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Database name, or catalog for Databricks.
    #[serde(default)]
    pub database: String,

    #[serde(default)]
    pub http_path: Option<String>,

    #[serde(default)]
    pub uri: Option<String>,
}

impl ConnectionSettings {
    /// Get the backend discriminator. Unknown names are an error.
    pub fn backend_kind(&self) -> Result<BackendKind, MetadataError> {
        self.backend.parse()
    }

    /// Convert into a validated [`ConnectionConfig`].
    pub fn to_connection_config(&self) -> Result<ConnectionConfig, MetadataError> {
        let backend = self.backend_kind()?;
        let mut user = self.user.clone();
        if backend == BackendKind::Databricks && user.is_none() {
            user = Some("token".to_string());
        }

        let config = ConnectionConfig {
            backend,
            host: self.host.clone(),
            port: self.port,
            user,
            password: self.password.clone(),
            database: self.database.clone(),
            http_path: self.http_path.clone(),
            uri: self.uri.clone(),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Warehouse connection pool settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolSettings {
    /// Upper bound on a single connect attempt.
    pub connect_timeout_secs: u64,

    /// Handles unused for longer than this are evicted.
    pub idle_timeout_secs: u64,

    /// How often the idle sweep runs.
    pub sweep_interval_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            idle_timeout_secs: 300,
            sweep_interval_secs: 60,
        }
    }
}

impl PoolSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Metadata loading settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetadataSettings {
    /// Documents sampled per collection for schema inference.
    pub sample_size: usize,

    /// Tables described concurrently by the warehouse size collector.
    pub size_batch_size: usize,

    /// Restrict multi-schema backends to these schemas.
    pub schemas: Option<Vec<String>>,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            sample_size: 100,
            size_batch_size: 10,
            schemas: None,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse settings from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(content)?)
    }

    /// Get a named connection as a validated [`ConnectionConfig`].
    pub fn connection(&self, name: &str) -> Result<ConnectionConfig, SettingsError> {
        let settings = self
            .connections
            .get(name)
            .ok_or_else(|| SettingsError::ConnectionNotFound(name.to_string()))?;
        Ok(settings.to_connection_config()?)
    }
}
