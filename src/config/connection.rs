//! Backend discriminator and resolved connection configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{MetadataError, MetadataResult};

/// Supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// MySQL: single catalog, bare table names.
    MySql,
    /// PostgreSQL: multiple schemas, `schema.table` names.
    Postgres,
    /// MongoDB: schema-less, bare collection names.
    MongoDb,
    /// Databricks SQL warehouse: `catalog.schema.table` names.
    Databricks,
}

/// How a backend turns catalog/schema/table into a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qualification {
    /// `table`
    Bare,
    /// `schema.table`
    SchemaTable,
    /// `catalog.schema.table`
    CatalogSchemaTable,
}

impl BackendKind {
    /// All known backends.
    pub const ALL: [BackendKind; 4] = [
        BackendKind::MySql,
        BackendKind::Postgres,
        BackendKind::MongoDb,
        BackendKind::Databricks,
    ];

    /// Canonical backend name.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::MySql => "mysql",
            BackendKind::Postgres => "postgres",
            BackendKind::MongoDb => "mongodb",
            BackendKind::Databricks => "databricks",
        }
    }

    /// Cargo feature that compiles this backend's driver in.
    pub fn driver_feature(&self) -> &'static str {
        self.as_str()
    }

    /// Port used when the configuration leaves it out.
    pub fn default_port(&self) -> u16 {
        match self {
            BackendKind::MySql => 3306,
            BackendKind::Postgres => 5432,
            BackendKind::MongoDb => 27017,
            BackendKind::Databricks => 443,
        }
    }

    /// Whether indexes come from a relational catalog.
    pub fn is_relational(&self) -> bool {
        matches!(self, BackendKind::MySql | BackendKind::Postgres)
    }

    /// The single naming rule this backend uses for cache keys.
    pub fn qualification(&self) -> Qualification {
        match self {
            BackendKind::MySql | BackendKind::MongoDb => Qualification::Bare,
            BackendKind::Postgres => Qualification::SchemaTable,
            BackendKind::Databricks => Qualification::CatalogSchemaTable,
        }
    }

    /// Build the qualified entity name for this backend.
    ///
    /// Parts the rule does not use are ignored.
    pub fn qualify(&self, catalog: &str, schema: &str, name: &str) -> String {
        match self.qualification() {
            Qualification::Bare => name.to_string(),
            Qualification::SchemaTable => format!("{}.{}", schema, name),
            Qualification::CatalogSchemaTable => format!("{}.{}.{}", catalog, schema, name),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(BackendKind::MySql),
            "postgres" | "postgresql" | "pg" => Ok(BackendKind::Postgres),
            "mongodb" | "mongo" => Ok(BackendKind::MongoDb),
            "databricks" => Ok(BackendKind::Databricks),
            other => Err(MetadataError::configuration(format!(
                "unsupported backend '{}'. Supported: mysql, postgres, mongodb, databricks",
                other
            ))),
        }
    }
}

/// Resolved connection configuration handed to the loaders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Backend discriminator.
    pub backend: BackendKind,
    /// Server hostname (workspace host for Databricks).
    pub host: String,
    /// Port (optional, uses the backend default).
    pub port: Option<u16>,
    /// Username.
    pub user: Option<String>,
    /// Password, or the access token for Databricks.
    pub password: Option<String>,
    /// Database name (catalog for Databricks).
    pub database: String,
    /// Warehouse HTTP path, e.g. `/sql/1.0/warehouses/abc123` (Databricks only).
    pub http_path: Option<String>,
    /// Full connection URI; overrides host/port when set (MongoDB only).
    pub uri: Option<String>,
}

impl ConnectionConfig {
    fn base(backend: BackendKind, host: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            backend,
            host: host.into(),
            port: None,
            user: None,
            password: None,
            database: database.into(),
            http_path: None,
            uri: None,
        }
    }

    /// MySQL connection.
    pub fn mysql(host: impl Into<String>, database: impl Into<String>) -> Self {
        Self::base(BackendKind::MySql, host, database)
    }

    /// PostgreSQL connection.
    pub fn postgres(host: impl Into<String>, database: impl Into<String>) -> Self {
        Self::base(BackendKind::Postgres, host, database)
    }

    /// MongoDB connection.
    pub fn mongodb(host: impl Into<String>, database: impl Into<String>) -> Self {
        Self::base(BackendKind::MongoDb, host, database)
    }

    /// Databricks SQL warehouse connection authenticated by access token.
    pub fn databricks(
        host: impl Into<String>,
        http_path: impl Into<String>,
        token: impl Into<String>,
        catalog: impl Into<String>,
    ) -> Self {
        let mut config = Self::base(BackendKind::Databricks, host, catalog);
        config.http_path = Some(http_path.into());
        config.user = Some("token".to_string());
        config.password = Some(token.into());
        config
    }

    /// Set username and password.
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Set an explicit port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Effective port.
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or_else(|| self.backend.default_port())
    }

    /// Check required fields for the backend.
    pub fn validate(&self) -> MetadataResult<()> {
        if self.host.trim().is_empty() && self.uri.is_none() {
            return Err(MetadataError::configuration(format!(
                "{} connection requires a host",
                self.backend
            )));
        }

        if self.backend == BackendKind::Databricks {
            if self.http_path.as_deref().map_or(true, |p| p.trim().is_empty()) {
                return Err(MetadataError::configuration(
                    "databricks connection requires http_path (warehouse path)",
                ));
            }
            if self.password.as_deref().map_or(true, |t| t.is_empty()) {
                return Err(MetadataError::configuration(
                    "databricks connection requires an access token",
                ));
            }
            if self.database.is_empty() {
                return Err(MetadataError::configuration(
                    "databricks connection requires a catalog",
                ));
            }
        }

        Ok(())
    }

    /// Key identifying one pooled warehouse connection target.
    pub fn pool_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.host,
            self.port_or_default(),
            self.user.as_deref().unwrap_or(""),
            self.database
        )
    }

    /// Host and port for log and error messages. Never includes credentials.
    pub fn display_target(&self) -> String {
        format!("{}:{}", self.host, self.port_or_default())
    }

    /// Build a driver URL (`mysql://`, `postgres://`, `mongodb://`).
    ///
    /// Credentials and the database name are percent-encoded, so a database
    /// such as `eu/sales` stays a single path segment.
    pub fn to_connection_url(&self) -> MetadataResult<String> {
        if let Some(uri) = &self.uri {
            return Ok(uri.clone());
        }

        let scheme = match self.backend {
            BackendKind::MySql => "mysql",
            BackendKind::Postgres => "postgres",
            BackendKind::MongoDb => "mongodb",
            BackendKind::Databricks => "https",
        };

        let invalid = |what: &str| {
            MetadataError::configuration(format!("{} connection has an invalid {}", self.backend, what))
        };

        let mut url = Url::parse(&format!("{}://{}:{}", scheme, self.host, self.port_or_default()))
            .map_err(|err| invalid(&format!("host ({})", err)))?;

        if let Some(user) = &self.user {
            url.set_username(user).map_err(|_| invalid("user"))?;
            if let Some(pass) = &self.password {
                url.set_password(Some(pass)).map_err(|_| invalid("password"))?;
            }
        }

        url.path_segments_mut()
            .map_err(|_| invalid("host"))?
            .push(&self.database);

        Ok(url.to_string())
    }
}
