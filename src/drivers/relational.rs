//! sqlx-backed executors for the relational catalogs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{Column, Row as _};

use crate::catalog::SqlExecutor;
use crate::config::ConnectionConfig;
use crate::error::{MetadataError, MetadataResult};
use crate::metadata::{BackendConnector, MetadataBackend, Row};

const MAX_CONNECTIONS: u32 = 4;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

fn connect_error(config: &ConnectionConfig, err: sqlx::Error) -> MetadataError {
    MetadataError::ConnectionFailed {
        target: config.display_target(),
        message: err.to_string(),
    }
}

/// Decode every column of a row into JSON.
///
/// Columns are tried as text, integer, float, then boolean; anything else
/// becomes `null`.
fn row_to_json<'r, R>(row: &'r R) -> Row
where
    R: sqlx::Row,
    usize: sqlx::ColumnIndex<R>,
    String: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    i64: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    f64: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    bool: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
{
    let mut out = Row::new();
    for (i, column) in row.columns().iter().enumerate() {
        let value = if let Ok(v) = row.try_get::<Option<String>, _>(i) {
            v.map(Value::String)
        } else if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
            v.map(Value::from)
        } else if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
            v.map(Value::from)
        } else if let Ok(v) = row.try_get::<Option<bool>, _>(i) {
            v.map(Value::Bool)
        } else {
            None
        };
        out.insert(column.name().to_string(), value.unwrap_or(Value::Null));
    }
    out
}

#[cfg(feature = "mysql")]
mod mysql {
    use super::*;
    use crate::catalog::MySqlCatalog;
    use sqlx::mysql::{MySqlPool, MySqlPoolOptions};

    pub struct MySqlExecutor {
        pool: MySqlPool,
    }

    #[async_trait]
    impl SqlExecutor for MySqlExecutor {
        async fn fetch_all(&self, sql: &str, binds: &[&str]) -> MetadataResult<Vec<Row>> {
            let mut query = sqlx::query(sql);
            for bind in binds {
                query = query.bind(bind.to_string());
            }
            let rows = query.fetch_all(&self.pool).await.map_err(MetadataError::query)?;
            Ok(rows.iter().map(row_to_json).collect())
        }

        async fn close(&self) {
            self.pool.close().await;
        }
    }

    /// Opens [`MySqlCatalog`]s over a small sqlx pool.
    pub struct MySqlConnector;

    #[async_trait]
    impl BackendConnector for MySqlConnector {
        async fn connect(&self, config: &ConnectionConfig) -> MetadataResult<Arc<dyn MetadataBackend>> {
            let pool = MySqlPoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .acquire_timeout(ACQUIRE_TIMEOUT)
                .connect(&config.to_connection_url()?)
                .await
                .map_err(|err| connect_error(config, err))?;

            tracing::debug!(target = %config.display_target(), "mysql pool opened");
            Ok(Arc::new(MySqlCatalog::new(Arc::new(MySqlExecutor { pool }))))
        }
    }
}

#[cfg(feature = "postgres")]
mod postgres {
    use super::*;
    use crate::catalog::PostgresCatalog;
    use sqlx::postgres::{PgPool, PgPoolOptions};

    pub struct PgExecutor {
        pool: PgPool,
    }

    #[async_trait]
    impl SqlExecutor for PgExecutor {
        async fn fetch_all(&self, sql: &str, binds: &[&str]) -> MetadataResult<Vec<Row>> {
            let mut query = sqlx::query(sql);
            for bind in binds {
                query = query.bind(bind.to_string());
            }
            let rows = query.fetch_all(&self.pool).await.map_err(MetadataError::query)?;
            Ok(rows.iter().map(row_to_json).collect())
        }

        async fn close(&self) {
            self.pool.close().await;
        }
    }

    /// Opens [`PostgresCatalog`]s over a small sqlx pool.
    pub struct PostgresConnector;

    #[async_trait]
    impl BackendConnector for PostgresConnector {
        async fn connect(&self, config: &ConnectionConfig) -> MetadataResult<Arc<dyn MetadataBackend>> {
            let pool = PgPoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .acquire_timeout(ACQUIRE_TIMEOUT)
                .connect(&config.to_connection_url()?)
                .await
                .map_err(|err| connect_error(config, err))?;

            tracing::debug!(target = %config.display_target(), "postgres pool opened");
            Ok(Arc::new(PostgresCatalog::new(Arc::new(PgExecutor { pool }))))
        }
    }
}

#[cfg(feature = "mysql")]
pub use mysql::MySqlConnector;
#[cfg(feature = "postgres")]
pub use postgres::PostgresConnector;
