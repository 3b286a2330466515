//! Databricks SQL warehouse driver over the Statement Execution API.
//!
//! See: https://docs.databricks.com/api/workspace/statementexecution

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::error::{MetadataError, MetadataResult};
use crate::metadata::Row;
use crate::warehouse::{WarehouseClient, WarehouseDriver, WarehouseSession};

const STATEMENTS_PATH: &str = "/api/2.0/sql/statements";
const WAIT_TIMEOUT: &str = "30s";
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Serialize)]
struct StatementRequest<'a> {
    statement: &'a str,
    warehouse_id: &'a str,
    catalog: &'a str,
    wait_timeout: &'a str,
    on_wait_timeout: &'a str,
    disposition: &'a str,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
struct StatementResponse {
    statement_id: String,
    status: StatementStatus,
    #[serde(default)]
    manifest: Option<Manifest>,
    #[serde(default)]
    result: Option<ResultChunk>,
}

#[derive(Debug, Deserialize)]
struct StatementStatus {
    state: String,
    #[serde(default)]
    error: Option<StatementError>,
}

#[derive(Debug, Deserialize)]
struct StatementError {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    schema: ManifestSchema,
}

#[derive(Debug, Deserialize)]
struct ManifestSchema {
    #[serde(default)]
    columns: Vec<ManifestColumn>,
}

#[derive(Debug, Deserialize)]
struct ManifestColumn {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResultChunk {
    #[serde(default)]
    data_array: Vec<Vec<Value>>,
    #[serde(default)]
    next_chunk_internal_link: Option<String>,
}

/// Take the warehouse id from an HTTP path like `/sql/1.0/warehouses/<id>`.
pub(crate) fn warehouse_id(http_path: &str) -> Option<&str> {
    http_path
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
}

/// Connects to Databricks SQL warehouses.
pub struct DatabricksDriver {
    http: Client,
}

impl DatabricksDriver {
    pub fn new() -> Self {
        Self { http: Client::new() }
    }
}

impl Default for DatabricksDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WarehouseDriver for DatabricksDriver {
    async fn connect(&self, config: &ConnectionConfig) -> MetadataResult<Arc<dyn WarehouseClient>> {
        let http_path = config.http_path.as_deref().unwrap_or_default();
        let warehouse_id = warehouse_id(http_path).ok_or_else(|| {
            MetadataError::configuration(format!("cannot read warehouse id from http_path '{}'", http_path))
        })?;

        let api = Arc::new(StatementApi {
            http: self.http.clone(),
            base_url: format!("https://{}:{}", config.host, config.port_or_default()),
            token: config.password.clone().unwrap_or_default(),
            warehouse_id: warehouse_id.to_string(),
            catalog: config.database.clone(),
        });

        api.execute("SELECT 1").await.map_err(|err| MetadataError::ConnectionFailed {
            target: config.display_target(),
            message: err.to_string(),
        })?;

        debug!(target = %config.display_target(), warehouse = %api.warehouse_id, "databricks warehouse reachable");
        Ok(Arc::new(DatabricksClient { api }))
    }
}

struct StatementApi {
    http: Client,
    base_url: String,
    token: String,
    warehouse_id: String,
    catalog: String,
}

impl StatementApi {
    async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> MetadataResult<T> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(MetadataError::query)?
            .error_for_status()
            .map_err(MetadataError::query)?;
        response.json().await.map_err(MetadataError::query)
    }

    async fn submit(&self, sql: &str) -> MetadataResult<StatementResponse> {
        let request = StatementRequest {
            statement: sql,
            warehouse_id: &self.warehouse_id,
            catalog: &self.catalog,
            wait_timeout: WAIT_TIMEOUT,
            on_wait_timeout: "CONTINUE",
            disposition: "INLINE",
            format: "JSON_ARRAY",
        };

        let response = self
            .http
            .post(format!("{}{}", self.base_url, STATEMENTS_PATH))
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(MetadataError::query)?
            .error_for_status()
            .map_err(MetadataError::query)?;
        response.json().await.map_err(MetadataError::query)
    }

    /// Submit, wait for a terminal state, and read every chunk.
    async fn execute(&self, sql: &str) -> MetadataResult<Vec<Row>> {
        let mut statement = self.submit(sql).await?;

        while matches!(statement.status.state.as_str(), "PENDING" | "RUNNING") {
            tokio::time::sleep(POLL_INTERVAL).await;
            statement = self
                .get(&format!("{}/{}", STATEMENTS_PATH, statement.statement_id))
                .await?;
        }

        if statement.status.state != "SUCCEEDED" {
            let message = statement
                .status
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("statement ended in state {}", statement.status.state));
            return Err(MetadataError::QueryExecution(message));
        }

        let columns: Vec<String> = statement
            .manifest
            .map(|m| m.schema.columns.into_iter().map(|c| c.name).collect())
            .unwrap_or_default();

        let mut rows = Vec::new();
        let mut chunk = statement.result.unwrap_or_default();
        loop {
            rows.extend(chunk.data_array.into_iter().map(|values| {
                columns
                    .iter()
                    .cloned()
                    .zip(values)
                    .collect::<Row>()
            }));
            match chunk.next_chunk_internal_link {
                Some(link) => chunk = self.get(&link).await?,
                None => break,
            }
        }
        Ok(rows)
    }
}

struct DatabricksClient {
    api: Arc<StatementApi>,
}

#[async_trait]
impl WarehouseClient for DatabricksClient {
    async fn open_session(&self) -> MetadataResult<Box<dyn WarehouseSession>> {
        Ok(Box::new(DatabricksSession { api: self.api.clone() }))
    }

    async fn close(&self) {
        debug!(warehouse = %self.api.warehouse_id, "databricks client closed");
    }
}

struct DatabricksSession {
    api: Arc<StatementApi>,
}

#[async_trait]
impl WarehouseSession for DatabricksSession {
    async fn execute(&mut self, sql: &str) -> MetadataResult<Vec<Row>> {
        self.api.execute(sql).await
    }

    async fn close(self: Box<Self>) {}
}
