use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::inference::infer_fields;
use super::{DocumentSource, RawDocumentIndex};
use crate::config::BackendKind;
use crate::error::{MetadataError, MetadataResult};
use crate::metadata::{
    DocumentIndex, IndexDescriptor, IndexMap, LoadOptions, MetadataBackend, Row, SchemaMap,
    TableSizeCache,
};

const SYSTEM_PREFIX: &str = "system.";

/// Metadata backend over a [`DocumentSource`].
pub struct DocumentCatalog {
    source: Arc<dyn DocumentSource>,
    /// Database that commands run against.
    database: String,
}

impl DocumentCatalog {
    pub fn new(source: Arc<dyn DocumentSource>, database: impl Into<String>) -> Self {
        Self {
            source,
            database: database.into(),
        }
    }

    async fn collections(&self, database: &str) -> MetadataResult<Vec<String>> {
        let mut names = self.source.list_collections(database).await?;
        names.retain(|name| !name.starts_with(SYSTEM_PREFIX));
        names.sort();
        Ok(names)
    }

    fn normalize_index(raw: RawDocumentIndex) -> DocumentIndex {
        let fields: Vec<String> = raw.keys.keys().cloned().collect();
        let text_index = raw.keys.values().any(|v| v.as_str() == Some("text"));
        DocumentIndex {
            index_name: raw.name,
            compound: fields.len() > 1,
            fields,
            text_index,
            keys: raw.keys,
            unique: raw.unique,
            sparse: raw.sparse,
            partial_filter: raw.partial_filter,
        }
    }
}

#[async_trait]
impl MetadataBackend for DocumentCatalog {
    fn kind(&self) -> BackendKind {
        BackendKind::MongoDb
    }

    async fn load_schema(&self, database: &str, options: &LoadOptions) -> MetadataResult<SchemaMap> {
        let mut schema_map = SchemaMap::new();

        for collection in self.collections(database).await? {
            match self
                .source
                .sample_documents(database, &collection, options.sample_size)
                .await
            {
                Ok(documents) => {
                    debug!(collection = %collection, sampled = documents.len(), "inferring fields");
                    schema_map.insert(
                        BackendKind::MongoDb.qualify("", "", &collection),
                        infer_fields(&documents),
                    );
                }
                Err(err) => {
                    let err = MetadataError::partial(format!("collection {}", collection), &err);
                    warn!(collection = %collection, error = %err, "skipping collection");
                }
            }
        }

        Ok(schema_map)
    }

    async fn load_indexes(&self, database: &str) -> MetadataResult<IndexMap> {
        let mut index_map = IndexMap::new();

        for collection in self.collections(database).await? {
            match self.source.list_indexes(database, &collection).await {
                Ok(indexes) => {
                    index_map.insert(
                        BackendKind::MongoDb.qualify("", "", &collection),
                        indexes
                            .into_iter()
                            .map(|raw| IndexDescriptor::Document(Self::normalize_index(raw)))
                            .collect(),
                    );
                }
                Err(err) => {
                    warn!(collection = %collection, error = %err, "failed to list indexes");
                }
            }
        }

        Ok(index_map)
    }

    async fn load_sizes(&self, database: &str, _options: &LoadOptions) -> MetadataResult<TableSizeCache> {
        let mut sizes = TableSizeCache::new();

        for collection in self.collections(database).await? {
            let count = match self.source.estimated_count(database, &collection).await {
                Ok(count) => count,
                Err(err) => {
                    warn!(collection = %collection, error = %err, "failed to count documents");
                    0
                }
            };
            sizes.insert(BackendKind::MongoDb.qualify("", "", &collection), count);
        }

        Ok(sizes)
    }

    /// `sql` is a JSON command document, e.g. `{"count": "orders"}`, run
    /// against the database the backend was opened on.
    async fn execute_query(&self, sql: &str) -> MetadataResult<Vec<Row>> {
        let command = match serde_json::from_str::<serde_json::Value>(sql) {
            Ok(serde_json::Value::Object(command)) if !command.is_empty() => command,
            Ok(_) => {
                return Err(MetadataError::QueryExecution(
                    "command must be a non-empty JSON object".to_string(),
                ))
            }
            Err(err) => return Err(MetadataError::query(format!("invalid command: {}", err))),
        };

        let reply = self.source.run_command(&self.database, command).await?;
        Ok(vec![reply])
    }

    async fn close(&self) {
        self.source.close().await;
    }
}
