//! MongoDB document source.

use std::sync::Arc;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document as BsonDocument};
use mongodb::{Client, IndexModel};
use serde_json::Value;

use crate::config::ConnectionConfig;
use crate::document::{Document, DocumentCatalog, DocumentSource, RawDocumentIndex};
use crate::error::{MetadataError, MetadataResult};
use crate::metadata::{BackendConnector, MetadataBackend, Row};

fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(id) => Value::String(id.to_hex()),
        Bson::DateTime(dt) => dt
            .try_to_rfc3339_string()
            .map(Value::String)
            .unwrap_or(Value::Null),
        Bson::Document(doc) => Value::Object(document_to_json(doc)),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        other => other.into_relaxed_extjson(),
    }
}

fn document_to_json(doc: BsonDocument) -> Document {
    doc.into_iter()
        .map(|(key, value)| (key, bson_to_json(value)))
        .collect()
}

fn raw_index(model: IndexModel) -> RawDocumentIndex {
    let options = model.options.unwrap_or_default();
    RawDocumentIndex {
        name: options.name.clone().unwrap_or_default(),
        keys: document_to_json(model.keys),
        unique: options.unique.unwrap_or(false),
        sparse: options.sparse.unwrap_or(false),
        partial_filter: options
            .partial_filter_expression
            .map(|filter| Value::Object(document_to_json(filter))),
    }
}

/// Reads collections through the official MongoDB driver.
pub struct MongoSource {
    client: Client,
}

#[async_trait]
impl DocumentSource for MongoSource {
    async fn list_collections(&self, database: &str) -> MetadataResult<Vec<String>> {
        self.client
            .database(database)
            .list_collection_names()
            .await
            .map_err(MetadataError::query)
    }

    async fn sample_documents(&self, database: &str, collection: &str, size: usize) -> MetadataResult<Vec<Document>> {
        let cursor = self
            .client
            .database(database)
            .collection::<BsonDocument>(collection)
            .aggregate(vec![doc! { "$sample": { "size": size as i64 } }])
            .await
            .map_err(MetadataError::query)?;

        let documents: Vec<BsonDocument> = cursor.try_collect().await.map_err(MetadataError::query)?;
        Ok(documents.into_iter().map(document_to_json).collect())
    }

    async fn list_indexes(&self, database: &str, collection: &str) -> MetadataResult<Vec<RawDocumentIndex>> {
        let cursor = self
            .client
            .database(database)
            .collection::<BsonDocument>(collection)
            .list_indexes()
            .await
            .map_err(MetadataError::query)?;

        let models: Vec<IndexModel> = cursor.try_collect().await.map_err(MetadataError::query)?;
        Ok(models.into_iter().map(raw_index).collect())
    }

    async fn estimated_count(&self, database: &str, collection: &str) -> MetadataResult<u64> {
        self.client
            .database(database)
            .collection::<BsonDocument>(collection)
            .estimated_document_count()
            .await
            .map_err(MetadataError::query)
    }

    async fn run_command(&self, database: &str, command: Document) -> MetadataResult<Row> {
        let command = mongodb::bson::to_document(&command).map_err(MetadataError::query)?;
        let reply = self
            .client
            .database(database)
            .run_command(command)
            .await
            .map_err(MetadataError::query)?;
        Ok(document_to_json(reply))
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
    }
}

/// Opens [`DocumentCatalog`]s over a MongoDB client.
pub struct MongoConnector;

#[async_trait]
impl BackendConnector for MongoConnector {
    async fn connect(&self, config: &ConnectionConfig) -> MetadataResult<Arc<dyn MetadataBackend>> {
        let connect_error = |err: mongodb::error::Error| MetadataError::ConnectionFailed {
            target: config.display_target(),
            message: err.to_string(),
        };

        let client = Client::with_uri_str(config.to_connection_url()?)
            .await
            .map_err(connect_error)?;
        client
            .database(&config.database)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(connect_error)?;

        tracing::debug!(target = %config.display_target(), "mongodb client connected");
        Ok(Arc::new(DocumentCatalog::new(
            Arc::new(MongoSource { client }),
            config.database.clone(),
        )))
    }
}
