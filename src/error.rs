//! Error taxonomy for metadata loading and warehouse connections.

use thiserror::Error;

use crate::config::BackendKind;

/// Result type for metadata and pool operations.
pub type MetadataResult<T> = Result<T, MetadataError>;

/// Errors raised while loading metadata or talking to a backend.
///
/// The type is `Clone` so that one in-flight warehouse connect can hand the
/// same outcome to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetadataError {
    /// Unknown backend kind or a missing required field.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The backend's driver was not compiled into this build.
    #[error("{backend} driver is not available: rebuild with the `{feature}` feature")]
    DriverUnavailable {
        backend: BackendKind,
        feature: &'static str,
    },

    /// A single schema or collection failed to load. Callers recover from
    /// this locally and keep loading the remaining entities.
    #[error("failed to load {entity}: {message}")]
    PartialSchema { entity: String, message: String },

    /// Connecting to the warehouse took longer than the configured timeout.
    #[error("connection to {target} timed out after {seconds} seconds")]
    ConnectionTimeout { target: String, seconds: u64 },

    /// The backend refused or dropped the connection.
    #[error("connection to {target} failed: {message}")]
    ConnectionFailed { target: String, message: String },

    /// The warehouse pool was closed while a connect was in flight.
    #[error("warehouse pool closed while connecting to {target}")]
    PoolClosed { target: String },

    /// A statement or command failed on the backend.
    #[error("query failed: {0}")]
    QueryExecution(String),
}

impl MetadataError {
    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a query execution error.
    pub fn query(message: impl ToString) -> Self {
        Self::QueryExecution(message.to_string())
    }

    /// Wrap a failure of one entity so it can be logged and skipped.
    pub fn partial(entity: impl Into<String>, source: &MetadataError) -> Self {
        Self::PartialSchema {
            entity: entity.into(),
            message: source.to_string(),
        }
    }

    /// Errors that must surface immediately and are never retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::DriverUnavailable { .. }
        )
    }

    /// Whether a warehouse handle that produced this error must be discarded.
    pub fn marks_connection_stale(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::ConnectionFailed { .. } | Self::QueryExecution(_)
        )
    }
}
