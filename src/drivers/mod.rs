//! Concrete drivers, each behind a cargo feature.
//!
//! | Feature      | Backend    | Crate     |
//! |--------------|------------|-----------|
//! | `mysql`      | MySQL      | `sqlx`    |
//! | `postgres`   | PostgreSQL | `sqlx`    |
//! | `mongodb`    | MongoDB    | `mongodb` |
//! | `databricks` | Databricks | `reqwest` |
//!
//! A build without a feature still knows the backend kind; connecting to it
//! fails with [`DriverUnavailable`](crate::error::MetadataError::DriverUnavailable).

#[cfg(feature = "databricks")]
mod databricks;
#[cfg(feature = "mongodb")]
mod mongo;
#[cfg(any(feature = "mysql", feature = "postgres"))]
mod relational;

#[cfg(feature = "databricks")]
pub use databricks::DatabricksDriver;
#[cfg(feature = "mongodb")]
pub use mongo::MongoConnector;
#[cfg(feature = "mysql")]
pub use relational::MySqlConnector;
#[cfg(feature = "postgres")]
pub use relational::PostgresConnector;
