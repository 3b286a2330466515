//! # Schemascope
//!
//! Metadata introspection and connection lifecycle for relational, document,
//! and warehouse backends.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │        ConnectionConfig + BackendKind (config)           │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [BackendRegistry]
//! ┌──────────────┬──────────────┬──────────────────────────┐
//! │   catalog    │   document   │        warehouse         │
//! │ MySQL / PG   │  sampling +  │  pooled sessions, two-   │
//! │ catalogs     │  inference   │  tier size collection    │
//! └──────────────┴──────────────┴──────────────────────────┘
//!                          │
//!                          ▼ [loaders]
//! ┌─────────────────────────────────────────────────────────┐
//! │   MetadataStore: schema map, index map, table sizes      │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Concrete drivers live in [`drivers`] behind the `mysql`, `postgres`,
//! `mongodb` and `databricks` features.

pub mod catalog;
pub mod config;
pub mod document;
pub mod drivers;
pub mod error;
pub mod metadata;
pub mod telemetry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod warehouse;

pub use config::{BackendKind, ConnectionConfig, Settings};
pub use error::{MetadataError, MetadataResult};
pub use metadata::{
    init_metadata, load_indexes, load_schema_map, load_table_sizes, BackendRegistry,
    ColumnDescriptor, IndexDescriptor, LoadOptions, MetadataBackend, MetadataSnapshot,
    MetadataStore,
};
pub use warehouse::WarehousePool;
