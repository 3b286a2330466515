//! Metadata model, store, and dispatch.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  init_metadata / load_schema_map / load_indexes / load_sizes    │
//! └─────────────────────────────────────────────────────────────────┘
//!                  │                                  │
//!                  ▼                                  ▼
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │ BackendRegistry              │   │ MetadataStore                │
//! │  kind → BackendConnector     │   │  Arc<MetadataSnapshot>       │
//! └──────────────────────────────┘   │  schema / index / size maps  │
//!                  │                 └──────────────────────────────┘
//!                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │ MetadataBackend                                                 │
//! │  MySqlCatalog │ PostgresCatalog │ DocumentCatalog │ Warehouse   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use schemascope::config::{ConnectionConfig, Settings};
//! use schemascope::metadata::{init_metadata, BackendRegistry, LoadOptions, MetadataStore};
//!
//! let settings = Settings::from_file("schemascope.toml")?;
//! let registry = BackendRegistry::with_default_drivers(&settings);
//! let store = MetadataStore::new();
//!
//! let config = settings.connection("shop")?;
//! let snapshot = init_metadata(&registry, &store, &config, &LoadOptions::default()).await?;
//! println!("{} tables", snapshot.schema_map.len());
//! ```

mod loader;
mod provider;
mod registry;
mod store;
mod types;

pub use loader::{init_metadata, load_indexes, load_schema_map, load_table_sizes};
pub use provider::MetadataBackend;
pub use registry::{BackendConnector, BackendRegistry};
pub use store::{MetadataSnapshot, MetadataStore};
pub use types::*;
