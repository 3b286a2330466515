//! Configuration module.
//!
//! Handles the backend discriminator, resolved connection configuration, and
//! TOML settings.

mod connection;
mod settings;

pub use connection::{BackendKind, ConnectionConfig, Qualification};
pub use settings::{ConnectionSettings, MetadataSettings, PoolSettings, Settings, SettingsError};
