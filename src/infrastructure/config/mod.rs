//! Configuration management infrastructure: hierarchical loading via
//! figment (defaults → YAML file → environment variables) and validation,
//! plus the model catalog loader (C1).

pub mod catalog;
pub mod loader;

pub use catalog::ModelCatalog;
pub use loader::{ConfigError, ConfigLoader};
