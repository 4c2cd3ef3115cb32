//! Configuration
//!
//! YAML-loaded catalog settings (`CatalogConfig`) and their error type.

pub mod catalog_config;
pub mod error;

pub use catalog_config::{CatalogConfig, IndexConfig, LayoutKind, SqliteConfig, DEFAULT_PAGE_SIZE};
pub use error::{ConfigError, ConfigResult};
