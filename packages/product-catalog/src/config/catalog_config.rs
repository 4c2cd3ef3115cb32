//! Catalog configuration (YAML schema v1)
//!
//! ```yaml
//! version: 1
//! backend: sqlite        # sqlite | index | remote
//! page_size: 20
//! sqlite:
//!   path: /var/archive/catalog.db
//!   layout: wide         # narrow | wide
//!   vector_elements: [Keyword]
//!   type_table_map:      # product type name -> table base name
//!     Ancillary: Granule
//! index:
//!   path: /var/archive/index
//!   writer_heap_bytes: 50000000
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::error::{ConfigError, ConfigResult};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 10_000;
pub const DEFAULT_WRITER_HEAP_BYTES: usize = 50_000_000;
/// Smallest heap the index writer accepts for its single thread
pub const MIN_WRITER_HEAP_BYTES: usize = 15_000_000;
pub const MAX_WRITER_HEAP_BYTES: usize = 4_000_000_000;

/// Physical layout of the relational backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    /// One row per product × element × value
    #[default]
    Narrow,
    /// One row per product, one column per element
    Wide,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqliteConfig {
    /// Database file; in-memory when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub layout: LayoutKind,

    /// Wide layout only: multi-valued elements stored in side tables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vector_elements: Vec<String>,

    /// Product types stored in another type's tables
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub type_table_map: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexConfig {
    /// Index directory; in-RAM when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default = "default_writer_heap")]
    pub writer_heap_bytes: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: None,
            writer_heap_bytes: DEFAULT_WRITER_HEAP_BYTES,
        }
    }
}

fn default_writer_heap() -> usize {
    DEFAULT_WRITER_HEAP_BYTES
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_backend() -> String {
    "sqlite".to_string()
}

/// Top-level catalog configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogConfig {
    /// Schema version (always 1)
    #[serde(default)]
    pub version: u32,

    /// Registered backend name
    #[serde(default = "default_backend")]
    pub backend: String,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default)]
    pub sqlite: SqliteConfig,

    #[serde(default)]
    pub index: IndexConfig,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            version: 1,
            backend: default_backend(),
            page_size: DEFAULT_PAGE_SIZE,
            sqlite: SqliteConfig::default(),
            index: IndexConfig::default(),
        }
    }
}

impl CatalogConfig {
    /// Load and validate a YAML file
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let config: CatalogConfig = serde_yaml::from_str(content)?;

        // Version check
        match config.version {
            0 => return Err(ConfigError::MissingVersion),
            1 => {}
            found => {
                return Err(ConfigError::UnsupportedVersion {
                    found,
                    supported: vec![1],
                })
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Range {
                field: "page_size".to_string(),
                value: self.page_size.to_string(),
                min: "1".to_string(),
                max: MAX_PAGE_SIZE.to_string(),
                hint: "Pages hold at least one product".to_string(),
            });
        }

        let heap = self.index.writer_heap_bytes;
        if !(MIN_WRITER_HEAP_BYTES..=MAX_WRITER_HEAP_BYTES).contains(&heap) {
            return Err(ConfigError::Range {
                field: "index.writer_heap_bytes".to_string(),
                value: heap.to_string(),
                min: MIN_WRITER_HEAP_BYTES.to_string(),
                max: MAX_WRITER_HEAP_BYTES.to_string(),
                hint: "The index writer needs at least 15MB".to_string(),
            });
        }

        if self.sqlite.layout == LayoutKind::Narrow && !self.sqlite.vector_elements.is_empty() {
            return Err(ConfigError::Validation(
                "sqlite.vector_elements only applies to the wide layout".to_string(),
            ));
        }
        Ok(())
    }
}
