//! product-catalog - Product and metadata catalog for a data archive
//!
//! A catalog stores **products** (named, typed units of archived data with
//! file references) and the **metadata** describing them, and answers
//! structured queries over that metadata.
//!
//! ## Layers
//!
//! - `domain`: products, metadata, the criteria AST, pages and the ports
//!   (`Catalog`, `CatalogService`, `ValidationLayer`, `RepositoryManager`)
//! - `query`: the textual DSL (`parse_query`, `unparse`) and time-event filters
//! - `schema`: [`SchemaBridge`] resolving types and declared elements
//! - `infrastructure`: the `sqlite`, `index` and `remote` backends
//! - `application`: [`ComplexQueryExecutor`]
//! - `config` / `factory`: YAML settings and the backend registry
//!
//! ## Usage
//!
//! ```rust,ignore
//! use product_catalog::{CatalogConfig, CatalogContext, CatalogFactory, Query};
//!
//! let config = CatalogConfig::from_yaml("catalog.yaml")?;
//! let catalog = CatalogFactory::default().build(&config, &CatalogContext::new(bridge))?;
//!
//! let mut product = Product::new("granule-001.hdf", ProductType::named("Granule"));
//! catalog.add_product(&mut product)?;
//! catalog.add_metadata(&metadata, &product)?;
//!
//! let query = Query::with_criteria(vec![parse_criteria("Sensor = 'MODIS'")?]);
//! let page = catalog.first_page(&ProductType::named("Granule"))?;
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod factory;
pub mod infrastructure;
pub mod query;
pub mod schema;

pub use error::{CatalogError, ErrorKind, Result};

pub use domain::{
    BooleanCriteria, BooleanOperator, Catalog, CatalogService, ComplexQuery, Element,
    FilterAlgorithm, FilterAlgorithmKind, Metadata, PageWindow, Product, ProductPage,
    ProductStructure, ProductType, Query, QueryCriteria, QueryFilter, RangeCriteria, Reference,
    RepositoryManager, ServicePage, TermCriteria, TransferStatus, ValidationLayer, ALL_RESULTS,
};

pub use application::{ComplexQueryExecutor, QueryResult};
pub use config::{CatalogConfig, ConfigError, ConfigResult};
pub use factory::{CatalogContext, CatalogFactory};
pub use query::{parse_criteria, parse_query, unparse};
pub use schema::SchemaBridge;

pub use infrastructure::{InMemoryCatalogService, RemoteCatalog};

#[cfg(feature = "sqlite")]
pub use infrastructure::{Layout, SqliteCatalog};

#[cfg(feature = "index")]
pub use infrastructure::TantivyCatalog;
