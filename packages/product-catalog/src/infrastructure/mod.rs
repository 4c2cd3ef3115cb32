//! Infrastructure layer - Catalog backends
//!
//! - `sqlite`: relational tables (narrow or wide layout)
//! - `index`: embedded tantivy full-text index
//! - `remote`: delegation to a [`CatalogService`](crate::domain::CatalogService)

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "index")]
pub mod index;

pub mod remote;

#[cfg(feature = "sqlite")]
pub use sqlite::{Layout, SqliteCatalog};

#[cfg(feature = "index")]
pub use index::{AssemblyCache, TantivyCatalog};

pub use remote::{InMemoryCatalogService, RemoteCatalog};
