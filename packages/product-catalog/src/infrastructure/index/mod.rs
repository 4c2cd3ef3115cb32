//! Tantivy index backend
//!
//! - `schema`: document fields and the metadata term encoding
//! - `assembly`: per-product cache holding incomplete products
//! - `translator`: query criteria -> tantivy queries
//! - `catalog`: the [`Catalog`](crate::domain::Catalog) implementation

pub mod assembly;
pub mod catalog;
pub mod schema;
pub mod translator;

pub use assembly::{AssemblyCache, PendingProduct, Slot};
pub use catalog::TantivyCatalog;
pub use schema::{build_schema, IndexFields};
pub use translator::IndexTranslator;
