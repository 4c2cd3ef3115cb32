//! SQLite backend
//!
//! - `naming`: validated, quoted table/column identifiers
//! - `schema`: DDL for the shared and per-type tables
//! - `translator`: query criteria -> parameterized set-algebra SQL
//! - `catalog`: the [`Catalog`](crate::domain::Catalog) implementation

pub mod catalog;
pub mod naming;
pub(crate) mod schema;
pub mod translator;

pub use catalog::SqliteCatalog;
pub use naming::{column_name_for, table_name_for, TypeTables};
pub use translator::{Layout, SqlTranslator, Statement};
