//! Application services built on the `Catalog` port

pub mod complex_query;

pub use complex_query::{ComplexQueryExecutor, QueryResult};
