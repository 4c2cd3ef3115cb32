//! Catalog domain: models, query AST, pages and ports

pub mod models;
pub mod page;
pub mod ports;
pub mod query;

pub use models::{
    Element, Metadata, Product, ProductStructure, ProductType, Reference, TransferStatus,
};
pub use page::{PageWindow, ProductPage, ALL_RESULTS};
pub use ports::{Catalog, CatalogService, RepositoryManager, ServicePage, ValidationLayer};
pub use query::{
    BooleanCriteria, BooleanOperator, ComplexQuery, FilterAlgorithm, FilterAlgorithmKind, Query,
    QueryCriteria, QueryFilter, RangeCriteria, TermCriteria,
};
