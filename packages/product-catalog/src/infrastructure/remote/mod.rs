//! Delegating backend over a [`CatalogService`](crate::domain::CatalogService)

pub mod catalog;
pub mod memory_service;

pub use catalog::{keys, RemoteCatalog};
pub use memory_service::InMemoryCatalogService;
