//! Shared fixtures for product-catalog integration tests

#![allow(dead_code)]

use std::sync::Arc;

use product_catalog::domain::{Catalog, Metadata, Product, ProductType, Reference};
use product_catalog::schema::SchemaDocument;
use product_catalog::{InMemoryCatalogService, RemoteCatalog, SchemaBridge};

pub const SCHEMA: &str = r#"
version: 1
elements:
  - { id: "urn:test:Filename", name: Filename }
  - { id: "urn:test:Sensor", name: Sensor }
  - { id: "urn:test:Keyword", name: Keyword }
  - { id: "urn:test:StartDateTime", name: StartDateTime }
  - { id: "urn:test:EndDateTime", name: EndDateTime }
  - { id: "urn:test:Version", name: Version }
product_types:
  - id: "urn:test:Granule"
    name: Granule
    repository_path: "file:///archive/granule"
    elements: [Filename, Sensor, Keyword, StartDateTime, EndDateTime, Version]
  - id: "urn:test:Ancillary"
    name: Ancillary
    repository_path: "file:///archive/ancillary"
    elements: [Filename, Sensor]
"#;

pub fn bridge() -> SchemaBridge {
    SchemaDocument::from_yaml_str(SCHEMA)
        .expect("fixture schema parses")
        .into_bridge()
}

pub fn granule() -> ProductType {
    ProductType::named("Granule")
}

pub fn ancillary() -> ProductType {
    ProductType::named("Ancillary")
}

pub fn metadata(pairs: &[(&str, &str)]) -> Metadata {
    pairs.iter().copied().collect()
}

/// Product with one materialized reference
pub fn materialized(name: &str, product_type: ProductType) -> Product {
    Product::new(name, product_type).with_reference(Reference::new(
        format!("file:///staging/{}", name),
        format!("file:///archive/{}", name),
        1024,
    ))
}

/// Register a complete product and attach its metadata
pub fn ingest(
    catalog: &dyn Catalog,
    name: &str,
    product_type: ProductType,
    pairs: &[(&str, &str)],
) -> Product {
    let mut product = materialized(name, product_type);
    catalog.add_product(&mut product).expect("add_product");
    catalog
        .add_metadata(&metadata(pairs), &product)
        .expect("add_metadata");
    product
}

#[cfg(feature = "sqlite")]
pub fn sqlite_narrow() -> product_catalog::SqliteCatalog {
    use product_catalog::{Layout, SqliteCatalog};
    SqliteCatalog::in_memory(Layout::Narrow, bridge(), 10).expect("in-memory sqlite")
}

#[cfg(feature = "sqlite")]
pub fn sqlite_wide() -> product_catalog::SqliteCatalog {
    use product_catalog::{Layout, SqliteCatalog};
    SqliteCatalog::in_memory(Layout::wide(["Keyword"]), bridge(), 10).expect("in-memory sqlite")
}

#[cfg(feature = "index")]
pub fn tantivy() -> product_catalog::TantivyCatalog {
    use product_catalog::config::catalog_config::DEFAULT_WRITER_HEAP_BYTES;
    product_catalog::TantivyCatalog::in_ram(bridge(), 10, DEFAULT_WRITER_HEAP_BYTES)
        .expect("in-ram index")
}

pub fn remote() -> RemoteCatalog {
    RemoteCatalog::new(Arc::new(InMemoryCatalogService::new()), bridge(), 10)
}

/// Every available backend, labelled
pub fn all_backends() -> Vec<(&'static str, Arc<dyn Catalog>)> {
    let mut backends: Vec<(&'static str, Arc<dyn Catalog>)> = Vec::new();
    #[cfg(feature = "sqlite")]
    {
        backends.push(("sqlite-narrow", Arc::new(sqlite_narrow())));
        backends.push(("sqlite-wide", Arc::new(sqlite_wide())));
    }
    #[cfg(feature = "index")]
    backends.push(("index", Arc::new(tantivy())));
    backends.push(("remote", Arc::new(remote())));
    backends
}

/// Ids of the given products, sorted
pub fn sorted_ids(products: &[&Product]) -> Vec<String> {
    let mut ids: Vec<String> = products.iter().filter_map(|p| p.id.clone()).collect();
    ids.sort();
    ids
}

pub fn sorted(mut ids: Vec<String>) -> Vec<String> {
    ids.sort();
    ids
}
