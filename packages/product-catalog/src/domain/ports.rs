//! Catalog ports
//!
//! `Catalog` is the contract every backend implements. The remaining traits
//! are read-only collaborators the backends consume.

use crate::domain::models::{Element, Metadata, Product, ProductType, Reference};
use crate::domain::page::ProductPage;
use crate::domain::query::Query;
use crate::error::Result;

/// Product catalog contract
///
/// Ids are assigned by the backend in `add_product`. Queries and paging
/// return empty lists / the blank page when nothing matches; point lookups
/// return `NotFound`.
pub trait Catalog: Send + Sync {
    /// Register a new product and assign its id
    ///
    /// # Errors
    /// `UniquenessViolation` when the product already carries an id.
    fn add_product(&self, product: &mut Product) -> Result<()>;

    /// Replace product fields and references; stored metadata is preserved
    fn modify_product(&self, product: &Product) -> Result<()>;

    /// Erase the product, its references and its metadata
    fn remove_product(&self, product: &Product) -> Result<()>;

    fn set_product_transfer_status(&self, product: &Product) -> Result<()>;

    /// Merge metadata into the product's stored metadata
    fn add_metadata(&self, metadata: &Metadata, product: &Product) -> Result<()>;

    /// Remove the given values from the product's stored metadata
    fn remove_metadata(&self, metadata: &Metadata, product: &Product) -> Result<()>;

    /// Replace the stored references with `product.references`
    fn add_product_references(&self, product: &Product) -> Result<()>;

    fn product_by_id(&self, product_id: &str) -> Result<Product>;

    /// # Errors
    /// `NotFound` for no match, `UniquenessViolation` for more than one.
    fn product_by_name(&self, product_name: &str) -> Result<Product>;

    fn product_references(&self, product: &Product) -> Result<Vec<Reference>>;

    fn products(&self) -> Result<Vec<Product>>;

    fn products_by_type(&self, product_type: &ProductType) -> Result<Vec<Product>>;

    fn metadata(&self, product: &Product) -> Result<Metadata>;

    /// Metadata restricted to `elements`
    fn reduced_metadata(&self, product: &Product, elements: &[String]) -> Result<Metadata> {
        Ok(self.metadata(product)?.reduce(elements))
    }

    /// Ids of the products of `product_type` matching `query`
    fn query(&self, query: &Query, product_type: &ProductType) -> Result<Vec<String>>;

    /// One page of matches, newest first; `ALL_RESULTS` returns everything
    fn paged_query(
        &self,
        query: &Query,
        product_type: &ProductType,
        page_num: i64,
    ) -> Result<ProductPage>;

    /// The `n` most recently received products
    fn top_n(&self, n: usize) -> Result<Vec<Product>>;

    fn top_n_by_type(&self, n: usize, product_type: &ProductType) -> Result<Vec<Product>>;

    fn num_products(&self, product_type: &ProductType) -> Result<usize>;

    fn page_size(&self) -> usize;

    // ═══════════════════════════════════════════════════════════════════════
    // Page navigation (built only on paged_query)
    // ═══════════════════════════════════════════════════════════════════════

    fn first_page(&self, product_type: &ProductType) -> Result<ProductPage> {
        self.paged_query(&Query::default(), product_type, 1)
    }

    fn last_page(&self, product_type: &ProductType) -> Result<ProductPage> {
        let first = self.first_page(product_type)?;
        if first.is_last_page() {
            return Ok(first);
        }
        self.paged_query(&Query::default(), product_type, first.total_pages as i64)
    }

    /// Page after `current`; the last page is returned unchanged
    fn next_page(
        &self,
        product_type: &ProductType,
        current: Option<&ProductPage>,
    ) -> Result<ProductPage> {
        match current {
            None => self.first_page(product_type),
            Some(page) if page.is_last_page() => Ok(page.clone()),
            Some(page) => {
                self.paged_query(&Query::default(), product_type, page.page_num as i64 + 1)
            }
        }
    }

    /// Page before `current`; the first page is returned unchanged
    fn prev_page(
        &self,
        product_type: &ProductType,
        current: Option<&ProductPage>,
    ) -> Result<ProductPage> {
        match current {
            None => self.first_page(product_type),
            Some(page) if page.is_first_page() => Ok(page.clone()),
            Some(page) => {
                self.paged_query(&Query::default(), product_type, page.page_num as i64 - 1)
            }
        }
    }
}

/// Element/schema validation layer
pub trait ValidationLayer: Send + Sync {
    /// Elements declared for a product type
    fn elements(&self, product_type: &ProductType) -> Result<Vec<Element>>;

    fn element_by_name(&self, name: &str) -> Result<Element>;

    fn element_by_id(&self, id: &str) -> Result<Element>;
}

/// Product type registry
pub trait RepositoryManager: Send + Sync {
    fn product_type_by_id(&self, id: &str) -> Result<ProductType>;

    fn product_type_by_name(&self, name: &str) -> Result<ProductType>;

    fn product_types(&self) -> Result<Vec<ProductType>>;
}

/// One page of transaction ids from a [`CatalogService`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServicePage {
    pub transaction_ids: Vec<String>,
    pub total_hits: usize,
}

/// Remote catalog service the delegating backend forwards to
///
/// Records are flat metadata keyed by transaction id. Services order query
/// results newest ingest first.
pub trait CatalogService: Send + Sync {
    /// Store a record; `None` allocates a new transaction id, `Some` replaces
    /// the record under that id.
    fn ingest(&self, transaction_id: Option<&str>, record: &Metadata) -> Result<String>;

    /// Returns false when nothing was stored under the id
    fn remove(&self, transaction_id: &str) -> Result<bool>;

    fn record(&self, transaction_id: &str) -> Result<Option<Metadata>>;

    fn query(&self, query: &Query) -> Result<Vec<String>>;

    /// Slice `[offset, offset + limit)` of the ordered matches
    fn page(&self, query: &Query, offset: usize, limit: usize) -> Result<ServicePage>;

    fn count(&self, query: &Query) -> Result<usize>;
}
