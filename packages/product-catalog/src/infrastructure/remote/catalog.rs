//! Delegating catalog
//!
//! Stores each product as one flat service record: the product's declared
//! metadata plus reserved `Product*` keys describing the product itself.
//! The service's transaction id is the product id.
//!
//! The service only stores whole records, so every update is a
//! read-modify-write. Those run under a per-product lock owned by the
//! catalog (shared by its clones).

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::domain::models::{Metadata, Product, ProductType, Reference};
use crate::domain::page::{PageWindow, ProductPage};
use crate::domain::ports::{Catalog, CatalogService};
use crate::domain::query::{Query, QueryCriteria};
use crate::error::{CatalogError, Result};
use crate::schema::SchemaBridge;

/// Record keys describing the product rather than its metadata
pub mod keys {
    pub const PRODUCT_NAME: &str = "ProductName";
    pub const PRODUCT_TYPE: &str = "ProductType";
    pub const PRODUCT_TYPE_ID: &str = "ProductTypeId";
    pub const PRODUCT_STRUCTURE: &str = "ProductStructure";
    pub const PRODUCT_TRANSFER_STATUS: &str = "ProductTransferStatus";
    pub const PRODUCT_RECEIVED_TIME: &str = "ProductReceivedTime";
    /// Ordered references, one JSON array value
    pub const PRODUCT_REFERENCES: &str = "ProductReferences";

    pub const RESERVED: [&str; 7] = [
        PRODUCT_NAME,
        PRODUCT_TYPE,
        PRODUCT_TYPE_ID,
        PRODUCT_STRUCTURE,
        PRODUCT_TRANSFER_STATUS,
        PRODUCT_RECEIVED_TIME,
        PRODUCT_REFERENCES,
    ];

    pub fn is_reserved(key: &str) -> bool {
        RESERVED.contains(&key)
    }
}

/// Product id -> write lock
#[derive(Debug, Default)]
struct RecordLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RecordLocks {
    /// Run `f` while holding the lock of `product_id`
    fn with_lock<T>(&self, product_id: &str, f: impl FnOnce() -> T) -> T {
        let lock = self
            .locks
            .entry(product_id.to_string())
            .or_default()
            .value()
            .clone();
        let result = {
            let _guard = lock.lock();
            f()
        };
        drop(lock);
        self.locks
            .remove_if(product_id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Catalog forwarding every operation to a [`CatalogService`]
#[derive(Clone)]
pub struct RemoteCatalog {
    service: Arc<dyn CatalogService>,
    bridge: SchemaBridge,
    page_size: usize,
    locks: Arc<RecordLocks>,
}

impl std::fmt::Debug for RemoteCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCatalog")
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl RemoteCatalog {
    pub fn new(service: Arc<dyn CatalogService>, bridge: SchemaBridge, page_size: usize) -> Self {
        Self {
            service,
            bridge,
            page_size,
            locks: Arc::new(RecordLocks::default()),
        }
    }

    pub fn service(&self) -> &Arc<dyn CatalogService> {
        &self.service
    }

    /// Write the product's own fields into `record`
    fn write_product_keys(&self, product: &Product, record: &mut Metadata) -> Result<()> {
        record.replace(keys::PRODUCT_NAME, [product.name.as_str()]);
        record.replace(keys::PRODUCT_TYPE, [product.product_type.name.as_str()]);
        record.replace(keys::PRODUCT_TYPE_ID, [product.product_type.id.as_str()]);
        record.replace(keys::PRODUCT_STRUCTURE, [product.structure.as_str()]);
        record.replace(keys::PRODUCT_TRANSFER_STATUS, [product.transfer_status.as_str()]);
        record.replace(
            keys::PRODUCT_REFERENCES,
            [serde_json::to_string(&product.references)?],
        );
        Ok(())
    }

    fn stored_record(&self, product_id: &str) -> Result<Metadata> {
        self.service
            .record(product_id)?
            .ok_or_else(|| CatalogError::not_found("Product", product_id))
    }

    fn required<'m>(record: &'m Metadata, key: &str) -> Result<&'m str> {
        record.first(key).ok_or_else(|| {
            CatalogError::serialization(format!("service record lacks '{}'", key))
        })
    }

    fn decode_product(&self, product_id: &str, record: &Metadata) -> Result<Product> {
        let references: Vec<Reference> = match record.first(keys::PRODUCT_REFERENCES) {
            Some(json) => serde_json::from_str(json)?,
            None => Vec::new(),
        };
        let received_time = match record.first(keys::PRODUCT_RECEIVED_TIME) {
            Some(ms) => {
                let ms: i64 = ms.parse().map_err(|_| {
                    CatalogError::serialization(format!("invalid received time '{}'", ms))
                })?;
                DateTime::from_timestamp_millis(ms)
            }
            None => None,
        };

        Ok(Product {
            id: Some(product_id.to_string()),
            name: Self::required(record, keys::PRODUCT_NAME)?.to_string(),
            product_type: self
                .bridge
                .type_by_id(Self::required(record, keys::PRODUCT_TYPE_ID)?)?,
            structure: Self::required(record, keys::PRODUCT_STRUCTURE)?.parse()?,
            transfer_status: Self::required(record, keys::PRODUCT_TRANSFER_STATUS)?.parse()?,
            references,
            received_time,
        })
    }

    fn load(&self, product_id: &str) -> Result<Product> {
        let record = self.stored_record(product_id)?;
        self.decode_product(product_id, &record)
    }

    fn load_all(&self, ids: Vec<String>) -> Result<Vec<Product>> {
        ids.iter().map(|id| self.load(id)).collect()
    }

    /// Read-modify-write of one record
    fn update<F>(&self, product: &Product, operation: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut Metadata) -> Result<()>,
    {
        let product_id = product.require_id()?;
        self.locks.with_lock(product_id, || -> Result<()> {
            let mut record = self.stored_record(product_id)?;
            f(&mut record)?;
            self.service.ingest(Some(product_id), &record)?;
            tracing::debug!(product_id, operation, "record updated");
            Ok(())
        })
    }

    fn type_criterion(product_type: &ProductType) -> QueryCriteria {
        QueryCriteria::term(keys::PRODUCT_TYPE_ID, product_type.id.as_str())
    }

    /// Caller query restricted to the resolved type
    fn service_query(&self, query: &Query, product_type: &ProductType) -> Result<Query> {
        let product_type = self.bridge.resolve_type(product_type)?;
        self.bridge.check_query(query, &product_type)?;
        let mut restricted = query.clone();
        restricted.add_criterion(Self::type_criterion(&product_type));
        Ok(restricted)
    }
}

impl Catalog for RemoteCatalog {
    fn add_product(&self, product: &mut Product) -> Result<()> {
        if let Some(id) = &product.id {
            return Err(CatalogError::uniqueness(format!(
                "product '{}' already has id {}",
                product.name, id
            )));
        }
        let mut stored = product.clone();
        stored.product_type = self.bridge.resolve_type(&product.product_type)?;
        let received_ms = Utc::now().timestamp_millis();
        stored.received_time = DateTime::from_timestamp_millis(received_ms);

        let mut record = Metadata::new();
        self.write_product_keys(&stored, &mut record)?;
        record.replace(keys::PRODUCT_RECEIVED_TIME, [received_ms.to_string()]);

        let product_id = self.service.ingest(None, &record)?;
        tracing::debug!(product_id = %product_id, name = %stored.name, "product ingested");
        stored.id = Some(product_id);
        *product = stored;
        Ok(())
    }

    fn modify_product(&self, product: &Product) -> Result<()> {
        self.update(product, "modify_product", |record| {
            let mut modified = product.clone();
            modified.product_type = self.bridge.type_by_id(Self::required(record, keys::PRODUCT_TYPE_ID)?)?;
            self.write_product_keys(&modified, record)
        })
    }

    fn remove_product(&self, product: &Product) -> Result<()> {
        let product_id = product.require_id()?;
        self.locks.with_lock(product_id, || -> Result<()> {
            if !self.service.remove(product_id)? {
                return Err(CatalogError::not_found("Product", product_id));
            }
            Ok(())
        })
    }

    fn set_product_transfer_status(&self, product: &Product) -> Result<()> {
        self.update(product, "set_product_transfer_status", |record| {
            record.replace(
                keys::PRODUCT_TRANSFER_STATUS,
                [product.transfer_status.as_str()],
            );
            Ok(())
        })
    }

    fn add_metadata(&self, metadata: &Metadata, product: &Product) -> Result<()> {
        self.update(product, "add_metadata", |record| {
            let product_type = self
                .bridge
                .type_by_id(Self::required(record, keys::PRODUCT_TYPE_ID)?)?;
            let mut declared = self.bridge.declared_metadata(&product_type, metadata)?;
            for key in keys::RESERVED {
                declared.remove_key(key);
            }
            record.merge(&declared);
            Ok(())
        })
    }

    fn remove_metadata(&self, metadata: &Metadata, product: &Product) -> Result<()> {
        self.update(product, "remove_metadata", |record| {
            let mut removable = metadata.clone();
            for key in keys::RESERVED {
                removable.remove_key(key);
            }
            record.remove_values(&removable);
            Ok(())
        })
    }

    fn add_product_references(&self, product: &Product) -> Result<()> {
        self.update(product, "add_product_references", |record| {
            record.replace(
                keys::PRODUCT_REFERENCES,
                [serde_json::to_string(&product.references)?],
            );
            Ok(())
        })
    }

    fn product_by_id(&self, product_id: &str) -> Result<Product> {
        self.load(product_id)
    }

    fn product_by_name(&self, product_name: &str) -> Result<Product> {
        let query = Query::with_criteria(vec![QueryCriteria::term(
            keys::PRODUCT_NAME,
            product_name,
        )]);
        let ids = self.service.query(&query)?;
        match ids.as_slice() {
            [] => Err(CatalogError::not_found("Product", product_name)),
            [id] => self.load(id),
            _ => Err(CatalogError::uniqueness(format!(
                "{} products named '{}'",
                ids.len(),
                product_name
            ))),
        }
    }

    fn product_references(&self, product: &Product) -> Result<Vec<Reference>> {
        Ok(self.load(product.require_id()?)?.references)
    }

    fn products(&self) -> Result<Vec<Product>> {
        self.load_all(self.service.query(&Query::new())?)
    }

    fn products_by_type(&self, product_type: &ProductType) -> Result<Vec<Product>> {
        let product_type = self.bridge.resolve_type(product_type)?;
        let query = Query::with_criteria(vec![Self::type_criterion(&product_type)]);
        self.load_all(self.service.query(&query)?)
    }

    fn metadata(&self, product: &Product) -> Result<Metadata> {
        let mut record = self.stored_record(product.require_id()?)?;
        for key in keys::RESERVED {
            record.remove_key(key);
        }
        Ok(record)
    }

    fn query(&self, query: &Query, product_type: &ProductType) -> Result<Vec<String>> {
        let restricted = self.service_query(query, product_type)?;
        let ids = self.service.query(&restricted)?;
        if ids.is_empty() {
            tracing::debug!(product_type = %product_type.name, "query matched no products");
        }
        Ok(ids)
    }

    fn paged_query(
        &self,
        query: &Query,
        product_type: &ProductType,
        page_num: i64,
    ) -> Result<ProductPage> {
        let restricted = self.service_query(query, product_type)?;
        let num_of_hits = self.service.count(&restricted)?;
        let window = PageWindow::resolve(page_num, self.page_size, num_of_hits)?;
        let (offset, limit) = match window {
            PageWindow::Blank => return Ok(ProductPage::blank(self.page_size)),
            PageWindow::All => (0, num_of_hits),
            PageWindow::Slice { offset, .. } => (offset, self.page_size),
        };
        let page = self.service.page(&restricted, offset, limit)?;
        let products = self.load_all(page.transaction_ids)?;
        Ok(window.into_page(self.page_size, num_of_hits, products))
    }

    fn top_n(&self, n: usize) -> Result<Vec<Product>> {
        let page = self.service.page(&Query::new(), 0, n)?;
        self.load_all(page.transaction_ids)
    }

    fn top_n_by_type(&self, n: usize, product_type: &ProductType) -> Result<Vec<Product>> {
        let product_type = self.bridge.resolve_type(product_type)?;
        let query = Query::with_criteria(vec![Self::type_criterion(&product_type)]);
        let page = self.service.page(&query, 0, n)?;
        self.load_all(page.transaction_ids)
    }

    fn num_products(&self, product_type: &ProductType) -> Result<usize> {
        let product_type = self.bridge.resolve_type(product_type)?;
        self.service
            .count(&Query::with_criteria(vec![Self::type_criterion(&product_type)]))
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}
