//! Tantivy Catalog
//!
//! Reads only ever see indexed documents. Writes go through the
//! [`AssemblyCache`]: a product is (re)indexed when a mutation leaves it
//! complete, and withdrawn from the index when a mutation leaves an indexed
//! product incomplete.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::path::Path;
use tantivy::collector::{Count, DocSetCollector, TopDocs};
use tantivy::directory::MmapDirectory;
use tantivy::query::{AllQuery, Query as IndexQuery, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};
use uuid::Uuid;

use crate::config::CatalogConfig;
use crate::domain::models::{Metadata, Product, ProductType, Reference};
use crate::domain::page::{PageWindow, ProductPage};
use crate::domain::ports::Catalog;
use crate::domain::query::Query;
use crate::error::{CatalogError, Result};
use crate::infrastructure::index::assembly::{AssemblyCache, PendingProduct};
use crate::infrastructure::index::schema::{build_schema, metadata_term, IndexFields};
use crate::infrastructure::index::translator::IndexTranslator;
use crate::schema::SchemaBridge;

/// Index-backed catalog
pub struct TantivyCatalog {
    index: Index,
    writer: Mutex<IndexWriter>,
    reader: IndexReader,
    fields: IndexFields,
    bridge: SchemaBridge,
    cache: AssemblyCache,
    page_size: usize,
}

impl TantivyCatalog {
    /// Open (or create) an index in `index_dir`
    pub fn new(
        index_dir: impl AsRef<Path>,
        bridge: SchemaBridge,
        page_size: usize,
        writer_heap_bytes: usize,
    ) -> Result<Self> {
        let index_dir = index_dir.as_ref();
        std::fs::create_dir_all(index_dir).map_err(|e| {
            CatalogError::connection(format!(
                "cannot create index directory {}: {}",
                index_dir.display(),
                e
            ))
            .with_source(e)
        })?;
        let directory = MmapDirectory::open(index_dir).map_err(|e| {
            CatalogError::connection(format!("cannot open index {}: {}", index_dir.display(), e))
                .with_source(e)
        })?;
        let index = Index::open_or_create(directory, build_schema())?;
        Self::with_index(index, bridge, page_size, writer_heap_bytes)
    }

    /// In-RAM index (for testing)
    pub fn in_ram(bridge: SchemaBridge, page_size: usize, writer_heap_bytes: usize) -> Result<Self> {
        let index = Index::create_in_ram(build_schema());
        Self::with_index(index, bridge, page_size, writer_heap_bytes)
    }

    pub fn from_config(config: &CatalogConfig, bridge: SchemaBridge) -> Result<Self> {
        match &config.index.path {
            Some(path) => Self::new(path, bridge, config.page_size, config.index.writer_heap_bytes),
            None => Self::in_ram(bridge, config.page_size, config.index.writer_heap_bytes),
        }
    }

    fn with_index(
        index: Index,
        bridge: SchemaBridge,
        page_size: usize,
        writer_heap_bytes: usize,
    ) -> Result<Self> {
        let fields = IndexFields::from_schema(index.schema())?;
        let writer: IndexWriter = index.writer_with_num_threads(1, writer_heap_bytes)?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            writer: Mutex::new(writer),
            reader,
            fields,
            bridge,
            cache: AssemblyCache::new(),
            page_size,
        })
    }

    /// Products still being assembled
    pub fn cache(&self) -> &AssemblyCache {
        &self.cache
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Writes
    // ═══════════════════════════════════════════════════════════════════════

    fn id_term(&self, product_id: &str) -> Term {
        Term::from_field_text(self.fields.product_id, product_id)
    }

    /// Apply index operations and commit them; the reader sees them on return
    fn commit<F>(&self, operation: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut IndexWriter) -> Result<()>,
    {
        let mut writer = self.writer.lock();
        if let Err(err) = f(&mut writer) {
            if let Err(rollback_err) = writer.rollback() {
                tracing::error!(operation, error = %rollback_err, "index rollback failed");
            }
            return Err(err);
        }
        writer.commit()?;
        drop(writer);

        // committed; a failed reload must not fail the write
        reload_after_commit(operation, self.reader.reload());
        Ok(())
    }

    /// Run `f` with the product's slot locked, then release the slot
    fn with_slot<T, F>(&self, product_id: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Option<PendingProduct>) -> Result<T>,
    {
        let result = {
            let slot = self.cache.slot(product_id);
            let mut guard = slot.lock();
            f(&mut guard)
        };
        self.cache.release(product_id);
        result
    }

    /// Read-modify-write of one product
    ///
    /// A product absent from the cache is reloaded from its indexed document.
    fn mutate<F>(&self, product: &Product, operation: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut PendingProduct) -> Result<()>,
    {
        let product_id = product.require_id()?;
        self.with_slot(product_id, |slot| {
            let loaded = slot.is_none();
            if loaded {
                // the stale document is deleted by `flush`, which replaces or withdraws it
                *slot = Some(self.load_pending(product_id)?);
            }
            if let Some(pending) = slot.as_mut() {
                if let Err(err) = f(pending) {
                    if loaded {
                        *slot = None;
                    }
                    return Err(err);
                }
            }
            self.flush(product_id, operation, slot)
        })
    }

    /// Index a complete product, withdraw an incomplete indexed one
    fn flush(
        &self,
        product_id: &str,
        operation: &str,
        slot: &mut Option<PendingProduct>,
    ) -> Result<()> {
        let Some(pending) = slot.as_mut() else {
            return Ok(());
        };

        if pending.is_complete() {
            let document = self.to_document(product_id, pending)?;
            self.commit(operation, |writer| {
                writer.delete_term(self.id_term(product_id));
                writer.add_document(document)?;
                Ok(())
            })?;
            tracing::debug!(product_id, operation, "product indexed");
            *slot = None;
        } else if pending.indexed {
            self.commit(operation, |writer| {
                writer.delete_term(self.id_term(product_id));
                Ok(())
            })?;
            pending.indexed = false;
            tracing::debug!(product_id, operation, "incomplete product withdrawn from index");
        }
        Ok(())
    }

    fn to_document(&self, product_id: &str, pending: &PendingProduct) -> Result<TantivyDocument> {
        let product = &pending.product;
        let metadata = pending.metadata.clone().unwrap_or_default();
        let received_ms = product
            .received_time
            .map(|t| t.timestamp_millis())
            .unwrap_or_default();

        let mut doc = TantivyDocument::default();
        doc.add_text(self.fields.product_id, product_id);
        doc.add_text(self.fields.product_name, &product.name);
        doc.add_text(self.fields.product_type_id, &product.product_type.id);
        doc.add_text(self.fields.product_type_name, &product.product_type.name);
        doc.add_text(self.fields.structure, product.structure.as_str());
        doc.add_text(self.fields.transfer_status, product.transfer_status.as_str());
        doc.add_i64(self.fields.received_time, received_ms);
        for (element, values) in metadata.iter() {
            for value in values {
                doc.add_text(self.fields.metadata, metadata_term(element, value));
            }
        }
        doc.add_text(self.fields.metadata_json, serde_json::to_string(&metadata)?);
        doc.add_text(self.fields.references_json, serde_json::to_string(&product.references)?);
        Ok(doc)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Reads
    // ═══════════════════════════════════════════════════════════════════════

    fn stored_text(&self, doc: &TantivyDocument, field: Field) -> Result<String> {
        doc.get_first(field)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| {
                CatalogError::serialization(format!(
                    "indexed document lacks field '{}'",
                    self.fields.schema.get_field_name(field)
                ))
            })
    }

    fn decode_product(&self, doc: &TantivyDocument) -> Result<Product> {
        let references: Vec<Reference> =
            serde_json::from_str(&self.stored_text(doc, self.fields.references_json)?)?;
        let received_ms = doc
            .get_first(self.fields.received_time)
            .and_then(|v| v.as_i64())
            .unwrap_or_default();

        Ok(Product {
            id: Some(self.stored_text(doc, self.fields.product_id)?),
            name: self.stored_text(doc, self.fields.product_name)?,
            product_type: self
                .bridge
                .type_by_id(&self.stored_text(doc, self.fields.product_type_id)?)?,
            structure: self.stored_text(doc, self.fields.structure)?.parse()?,
            transfer_status: self.stored_text(doc, self.fields.transfer_status)?.parse()?,
            references,
            received_time: DateTime::from_timestamp_millis(received_ms),
        })
    }

    fn decode_metadata(&self, doc: &TantivyDocument) -> Result<Metadata> {
        Ok(serde_json::from_str(&self.stored_text(doc, self.fields.metadata_json)?)?)
    }

    fn find_doc(&self, product_id: &str) -> Result<Option<TantivyDocument>> {
        let searcher = self.reader.searcher();
        let query = TermQuery::new(self.id_term(product_id), IndexRecordOption::Basic);
        let hits = searcher.search(&query, &TopDocs::with_limit(1))?;
        match hits.first() {
            Some((_, address)) => Ok(Some(searcher.doc(*address)?)),
            None => Ok(None),
        }
    }

    fn require_doc(&self, product_id: &str) -> Result<TantivyDocument> {
        self.find_doc(product_id)?
            .ok_or_else(|| CatalogError::not_found("Product", product_id))
    }

    fn load_pending(&self, product_id: &str) -> Result<PendingProduct> {
        let doc = self.require_doc(product_id)?;
        Ok(PendingProduct {
            product: self.decode_product(&doc)?,
            metadata: Some(self.decode_metadata(&doc)?),
            indexed: true,
        })
    }

    /// Every hit of `query`, newest first
    fn search_products(&self, query: &dyn IndexQuery) -> Result<Vec<Product>> {
        let searcher = self.reader.searcher();
        let addresses = searcher.search(query, &DocSetCollector)?;

        let mut products = addresses
            .into_par_iter()
            .map(|address| {
                let doc: TantivyDocument = searcher.doc(address)?;
                self.decode_product(&doc)
            })
            .collect::<Result<Vec<_>>>()?;

        products.sort_by(|a, b| {
            b.received_time
                .cmp(&a.received_time)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(products)
    }

    fn type_query(&self, product_type: &ProductType) -> TermQuery {
        TermQuery::new(
            Term::from_field_text(self.fields.product_type_id, &product_type.id),
            IndexRecordOption::Basic,
        )
    }

    /// Hits of `query` on `product_type`, newest first
    fn matching(&self, query: &Query, product_type: &ProductType) -> Result<Vec<Product>> {
        let product_type = self.bridge.resolve_type(product_type)?;
        self.bridge.check_query(query, &product_type)?;
        let index_query = IndexTranslator::new(&self.fields).query_for(query, &product_type);
        self.search_products(index_query.as_ref())
    }
}

impl Catalog for TantivyCatalog {
    fn add_product(&self, product: &mut Product) -> Result<()> {
        if let Some(id) = &product.id {
            return Err(CatalogError::uniqueness(format!(
                "product '{}' already has id {}",
                product.name, id
            )));
        }
        let product_type = self.bridge.resolve_type(&product.product_type)?;
        let product_id = Uuid::now_v7().to_string();

        let mut stored = product.clone();
        stored.id = Some(product_id.clone());
        stored.product_type = product_type;
        stored.received_time = DateTime::from_timestamp_millis(Utc::now().timestamp_millis());

        self.with_slot(&product_id, |slot| {
            *slot = Some(PendingProduct::new(stored.clone()));
            Ok(())
        })?;
        tracing::debug!(product_id = %product_id, name = %stored.name, "product pending assembly");
        *product = stored;
        Ok(())
    }

    fn modify_product(&self, product: &Product) -> Result<()> {
        self.mutate(product, "modify_product", |pending| {
            pending.product.name = product.name.clone();
            pending.product.structure = product.structure;
            pending.product.transfer_status = product.transfer_status;
            pending.product.references = product.references.clone();
            Ok(())
        })
    }

    fn remove_product(&self, product: &Product) -> Result<()> {
        let product_id = product.require_id()?;
        self.with_slot(product_id, |slot| {
            let indexed = match slot.as_ref() {
                Some(pending) => pending.indexed,
                None => self.find_doc(product_id)?.is_some(),
            };
            if slot.is_none() && !indexed {
                return Err(CatalogError::not_found("Product", product_id));
            }
            if indexed {
                self.commit("remove_product", |writer| {
                    writer.delete_term(self.id_term(product_id));
                    Ok(())
                })?;
            }
            *slot = None;
            Ok(())
        })
    }

    fn set_product_transfer_status(&self, product: &Product) -> Result<()> {
        self.mutate(product, "set_product_transfer_status", |pending| {
            pending.product.transfer_status = product.transfer_status;
            Ok(())
        })
    }

    fn add_metadata(&self, metadata: &Metadata, product: &Product) -> Result<()> {
        self.mutate(product, "add_metadata", |pending| {
            let declared = self
                .bridge
                .declared_metadata(&pending.product.product_type, metadata)?;
            pending
                .metadata
                .get_or_insert_with(Metadata::new)
                .merge(&declared);
            Ok(())
        })
    }

    fn remove_metadata(&self, metadata: &Metadata, product: &Product) -> Result<()> {
        self.mutate(product, "remove_metadata", |pending| {
            if let Some(stored) = pending.metadata.as_mut() {
                stored.remove_values(metadata);
            }
            Ok(())
        })
    }

    fn add_product_references(&self, product: &Product) -> Result<()> {
        self.mutate(product, "add_product_references", |pending| {
            pending.product.references = product.references.clone();
            Ok(())
        })
    }

    fn product_by_id(&self, product_id: &str) -> Result<Product> {
        self.decode_product(&self.require_doc(product_id)?)
    }

    fn product_by_name(&self, product_name: &str) -> Result<Product> {
        let query = TermQuery::new(
            Term::from_field_text(self.fields.product_name, product_name),
            IndexRecordOption::Basic,
        );
        let mut products = self.search_products(&query)?;
        match products.len() {
            0 => Err(CatalogError::not_found("Product", product_name)),
            1 => Ok(products.remove(0)),
            n => Err(CatalogError::uniqueness(format!(
                "{} products named '{}'",
                n, product_name
            ))),
        }
    }

    fn product_references(&self, product: &Product) -> Result<Vec<Reference>> {
        Ok(self.product_by_id(product.require_id()?)?.references)
    }

    fn products(&self) -> Result<Vec<Product>> {
        self.search_products(&AllQuery)
    }

    fn products_by_type(&self, product_type: &ProductType) -> Result<Vec<Product>> {
        let product_type = self.bridge.resolve_type(product_type)?;
        self.search_products(&self.type_query(&product_type))
    }

    fn metadata(&self, product: &Product) -> Result<Metadata> {
        self.decode_metadata(&self.require_doc(product.require_id()?)?)
    }

    fn query(&self, query: &Query, product_type: &ProductType) -> Result<Vec<String>> {
        Ok(self
            .matching(query, product_type)?
            .into_iter()
            .filter_map(|p| p.id)
            .collect())
    }

    fn paged_query(
        &self,
        query: &Query,
        product_type: &ProductType,
        page_num: i64,
    ) -> Result<ProductPage> {
        let mut hits = self.matching(query, product_type)?;
        let num_of_hits = hits.len();
        let window = PageWindow::resolve(page_num, self.page_size, num_of_hits)?;
        let (start, end) = window.bounds(self.page_size, num_of_hits);
        let products: Vec<Product> = hits.drain(start..end).collect();
        Ok(window.into_page(self.page_size, num_of_hits, products))
    }

    fn top_n(&self, n: usize) -> Result<Vec<Product>> {
        let mut products = self.products()?;
        products.truncate(n);
        Ok(products)
    }

    fn top_n_by_type(&self, n: usize, product_type: &ProductType) -> Result<Vec<Product>> {
        let mut products = self.products_by_type(product_type)?;
        products.truncate(n);
        Ok(products)
    }

    fn num_products(&self, product_type: &ProductType) -> Result<usize> {
        let product_type = self.bridge.resolve_type(product_type)?;
        let searcher = self.reader.searcher();
        Ok(searcher.search(&self.type_query(&product_type), &Count)?)
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}

/// Log a reader reload that failed after a successful commit
///
/// Returns whether searches see the commit yet. A later reload picks it up.
fn reload_after_commit(operation: &str, reload: tantivy::Result<()>) -> bool {
    match reload {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(operation, error = %err, "index reader reload failed after commit");
            false
        }
    }
}
