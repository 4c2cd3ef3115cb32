//! Per-product assembly cache
//!
//! A product reaches the index only once it is complete: metadata present,
//! at least one reference, every reference materialized. Until then its
//! state lives here, one slot per product id.
//!
//! Every mutation of a product locks that product's slot for the whole
//! read-modify-write, so updates to one product are serialized while
//! different products proceed in parallel. Empty, unreferenced slots are
//! dropped by [`AssemblyCache::release`].

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::domain::models::{Metadata, Product};

/// Product state awaiting completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingProduct {
    pub product: Product,
    /// `None` until metadata has been added
    pub metadata: Option<Metadata>,
    /// A document for this product is currently in the index
    pub indexed: bool,
}

impl PendingProduct {
    pub fn new(product: Product) -> Self {
        Self {
            product,
            metadata: None,
            indexed: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.metadata.is_some() && self.product.references_materialized()
    }
}

/// Lockable slot of one product
pub type Slot = Arc<Mutex<Option<PendingProduct>>>;

/// Catalog-owned map of product id -> slot
#[derive(Debug, Default)]
pub struct AssemblyCache {
    slots: DashMap<String, Slot>,
}

impl AssemblyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `product_id`, created empty on first use
    ///
    /// Drop the returned handle before calling [`release`](Self::release).
    pub fn slot(&self, product_id: &str) -> Slot {
        self.slots
            .entry(product_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Drop the slot if it is empty and nobody else holds it
    pub fn release(&self, product_id: &str) {
        self.slots.remove_if(product_id, |_, slot| {
            Arc::strong_count(slot) == 1 && slot.try_lock().is_some_and(|pending| pending.is_none())
        });
    }

    /// A pending (not yet indexed) state is held for `product_id`
    pub fn contains(&self, product_id: &str) -> bool {
        // Clone out of the map guard before locking the slot
        let slot = self.slots.get(product_id).map(|entry| entry.value().clone());
        slot.is_some_and(|slot| slot.lock().is_some())
    }

    /// Snapshot of a pending product
    pub fn pending(&self, product_id: &str) -> Option<PendingProduct> {
        let slot = self.slots.get(product_id).map(|entry| entry.value().clone());
        slot.and_then(|slot| slot.lock().clone())
    }

    /// Number of slots currently allocated
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ProductType, Reference};
    use std::thread;

    fn product(datastore: &str) -> Product {
        let mut product = Product::new("a", ProductType::new("urn:t", "T"))
            .with_reference(Reference::new("file:///a", datastore, 1));
        product.id = Some("p1".into());
        product
    }

    #[test]
    fn test_completeness() {
        let mut pending = PendingProduct::new(product("file:///archive/a"));
        assert!(!pending.is_complete());
        pending.metadata = Some(Metadata::new());
        assert!(pending.is_complete());

        let mut unmaterialized = PendingProduct::new(product(""));
        unmaterialized.metadata = Some(Metadata::new());
        assert!(!unmaterialized.is_complete());
    }

    #[test]
    fn test_release_keeps_occupied_slots() {
        let cache = AssemblyCache::new();
        {
            let slot = cache.slot("p1");
            *slot.lock() = Some(PendingProduct::new(product("")));
        }
        cache.release("p1");
        assert!(cache.contains("p1"));

        {
            let slot = cache.slot("p1");
            *slot.lock() = None;
        }
        cache.release("p1");
        assert!(!cache.contains("p1"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_release_keeps_slots_in_use() {
        let cache = AssemblyCache::new();
        let held = cache.slot("p1");
        cache.release("p1");
        assert_eq!(cache.len(), 1);
        drop(held);
        cache.release("p1");
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_concurrent_updates_serialize_per_product() {
        let cache = Arc::new(AssemblyCache::new());
        {
            let slot = cache.slot("p1");
            let mut pending = PendingProduct::new(product(""));
            pending.metadata = Some(Metadata::new());
            *slot.lock() = Some(pending);
        }

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for j in 0..50 {
                        let slot = cache.slot("p1");
                        let mut guard = slot.lock();
                        if let Some(pending) = guard.as_mut() {
                            if let Some(metadata) = pending.metadata.as_mut() {
                                metadata.add("Keyword", format!("{}-{}", i, j));
                            }
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let pending = cache.pending("p1").unwrap();
        assert_eq!(pending.metadata.unwrap().get("Keyword").unwrap().len(), 400);
    }
}
