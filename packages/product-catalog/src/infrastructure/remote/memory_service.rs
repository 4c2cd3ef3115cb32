//! In-process catalog service
//!
//! Evaluates queries with [`Query::matches`] over every stored record and
//! orders results newest ingest first. Used by tests and as the reference
//! delegate of [`RemoteCatalog`](super::RemoteCatalog).

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

use crate::domain::models::Metadata;
use crate::domain::ports::{CatalogService, ServicePage};
use crate::domain::query::Query;
use crate::error::{CatalogError, Result};

#[derive(Debug, Clone)]
struct StoredRecord {
    /// Ingest order of the first ingest; replacing a record keeps it
    sequence: u64,
    record: Metadata,
}

#[derive(Debug, Default)]
pub struct InMemoryCatalogService {
    records: RwLock<HashMap<String, StoredRecord>>,
    next_sequence: AtomicU64,
}

impl InMemoryCatalogService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Matching ids, newest first
    fn matching(&self, query: &Query) -> Vec<String> {
        let records = self.records.read();
        let mut hits: Vec<(u64, &String)> = records
            .iter()
            .filter(|(_, stored)| query.matches(&stored.record))
            .map(|(id, stored)| (stored.sequence, id))
            .collect();
        hits.sort_by(|a, b| b.0.cmp(&a.0));
        hits.into_iter().map(|(_, id)| id.clone()).collect()
    }
}

impl CatalogService for InMemoryCatalogService {
    fn ingest(&self, transaction_id: Option<&str>, record: &Metadata) -> Result<String> {
        let mut records = self.records.write();
        match transaction_id {
            Some(id) => {
                let stored = records
                    .get_mut(id)
                    .ok_or_else(|| CatalogError::not_found("Transaction", id))?;
                stored.record = record.clone();
                Ok(id.to_string())
            }
            None => {
                let id = Uuid::new_v4().to_string();
                let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
                records.insert(
                    id.clone(),
                    StoredRecord {
                        sequence,
                        record: record.clone(),
                    },
                );
                tracing::debug!(transaction_id = %id, "record ingested");
                Ok(id)
            }
        }
    }

    fn remove(&self, transaction_id: &str) -> Result<bool> {
        Ok(self.records.write().remove(transaction_id).is_some())
    }

    fn record(&self, transaction_id: &str) -> Result<Option<Metadata>> {
        Ok(self
            .records
            .read()
            .get(transaction_id)
            .map(|stored| stored.record.clone()))
    }

    fn query(&self, query: &Query) -> Result<Vec<String>> {
        Ok(self.matching(query))
    }

    fn page(&self, query: &Query, offset: usize, limit: usize) -> Result<ServicePage> {
        let hits = self.matching(query);
        let total_hits = hits.len();
        Ok(ServicePage {
            transaction_ids: hits.into_iter().skip(offset).take(limit).collect(),
            total_hits,
        })
    }

    fn count(&self, query: &Query) -> Result<usize> {
        Ok(self.matching(query).len())
    }
}
