//! Catalog domain models
//!
//! Products, their types, file references and descriptive metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{CatalogError, Result};

/// How the files of a product are laid out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProductStructure {
    #[default]
    Flat,
    Hierarchical,
    Stream,
}

impl ProductStructure {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStructure::Flat => "Flat",
            ProductStructure::Hierarchical => "Hierarchical",
            ProductStructure::Stream => "Stream",
        }
    }
}

impl FromStr for ProductStructure {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Flat" => Ok(ProductStructure::Flat),
            "Hierarchical" => Ok(ProductStructure::Hierarchical),
            "Stream" => Ok(ProductStructure::Stream),
            other => Err(CatalogError::serialization(format!(
                "unknown product structure: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for ProductStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transfer state of a product's files into the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransferStatus {
    #[default]
    Transferring,
    Received,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Transferring => "TRANSFERRING",
            TransferStatus::Received => "RECEIVED",
        }
    }
}

impl FromStr for TransferStatus {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "TRANSFERRING" => Ok(TransferStatus::Transferring),
            "RECEIVED" => Ok(TransferStatus::Received),
            other => Err(CatalogError::serialization(format!(
                "unknown transfer status: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Multi-valued descriptive metadata: element name -> values
///
/// Keys iterate in sorted order. Adding a value already present under a key
/// is a no-op, which makes every merge idempotent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata {
    values: BTreeMap<String, Vec<String>>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a single value under `key`
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        let values = self.values.entry(key.into()).or_default();
        if !values.contains(&value) {
            values.push(value);
        }
    }

    pub fn add_all<I, S>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = key.into();
        for value in values {
            self.add(key.clone(), value);
        }
    }

    /// Replace every value stored under `key`
    pub fn replace<I, S>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = key.into();
        self.values.remove(&key);
        self.add_all(key, values);
    }

    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.values.get(key).map(|v| v.as_slice())
    }

    pub fn first(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(|v| v.first())
            .map(|s| s.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Merge every value of `other` into this metadata
    pub fn merge(&mut self, other: &Metadata) {
        for (key, values) in other.iter() {
            self.add_all(key, values.iter().cloned());
        }
    }

    /// Remove the given values; keys left without values disappear
    pub fn remove_values(&mut self, other: &Metadata) {
        for (key, values) in other.iter() {
            if let Some(stored) = self.values.get_mut(key) {
                stored.retain(|v| !values.contains(v));
                if stored.is_empty() {
                    self.values.remove(key);
                }
            }
        }
    }

    pub fn remove_key(&mut self, key: &str) -> Option<Vec<String>> {
        self.values.remove(key)
    }

    /// Copy restricted to `fields`
    pub fn reduce<S: AsRef<str>>(&self, fields: &[S]) -> Metadata {
        let mut reduced = Metadata::new();
        for field in fields {
            if let Some(values) = self.values.get(field.as_ref()) {
                reduced
                    .values
                    .insert(field.as_ref().to_string(), values.clone());
            }
        }
        reduced
    }
}

impl<K, V> FromIterator<(K, V)> for Metadata
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut metadata = Metadata::new();
        for (k, v) in iter {
            metadata.add(k, v);
        }
        metadata
    }
}

/// Schema entry: a named metadata element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Element {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Element {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
        }
    }
}

/// A product type definition
///
/// Callers may hand a partial type (only `id` or only `name` set); backends
/// resolve it to the full definition through the schema bridge.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductType {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub repository_path: String,
    #[serde(default)]
    pub versioner: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl ProductType {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Partial type identified only by name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A file belonging to a product
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reference {
    pub original_uri: String,
    /// Empty until the file has been materialized in the archive
    pub datastore_uri: String,
    pub file_size: u64,
    pub mime_type: Option<String>,
}

impl Reference {
    pub fn new(
        original_uri: impl Into<String>,
        datastore_uri: impl Into<String>,
        file_size: u64,
    ) -> Self {
        Self {
            original_uri: original_uri.into(),
            datastore_uri: datastore_uri.into(),
            file_size,
            mime_type: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn is_materialized(&self) -> bool {
        !self.datastore_uri.is_empty()
    }
}

/// A registered data product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Assigned by the backend on `add_product`, immutable afterwards
    pub id: Option<String>,
    pub name: String,
    pub product_type: ProductType,
    pub structure: ProductStructure,
    pub transfer_status: TransferStatus,
    pub references: Vec<Reference>,
    /// Set by the backend when the product is first stored
    pub received_time: Option<DateTime<Utc>>,
}

impl Product {
    pub fn new(name: impl Into<String>, product_type: ProductType) -> Self {
        Self {
            id: None,
            name: name.into(),
            product_type,
            structure: ProductStructure::default(),
            transfer_status: TransferStatus::default(),
            references: Vec::new(),
            received_time: None,
        }
    }

    pub fn with_structure(mut self, structure: ProductStructure) -> Self {
        self.structure = structure;
        self
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.references.push(reference);
        self
    }

    /// The backend-assigned id, or a `NotFound` error for unregistered products
    pub fn require_id(&self) -> Result<&str> {
        self.id.as_deref().ok_or_else(|| {
            CatalogError::not_found("Product id", format!("product '{}' is not registered", self.name))
        })
    }

    /// At least one reference, and all of them materialized
    pub fn references_materialized(&self) -> bool {
        !self.references.is_empty() && self.references.iter().all(Reference::is_materialized)
    }
}
