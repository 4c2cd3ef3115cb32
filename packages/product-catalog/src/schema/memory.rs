//! In-memory validation layer and type registry
//!
//! Both can be built by hand or loaded from a YAML schema document:
//!
//! ```yaml
//! version: 1
//! elements:
//!   - { id: "urn:archive:Filename", name: Filename }
//!   - { id: "urn:archive:StartDateTime", name: StartDateTime }
//! product_types:
//!   - id: "urn:archive:GenericFile"
//!     name: GenericFile
//!     repository_path: "file:///archive/generic"
//!     versioner: basic
//!     elements: [Filename, StartDateTime]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use crate::config::error::{ConfigError, ConfigResult};
use crate::domain::models::{Element, Metadata, ProductType};
use crate::domain::ports::{RepositoryManager, ValidationLayer};
use crate::error::{CatalogError, Result};
use crate::schema::bridge::SchemaBridge;

/// Elements plus per-type declarations (type id -> element names)
#[derive(Debug, Clone, Default)]
pub struct InMemoryValidationLayer {
    elements: Vec<Element>,
    declarations: HashMap<String, Vec<String>>,
}

impl InMemoryValidationLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_element(mut self, element: Element) -> Self {
        self.elements.retain(|e| e.id != element.id);
        self.elements.push(element);
        self
    }

    /// Declare elements (by name) for a product type id
    pub fn declare(mut self, type_id: &str, element_names: &[&str]) -> Self {
        let names = self.declarations.entry(type_id.to_string()).or_default();
        for name in element_names {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        self
    }
}

impl ValidationLayer for InMemoryValidationLayer {
    fn elements(&self, product_type: &ProductType) -> Result<Vec<Element>> {
        let Some(names) = self.declarations.get(&product_type.id) else {
            return Ok(Vec::new());
        };
        Ok(names
            .iter()
            .filter_map(|name| self.elements.iter().find(|e| &e.name == name).cloned())
            .collect())
    }

    fn element_by_name(&self, name: &str) -> Result<Element> {
        self.elements
            .iter()
            .find(|e| e.name == name)
            .cloned()
            .ok_or_else(|| CatalogError::not_found("Element", name))
    }

    fn element_by_id(&self, id: &str) -> Result<Element> {
        self.elements
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| CatalogError::not_found("Element", id))
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    types: Vec<ProductType>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, product_type: ProductType) -> Self {
        self.types.retain(|t| t.id != product_type.id);
        self.types.push(product_type);
        self
    }
}

impl RepositoryManager for InMemoryRepository {
    fn product_type_by_id(&self, id: &str) -> Result<ProductType> {
        self.types
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| CatalogError::not_found("Product type", id))
    }

    fn product_type_by_name(&self, name: &str) -> Result<ProductType> {
        let mut matches = self.types.iter().filter(|t| t.name == name);
        match (matches.next(), matches.next()) {
            (Some(found), None) => Ok(found.clone()),
            (Some(_), Some(_)) => Err(CatalogError::uniqueness(format!(
                "more than one product type named '{}'",
                name
            ))),
            (None, _) => Err(CatalogError::not_found("Product type", name)),
        }
    }

    fn product_types(&self) -> Result<Vec<ProductType>> {
        Ok(self.types.clone())
    }
}

/// One product type entry of a schema document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProductTypeEntry {
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
    /// Declared element names
    #[serde(default)]
    pub elements: Vec<String>,
}

/// YAML schema document (v1)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub elements: Vec<Element>,
    #[serde(default)]
    pub product_types: Vec<ProductTypeEntry>,
}

impl SchemaDocument {
    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn from_yaml_str(content: &str) -> ConfigResult<Self> {
        let doc: SchemaDocument = serde_yaml::from_str(content)?;
        match doc.version {
            0 => return Err(ConfigError::MissingVersion),
            1 => {}
            found => {
                return Err(ConfigError::UnsupportedVersion {
                    found,
                    supported: vec![1],
                })
            }
        }
        doc.validate()?;
        Ok(doc)
    }

    fn validate(&self) -> ConfigResult<()> {
        let mut ids = HashSet::new();
        let mut names = HashSet::new();
        for element in &self.elements {
            if !ids.insert(element.id.as_str()) || !names.insert(element.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate element '{}' ({})",
                    element.name, element.id
                )));
            }
        }

        let mut type_ids = HashSet::new();
        for entry in &self.product_types {
            if !type_ids.insert(entry.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate product type id '{}'",
                    entry.id
                )));
            }
            if let Some(missing) = entry.elements.iter().find(|n| !names.contains(n.as_str())) {
                return Err(ConfigError::Validation(format!(
                    "product type '{}' declares unknown element '{}'",
                    entry.name, missing
                )));
            }
        }
        Ok(())
    }

    pub fn into_layers(self) -> (InMemoryValidationLayer, InMemoryRepository) {
        let mut validation = InMemoryValidationLayer::new();
        for element in self.elements {
            validation = validation.with_element(element);
        }

        let mut repository = InMemoryRepository::new();
        for entry in self.product_types {
            let names: Vec<&str> = entry.elements.iter().map(String::as_str).collect();
            validation = validation.declare(&entry.id, &names);
            repository = repository.with_type(ProductType {
                id: entry.id,
                name: entry.name,
                description: entry.description,
                repository_path: entry.repository_path,
                versioner: entry.versioner,
                metadata: entry.metadata,
            });
        }
        (validation, repository)
    }

    pub fn into_bridge(self) -> SchemaBridge {
        let (validation, repository) = self.into_layers();
        SchemaBridge::new(Arc::new(validation), Arc::new(repository))
    }
}
