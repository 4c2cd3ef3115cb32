//! Metadata/schema bridge
//!
//! Backends never talk to the validation layer or the type registry
//! directly; they go through [`SchemaBridge`], which resolves partial
//! product types, checks element names against a type's declaration and
//! trims metadata down to declared elements.

use std::sync::Arc;

use crate::domain::models::{Element, Metadata, ProductType};
use crate::domain::ports::{RepositoryManager, ValidationLayer};
use crate::domain::query::Query;
use crate::error::{CatalogError, ErrorKind, Result};

#[derive(Clone)]
pub struct SchemaBridge {
    validation: Arc<dyn ValidationLayer>,
    repository: Arc<dyn RepositoryManager>,
}

impl std::fmt::Debug for SchemaBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaBridge").finish_non_exhaustive()
    }
}

impl SchemaBridge {
    pub fn new(validation: Arc<dyn ValidationLayer>, repository: Arc<dyn RepositoryManager>) -> Self {
        Self {
            validation,
            repository,
        }
    }

    pub fn repository(&self) -> &Arc<dyn RepositoryManager> {
        &self.repository
    }

    pub fn validation(&self) -> &Arc<dyn ValidationLayer> {
        &self.validation
    }

    /// Full definition of a possibly partial type: by id first, then by name
    ///
    /// # Errors
    /// `Schema` when neither the id nor the name resolves.
    pub fn resolve_type(&self, partial: &ProductType) -> Result<ProductType> {
        if !partial.id.is_empty() {
            match self.repository.product_type_by_id(&partial.id) {
                Ok(found) => return Ok(found),
                Err(e) if e.kind == ErrorKind::NotFound => {
                    tracing::warn!(
                        type_id = %partial.id,
                        type_name = %partial.name,
                        "product type id not registered, trying name"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        if !partial.name.is_empty() {
            match self.repository.product_type_by_name(&partial.name) {
                Ok(found) => return Ok(found),
                Err(e) if e.kind != ErrorKind::NotFound => return Err(e),
                Err(_) => {}
            }
        }
        Err(CatalogError::schema(format!(
            "cannot resolve product type (id '{}', name '{}')",
            partial.id, partial.name
        )))
    }

    pub fn type_by_id(&self, id: &str) -> Result<ProductType> {
        self.resolve_type(&ProductType::new(id, ""))
    }

    pub fn product_types(&self) -> Result<Vec<ProductType>> {
        self.repository.product_types()
    }

    pub fn elements_for(&self, product_type: &ProductType) -> Result<Vec<Element>> {
        self.validation.elements(product_type)
    }

    /// # Errors
    /// `Schema` for unknown element names.
    pub fn element_by_name(&self, name: &str) -> Result<Element> {
        self.validation.element_by_name(name).map_err(|e| as_schema_error(e, name))
    }

    pub fn element_by_id(&self, id: &str) -> Result<Element> {
        self.validation.element_by_id(id).map_err(|e| as_schema_error(e, id))
    }

    /// The element `name` as declared for `product_type`
    ///
    /// # Errors
    /// `Schema` when the type does not declare it.
    pub fn element_for_type(&self, product_type: &ProductType, name: &str) -> Result<Element> {
        self.elements_for(product_type)?
            .into_iter()
            .find(|e| e.name == name)
            .ok_or_else(|| {
                CatalogError::schema(format!(
                    "element '{}' is not declared for product type '{}'",
                    name, product_type.name
                ))
            })
    }

    /// Check every element a query references before anything is translated
    pub fn check_query(&self, query: &Query, product_type: &ProductType) -> Result<()> {
        let declared = self.elements_for(product_type)?;
        for criterion in &query.criteria {
            for element in criterion.elements() {
                if !declared.iter().any(|e| e.name == element) {
                    return Err(CatalogError::schema(format!(
                        "element '{}' is not declared for product type '{}'",
                        element, product_type.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Only the metadata keys declared for the type
    pub fn declared_metadata(&self, product_type: &ProductType, metadata: &Metadata) -> Result<Metadata> {
        let declared = self.elements_for(product_type)?;
        let names: Vec<&str> = declared.iter().map(|e| e.name.as_str()).collect();
        let skipped: Vec<&str> = metadata.keys().filter(|k| !names.contains(k)).collect();
        if !skipped.is_empty() {
            tracing::debug!(
                product_type = %product_type.name,
                ?skipped,
                "ignoring metadata keys not declared for type"
            );
        }
        Ok(metadata.reduce(&names))
    }
}

fn as_schema_error(err: CatalogError, key: &str) -> CatalogError {
    if err.kind == ErrorKind::NotFound {
        CatalogError::schema(format!("unknown element: {}", key)).with_source(err)
    } else {
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::memory::{InMemoryRepository, InMemoryValidationLayer};

    fn bridge() -> SchemaBridge {
        let ty = ProductType::new("urn:t:1", "T");
        let validation = InMemoryValidationLayer::new()
            .with_element(Element::new("urn:e:x", "x"))
            .with_element(Element::new("urn:e:y", "y"))
            .declare(&ty.id, &["x"]);
        let repository = InMemoryRepository::new().with_type(ty);
        SchemaBridge::new(Arc::new(validation), Arc::new(repository))
    }

    #[test]
    fn test_resolve_partial_types() {
        let bridge = bridge();
        assert_eq!(bridge.resolve_type(&ProductType::named("T")).unwrap().id, "urn:t:1");
        assert_eq!(
            bridge.resolve_type(&ProductType::new("urn:t:1", "")).unwrap().name,
            "T"
        );
        // stale id, valid name
        assert_eq!(
            bridge.resolve_type(&ProductType::new("urn:gone", "T")).unwrap().id,
            "urn:t:1"
        );
        let err = bridge.resolve_type(&ProductType::named("Nope")).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Schema);
    }

    #[test]
    fn test_element_lookups() {
        let bridge = bridge();
        let ty = bridge.resolve_type(&ProductType::named("T")).unwrap();
        assert_eq!(bridge.element_for_type(&ty, "x").unwrap().id, "urn:e:x");
        assert_eq!(bridge.element_for_type(&ty, "y").unwrap_err().kind, ErrorKind::Schema);
        assert_eq!(bridge.element_by_name("zzz").unwrap_err().kind, ErrorKind::Schema);
        assert_eq!(bridge.element_by_id("urn:e:y").unwrap().name, "y");
    }

    #[test]
    fn test_check_query_rejects_undeclared_elements() {
        let bridge = bridge();
        let ty = bridge.resolve_type(&ProductType::named("T")).unwrap();
        let ok = Query::with_criteria(vec![crate::domain::QueryCriteria::term("x", "1")]);
        let bad = Query::with_criteria(vec![crate::domain::QueryCriteria::term("y", "1")]);
        assert!(bridge.check_query(&ok, &ty).is_ok());
        assert_eq!(bridge.check_query(&bad, &ty).unwrap_err().kind, ErrorKind::Schema);
    }

    #[test]
    fn test_declared_metadata() {
        let bridge = bridge();
        let ty = bridge.resolve_type(&ProductType::named("T")).unwrap();
        let md: Metadata = [("x", "1"), ("y", "2")].into_iter().collect();
        let declared = bridge.declared_metadata(&ty, &md).unwrap();
        assert_eq!(declared.keys().collect::<Vec<_>>(), vec!["x"]);
    }
}
