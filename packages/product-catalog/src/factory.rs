//! Backend registry
//!
//! Maps the configured `backend` name to a constructor. The default registry
//! knows `sqlite`, `index` and `remote` (the first two behind their cargo
//! features).

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::{CatalogConfig, ConfigError, ConfigResult};
use crate::domain::ports::{Catalog, CatalogService};
use crate::infrastructure::remote::RemoteCatalog;
use crate::schema::SchemaBridge;

/// Collaborators handed to every backend constructor
#[derive(Clone)]
pub struct CatalogContext {
    pub bridge: SchemaBridge,
    /// Required by the `remote` backend
    pub service: Option<Arc<dyn CatalogService>>,
}

impl CatalogContext {
    pub fn new(bridge: SchemaBridge) -> Self {
        Self {
            bridge,
            service: None,
        }
    }

    pub fn with_service(mut self, service: Arc<dyn CatalogService>) -> Self {
        self.service = Some(service);
        self
    }
}

pub type BackendConstructor = fn(&CatalogConfig, &CatalogContext) -> ConfigResult<Arc<dyn Catalog>>;

pub struct CatalogFactory {
    constructors: BTreeMap<String, BackendConstructor>,
}

impl CatalogFactory {
    /// Registry without any backend
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, constructor: BackendConstructor) -> &mut Self {
        self.constructors.insert(name.into(), constructor);
        self
    }

    /// Registered backend names, sorted
    pub fn backends(&self) -> Vec<String> {
        self.constructors.keys().cloned().collect()
    }

    /// Validate `config` and build its backend
    pub fn build(&self, config: &CatalogConfig, context: &CatalogContext) -> ConfigResult<Arc<dyn Catalog>> {
        config.validate()?;
        let constructor = self
            .constructors
            .get(&config.backend)
            .ok_or_else(|| ConfigError::UnknownBackend {
                name: config.backend.clone(),
                known: self.backends(),
            })?;
        let catalog = constructor(config, context)?;
        tracing::info!(
            backend = %config.backend,
            page_size = config.page_size,
            "catalog backend created"
        );
        Ok(catalog)
    }
}

impl Default for CatalogFactory {
    fn default() -> Self {
        let mut factory = Self::empty();
        #[cfg(feature = "sqlite")]
        factory.register("sqlite", build_sqlite);
        #[cfg(feature = "index")]
        factory.register("index", build_index);
        factory.register("remote", build_remote);
        factory
    }
}

#[cfg(feature = "sqlite")]
fn build_sqlite(config: &CatalogConfig, context: &CatalogContext) -> ConfigResult<Arc<dyn Catalog>> {
    use crate::infrastructure::sqlite::SqliteCatalog;
    Ok(Arc::new(SqliteCatalog::from_config(config, context.bridge.clone())?))
}

#[cfg(feature = "index")]
fn build_index(config: &CatalogConfig, context: &CatalogContext) -> ConfigResult<Arc<dyn Catalog>> {
    use crate::infrastructure::index::TantivyCatalog;
    Ok(Arc::new(TantivyCatalog::from_config(config, context.bridge.clone())?))
}

fn build_remote(config: &CatalogConfig, context: &CatalogContext) -> ConfigResult<Arc<dyn Catalog>> {
    let service = context
        .service
        .clone()
        .ok_or_else(|| ConfigError::MissingCollaborator {
            backend: "remote".to_string(),
            requirement: "a CatalogService".to_string(),
        })?;
    Ok(Arc::new(RemoteCatalog::new(
        service,
        context.bridge.clone(),
        config.page_size,
    )))
}
