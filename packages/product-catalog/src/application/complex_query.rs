//! Complex query execution
//!
//! Runs one [`ComplexQuery`] over every selected product type, then applies
//! the time-window filter, the sort key and the metadata projection, in that
//! order. Filter and sort read the full metadata of each hit, so their keys
//! need not be part of the projection.

use regex::{Captures, Regex};
use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::domain::models::{Metadata, Product, ProductType};
use crate::domain::ports::Catalog;
use crate::domain::query::{ComplexQuery, QueryFilter};
use crate::error::{CatalogError, ErrorKind, Result};
use crate::query::filter::{filter_events, parse_time_millis, TimeEvent};
use crate::query::parser::parse_query;
use crate::schema::SchemaBridge;

const PLACEHOLDER_PATTERN: &str = r"\$\{([^}]+)\}|\$([A-Za-z_][A-Za-z0-9_.]*)";

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

fn placeholder_regex() -> Result<&'static Regex> {
    if let Some(re) = PLACEHOLDER.get() {
        return Ok(re);
    }
    let re = Regex::new(PLACEHOLDER_PATTERN).map_err(|e| {
        CatalogError::internal("placeholder pattern failed to compile").with_source(e)
    })?;
    Ok(PLACEHOLDER.get_or_init(|| re))
}

/// One hit of a complex query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub product: Product,
    /// Projected metadata
    pub metadata: Metadata,
    pub output_format: Option<String>,
}

impl QueryResult {
    /// Expand `$Key` / `${Key}` in the output format with the key's values,
    /// comma-joined. Unknown keys expand to nothing.
    pub fn to_formatted_string(&self) -> Result<String> {
        let Some(format) = &self.output_format else {
            return Ok(self.product.name.clone());
        };
        let re = placeholder_regex()?;
        Ok(re
            .replace_all(format, |caps: &Captures<'_>| {
                let key = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                self.metadata
                    .get(key)
                    .map(|values| values.join(","))
                    .unwrap_or_default()
            })
            .into_owned())
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_formatted_string() {
            Ok(s) => f.write_str(&s),
            Err(_) => f.write_str(&self.product.name),
        }
    }
}

/// Hit carrying full metadata until projection
struct Hit {
    product: Product,
    metadata: Metadata,
}

pub struct ComplexQueryExecutor {
    catalog: Arc<dyn Catalog>,
    bridge: SchemaBridge,
}

impl ComplexQueryExecutor {
    pub fn new(catalog: Arc<dyn Catalog>, bridge: SchemaBridge) -> Self {
        Self { catalog, bridge }
    }

    /// Parse DSL text and execute it
    pub fn execute_dsl(&self, text: &str) -> Result<Vec<QueryResult>> {
        self.execute(&parse_query(text)?)
    }

    pub fn execute(&self, complex: &ComplexQuery) -> Result<Vec<QueryResult>> {
        let mut hits = Vec::new();
        for product_type in self.product_types(complex)? {
            // a type that does not declare the queried elements cannot match
            if let Err(err) = self.bridge.check_query(&complex.query, &product_type) {
                if err.kind == ErrorKind::Schema {
                    tracing::debug!(
                        product_type = %product_type.name,
                        reason = %err.message,
                        "skipping product type"
                    );
                    continue;
                }
                return Err(err);
            }
            for product_id in self.catalog.query(&complex.query, &product_type)? {
                let product = self.catalog.product_by_id(&product_id)?;
                let metadata = self.catalog.metadata(&product)?;
                hits.push(Hit { product, metadata });
            }
        }
        tracing::info!(results = hits.len(), "complex query returned results");

        if let Some(filter) = &complex.filter {
            hits = apply_filter(hits, filter)?;
            tracing::info!(results = hits.len(), "filter returned results");
        }

        if let Some(sort_by) = &complex.sort_by {
            sort_hits(&mut hits, sort_by);
        }

        Ok(hits
            .into_iter()
            .map(|hit| QueryResult {
                metadata: match &complex.reduced_metadata {
                    Some(fields) => hit.metadata.reduce(fields),
                    None => hit.metadata,
                },
                product: hit.product,
                output_format: complex.output_format.clone(),
            })
            .collect())
    }

    fn product_types(&self, complex: &ComplexQuery) -> Result<Vec<ProductType>> {
        match &complex.reduced_product_types {
            None => self.bridge.product_types(),
            Some(names) => names
                .iter()
                .map(|name| self.bridge.resolve_type(&ProductType::named(name.as_str())))
                .collect(),
        }
    }
}

fn apply_filter(hits: Vec<Hit>, filter: &QueryFilter) -> Result<Vec<Hit>> {
    let events = hits
        .into_iter()
        .map(|hit| {
            let start = time_of(&hit, &filter.start_key)?;
            let end = time_of(&hit, &filter.end_key)?;
            let priority = match hit.metadata.first(&filter.priority_key) {
                Some(value) => value.trim().parse::<f64>().map_err(|_| {
                    CatalogError::query_formulation(format!(
                        "priority '{}' of '{}' is not a number",
                        value, filter.priority_key
                    ))
                })?,
                None => 0.0,
            };
            Ok(TimeEvent::new(start, end, priority, hit))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(filter_events(events, &filter.algorithm)
        .into_iter()
        .map(|event| event.item)
        .collect())
}

fn time_of(hit: &Hit, key: &str) -> Result<i64> {
    let value = hit.metadata.first(key).ok_or_else(|| {
        CatalogError::query_formulation(format!(
            "product '{}' has no value for filter key '{}'",
            hit.product.name, key
        ))
    })?;
    parse_time_millis(value)
}

/// Ascending by the first value of `key`; hits without it go last
fn sort_hits(hits: &mut [Hit], key: &str) {
    hits.sort_by(|a, b| match (a.metadata.first(key), b.metadata.first(key)) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Reference;

    fn result(format: Option<&str>) -> QueryResult {
        let metadata: Metadata = [("Filename", "a.dat"), ("Keyword", "x"), ("Keyword", "y")]
            .into_iter()
            .collect();
        QueryResult {
            product: Product::new("a", ProductType::named("T"))
                .with_reference(Reference::new("file:///a", "", 1)),
            metadata,
            output_format: format.map(str::to_string),
        }
    }

    #[test]
    fn test_format_substitution() {
        let r = result(Some("$Filename: ${Keyword} [$Missing]"));
        assert_eq!(r.to_formatted_string().unwrap(), "a.dat: x,y []");
        assert_eq!(r.to_string(), "a.dat: x,y []");
    }

    #[test]
    fn test_format_absent_uses_name() {
        assert_eq!(result(None).to_formatted_string().unwrap(), "a");
    }

    #[test]
    fn test_sort_missing_last() {
        let hit = |name: &str, key: Option<&str>| Hit {
            product: Product::new(name, ProductType::named("T")),
            metadata: key.map(|k| [("K", k)].into_iter().collect()).unwrap_or_default(),
        };
        let mut hits = vec![hit("n", None), hit("b", Some("2")), hit("a", Some("1"))];
        sort_hits(&mut hits, "K");
        let names: Vec<&str> = hits.iter().map(|h| h.product.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "n"]);
    }
}
