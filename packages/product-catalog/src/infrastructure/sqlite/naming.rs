//! Table and column naming
//!
//! Identifiers come from product type and element names, so they are
//! validated and double-quoted before they reach SQL text. Nothing here
//! mutates a `ProductType`.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::domain::models::ProductType;
use crate::error::{CatalogError, Result};

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_.\-]*$";

static IDENTIFIER: OnceLock<Regex> = OnceLock::new();

fn identifier_regex() -> Result<&'static Regex> {
    if let Some(re) = IDENTIFIER.get() {
        return Ok(re);
    }
    let re = Regex::new(IDENTIFIER_PATTERN).map_err(|e| {
        CatalogError::internal("identifier pattern failed to compile").with_source(e)
    })?;
    Ok(IDENTIFIER.get_or_init(|| re))
}

/// Reject names that cannot be used as SQL identifiers
pub fn validate_identifier(name: &str) -> Result<&str> {
    if identifier_regex()?.is_match(name) {
        Ok(name)
    } else {
        Err(CatalogError::schema(format!(
            "'{}' cannot be used as a table or column name",
            name
        )))
    }
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name)
}

/// Base name of every table belonging to `product_type`
///
/// `type_table_map` redirects a type name to another base name, so several
/// types can share one set of tables. Unmapped types use their own name.
pub fn table_name_for(
    product_type: &ProductType,
    type_table_map: &HashMap<String, String>,
) -> Result<String> {
    let base = type_table_map
        .get(&product_type.name)
        .unwrap_or(&product_type.name);
    validate_identifier(base).map(str::to_string)
}

/// Per-type table names, quoted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeTables {
    base: String,
    pub metadata: String,
    pub reference: String,
}

impl TypeTables {
    pub fn for_type(
        product_type: &ProductType,
        type_table_map: &HashMap<String, String>,
    ) -> Result<Self> {
        let base = table_name_for(product_type, type_table_map)?;
        Ok(Self {
            metadata: quote(&format!("{}_metadata", base)),
            reference: quote(&format!("{}_reference", base)),
            base,
        })
    }

    /// Side table of a multi-valued element in the wide layout
    pub fn vector(&self, element: &str) -> Result<String> {
        let element = validate_identifier(element)?;
        Ok(quote(&format!("{}_{}_values", self.base, element)))
    }

    /// Name for an index on one of this type's tables
    pub fn index_name(&self, suffix: &str) -> String {
        quote(&format!("idx_{}_{}", self.base, suffix))
    }
}

/// Quoted column of an element in the wide layout
pub fn column_name_for(element: &str) -> Result<String> {
    validate_identifier(element).map(quote)
}
