//! Criteria → SQL
//!
//! Every criterion becomes a statement selecting a set of `product_id`s:
//!
//! | criteria     | SQL                                                       |
//! |--------------|-----------------------------------------------------------|
//! | Term         | `SELECT product_id FROM .. WHERE <col> = ?`               |
//! | Range        | `.. WHERE <col> >= ? AND <col> < ?` (per-bound operators) |
//! | AND          | `SELECT product_id FROM (a) INTERSECT SELECT ..FROM (b)`  |
//! | OR           | `.. UNION ..`                                             |
//! | NOT          | products of the type `NOT IN` the member                  |
//!
//! Values are always bound parameters.

use rusqlite::types::Value;
use std::collections::{BTreeSet, HashMap};

use crate::config::{LayoutKind, SqliteConfig};
use crate::domain::models::ProductType;
use crate::domain::query::{BooleanOperator, Query, QueryCriteria};
use crate::error::{CatalogError, Result};
use crate::infrastructure::sqlite::naming::{column_name_for, TypeTables};
use crate::schema::SchemaBridge;

/// Physical layout of per-type metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// `<type>_metadata(product_id, element_id, metadata_value)`
    Narrow,
    /// `<type>_metadata(product_id, "<element>"...)` plus
    /// `<type>_<element>_values(product_id, metadata_value)` for vector elements
    Wide { vector_elements: BTreeSet<String> },
}

impl Layout {
    pub fn wide<I, S>(vector_elements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Layout::Wide {
            vector_elements: vector_elements.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &SqliteConfig) -> Self {
        match config.layout {
            LayoutKind::Narrow => Layout::Narrow,
            LayoutKind::Wide => Layout::wide(config.vector_elements.iter().cloned()),
        }
    }

    pub fn is_vector(&self, element: &str) -> bool {
        match self {
            Layout::Narrow => false,
            Layout::Wide { vector_elements } => vector_elements.contains(element),
        }
    }
}

/// Parameterized SQL
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    fn new(sql: String, params: Vec<Value>) -> Self {
        Self { sql, params }
    }
}

fn text(value: &str) -> Value {
    Value::Text(value.to_string())
}

/// Translates criteria for one resolved product type
pub struct SqlTranslator<'a> {
    layout: &'a Layout,
    product_type: &'a ProductType,
    tables: TypeTables,
    /// element name -> element id
    element_ids: HashMap<String, String>,
}

impl<'a> SqlTranslator<'a> {
    pub fn new(
        layout: &'a Layout,
        bridge: &SchemaBridge,
        product_type: &'a ProductType,
        type_table_map: &HashMap<String, String>,
    ) -> Result<Self> {
        let element_ids = bridge
            .elements_for(product_type)?
            .into_iter()
            .map(|e| (e.name, e.id))
            .collect();
        Ok(Self {
            layout,
            product_type,
            tables: TypeTables::for_type(product_type, type_table_map)?,
            element_ids,
        })
    }

    /// Id set selected by the whole query; every product of the type when empty
    pub fn query_ids(&self, query: &Query) -> Result<Statement> {
        match query.as_criterion() {
            Some(criterion) => self.translate(&criterion),
            None => Ok(self.all_ids()),
        }
    }

    fn all_ids(&self) -> Statement {
        Statement::new(
            "SELECT product_id FROM products WHERE product_type_id = ?".to_string(),
            vec![text(&self.product_type.id)],
        )
    }

    pub fn translate(&self, criteria: &QueryCriteria) -> Result<Statement> {
        match criteria {
            QueryCriteria::Term(t) => {
                self.leaf(t.element(), |col| (format!("{} = ?", col), vec![text(t.value())]))
            }
            QueryCriteria::Range(r) => self.leaf(r.element(), |col| {
                let mut clauses = Vec::new();
                let mut params = Vec::new();
                if let Some(start) = r.start() {
                    let op = if r.inclusive() { ">=" } else { ">" };
                    clauses.push(format!("{} {} ?", col, op));
                    params.push(text(start));
                }
                if let Some(end) = r.end() {
                    let op = if r.inclusive() { "<=" } else { "<" };
                    clauses.push(format!("{} {} ?", col, op));
                    params.push(text(end));
                }
                (clauses.join(" AND "), params)
            }),
            QueryCriteria::Boolean(b) => match b.operator() {
                BooleanOperator::And => self.compound(b.terms(), "INTERSECT"),
                BooleanOperator::Or => self.compound(b.terms(), "UNION"),
                BooleanOperator::Not => {
                    let member = self.translate(&b.terms()[0])?;
                    let mut params = vec![text(&self.product_type.id)];
                    params.extend(member.params);
                    Ok(Statement::new(
                        format!(
                            "SELECT product_id FROM products WHERE product_type_id = ? \
                             AND product_id NOT IN ({})",
                            member.sql
                        ),
                        params,
                    ))
                }
            },
        }
    }

    fn compound(&self, terms: &[QueryCriteria], set_op: &str) -> Result<Statement> {
        let mut parts = Vec::with_capacity(terms.len());
        let mut params = Vec::new();
        for term in terms {
            let stmt = self.translate(term)?;
            parts.push(format!("SELECT product_id FROM ({})", stmt.sql));
            params.extend(stmt.params);
        }
        Ok(Statement::new(parts.join(&format!(" {} ", set_op)), params))
    }

    /// `predicate` renders the condition for a column expression
    fn leaf<F>(&self, element: &str, predicate: F) -> Result<Statement>
    where
        F: FnOnce(&str) -> (String, Vec<Value>),
    {
        let element_id = self.element_ids.get(element).ok_or_else(|| {
            CatalogError::schema(format!(
                "element '{}' is not declared for product type '{}'",
                element, self.product_type.name
            ))
        })?;

        match self.layout {
            Layout::Narrow => {
                let (condition, values) = predicate("metadata_value");
                let mut params = vec![text(element_id)];
                params.extend(values);
                Ok(Statement::new(
                    format!(
                        "SELECT product_id FROM {} WHERE element_id = ? AND {}",
                        self.tables.metadata, condition
                    ),
                    params,
                ))
            }
            Layout::Wide { .. } if self.layout.is_vector(element) => {
                let (condition, values) = predicate("metadata_value");
                Ok(Statement::new(
                    format!(
                        "SELECT product_id FROM {} WHERE {}",
                        self.tables.vector(element)?,
                        condition
                    ),
                    values,
                ))
            }
            Layout::Wide { .. } => {
                let column = column_name_for(element)?;
                let (condition, values) = predicate(&column);
                Ok(Statement::new(
                    format!(
                        "SELECT product_id FROM {} WHERE {}",
                        self.tables.metadata, condition
                    ),
                    values,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Element;
    use crate::schema::{InMemoryRepository, InMemoryValidationLayer};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn fixture() -> (SchemaBridge, ProductType) {
        let ty = ProductType::new("urn:t", "T");
        let validation = InMemoryValidationLayer::new()
            .with_element(Element::new("urn:x", "x"))
            .with_element(Element::new("urn:k", "k"))
            .declare("urn:t", &["x", "k"]);
        let bridge = SchemaBridge::new(
            Arc::new(validation),
            Arc::new(InMemoryRepository::new().with_type(ty.clone())),
        );
        (bridge, ty)
    }

    #[test]
    fn test_narrow_term() {
        let (bridge, ty) = fixture();
        let layout = Layout::Narrow;
        let t = SqlTranslator::new(&layout, &bridge, &ty, &HashMap::new()).unwrap();
        let stmt = t.translate(&QueryCriteria::term("x", "1")).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT product_id FROM \"T_metadata\" WHERE element_id = ? AND metadata_value = ?"
        );
        assert_eq!(stmt.params, vec![text("urn:x"), text("1")]);
    }

    #[test]
    fn test_wide_range_and_vector() {
        let (bridge, ty) = fixture();
        let layout = Layout::wide(["k"]);
        let t = SqlTranslator::new(&layout, &bridge, &ty, &HashMap::new()).unwrap();

        let range = QueryCriteria::range("x", Some("a".into()), Some("m".into()), false).unwrap();
        let stmt = t.translate(&range).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT product_id FROM \"T_metadata\" WHERE \"x\" > ? AND \"x\" < ?"
        );
        assert_eq!(stmt.params, vec![text("a"), text("m")]);

        let stmt = t.translate(&QueryCriteria::term("k", "v")).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT product_id FROM \"T_k_values\" WHERE metadata_value = ?"
        );
    }

    #[test]
    fn test_boolean_set_algebra() {
        let (bridge, ty) = fixture();
        let layout = Layout::wide(Vec::<String>::new());
        let t = SqlTranslator::new(&layout, &bridge, &ty, &HashMap::new()).unwrap();

        let c = QueryCriteria::and(vec![
            QueryCriteria::term("x", "1"),
            QueryCriteria::not(QueryCriteria::term("k", "2")),
        ])
        .unwrap();
        let stmt = t.translate(&c).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT product_id FROM (SELECT product_id FROM \"T_metadata\" WHERE \"x\" = ?) \
             INTERSECT SELECT product_id FROM (SELECT product_id FROM products \
             WHERE product_type_id = ? AND product_id NOT IN \
             (SELECT product_id FROM \"T_metadata\" WHERE \"k\" = ?))"
        );
        assert_eq!(stmt.params, vec![text("1"), text("urn:t"), text("2")]);
    }

    #[test]
    fn test_values_never_reach_sql_text() {
        let (bridge, ty) = fixture();
        let layout = Layout::Narrow;
        let t = SqlTranslator::new(&layout, &bridge, &ty, &HashMap::new()).unwrap();
        let stmt = t
            .translate(&QueryCriteria::term("x", "'; DROP TABLE products; --"))
            .unwrap();
        assert!(!stmt.sql.contains("DROP"));
    }

    #[test]
    fn test_undeclared_element() {
        let (bridge, ty) = fixture();
        let layout = Layout::Narrow;
        let t = SqlTranslator::new(&layout, &bridge, &ty, &HashMap::new()).unwrap();
        let err = t.translate(&QueryCriteria::term("nope", "1")).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Schema);
    }

    #[test]
    fn test_empty_query_selects_type() {
        let (bridge, ty) = fixture();
        let layout = Layout::Narrow;
        let t = SqlTranslator::new(&layout, &bridge, &ty, &HashMap::new()).unwrap();
        let stmt = t.query_ids(&Query::new()).unwrap();
        assert_eq!(stmt.sql, "SELECT product_id FROM products WHERE product_type_id = ?");
    }
}
