//! Query criteria AST
//!
//! ```text
//! QueryCriteria
//!   ├─ Term    { element, value }
//!   ├─ Range   { element, start?, end?, inclusive }
//!   └─ Boolean { AND | OR | NOT, terms }
//! ```
//!
//! Element names are opaque here; each backend resolves them through the
//! schema bridge when it translates a query.

use std::fmt;

use crate::domain::models::Metadata;
use crate::error::{CatalogError, Result};

/// Boolean connective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BooleanOperator {
    And,
    Or,
    Not,
}

impl BooleanOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            BooleanOperator::And => "AND",
            BooleanOperator::Or => "OR",
            BooleanOperator::Not => "NOT",
        }
    }
}

impl fmt::Display for BooleanOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TermCriteria {
    element: String,
    value: String,
}

impl TermCriteria {
    pub fn element(&self) -> &str {
        &self.element
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Range over string values; at least one bound is present
///
/// `inclusive` applies to whichever bounds are present.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeCriteria {
    element: String,
    start: Option<String>,
    end: Option<String>,
    inclusive: bool,
}

impl RangeCriteria {
    pub fn element(&self) -> &str {
        &self.element
    }

    pub fn start(&self) -> Option<&str> {
        self.start.as_deref()
    }

    pub fn end(&self) -> Option<&str> {
        self.end.as_deref()
    }

    pub fn inclusive(&self) -> bool {
        self.inclusive
    }

    /// Does `value` fall inside the range
    pub fn contains(&self, value: &str) -> bool {
        let above = match &self.start {
            Some(start) if self.inclusive => value >= start.as_str(),
            Some(start) => value > start.as_str(),
            None => true,
        };
        let below = match &self.end {
            Some(end) if self.inclusive => value <= end.as_str(),
            Some(end) => value < end.as_str(),
            None => true,
        };
        above && below
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BooleanCriteria {
    operator: BooleanOperator,
    terms: Vec<QueryCriteria>,
}

impl BooleanCriteria {
    pub fn operator(&self) -> BooleanOperator {
        self.operator
    }

    pub fn terms(&self) -> &[QueryCriteria] {
        &self.terms
    }
}

/// A node of the criteria tree
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryCriteria {
    Term(TermCriteria),
    Range(RangeCriteria),
    Boolean(BooleanCriteria),
}

impl QueryCriteria {
    pub fn term(element: impl Into<String>, value: impl Into<String>) -> Self {
        QueryCriteria::Term(TermCriteria {
            element: element.into(),
            value: value.into(),
        })
    }

    /// Range with independently optional bounds
    ///
    /// # Errors
    /// `QueryFormulation` when both bounds are absent.
    pub fn range(
        element: impl Into<String>,
        start: Option<String>,
        end: Option<String>,
        inclusive: bool,
    ) -> Result<Self> {
        let element = element.into();
        if start.is_none() && end.is_none() {
            return Err(CatalogError::query_formulation(format!(
                "range on '{}' needs a start or an end value",
                element
            )));
        }
        Ok(QueryCriteria::Range(RangeCriteria {
            element,
            start,
            end,
            inclusive,
        }))
    }

    /// Boolean node
    ///
    /// # Errors
    /// `QueryFormulation` when NOT does not have exactly one term, or when
    /// AND/OR has none.
    pub fn boolean(operator: BooleanOperator, terms: Vec<QueryCriteria>) -> Result<Self> {
        match operator {
            BooleanOperator::Not if terms.len() != 1 => {
                return Err(CatalogError::query_formulation(format!(
                    "NOT requires exactly one term, got {}",
                    terms.len()
                )))
            }
            BooleanOperator::And | BooleanOperator::Or if terms.is_empty() => {
                return Err(CatalogError::query_formulation(format!(
                    "{} requires at least one term",
                    operator
                )))
            }
            _ => {}
        }
        Ok(QueryCriteria::Boolean(BooleanCriteria { operator, terms }))
    }

    pub fn and(terms: Vec<QueryCriteria>) -> Result<Self> {
        Self::boolean(BooleanOperator::And, terms)
    }

    pub fn or(terms: Vec<QueryCriteria>) -> Result<Self> {
        Self::boolean(BooleanOperator::Or, terms)
    }

    pub fn not(term: QueryCriteria) -> Self {
        QueryCriteria::Boolean(BooleanCriteria {
            operator: BooleanOperator::Not,
            terms: vec![term],
        })
    }

    /// Element of a leaf node; `None` for booleans
    pub fn element_name(&self) -> Option<&str> {
        match self {
            QueryCriteria::Term(t) => Some(t.element()),
            QueryCriteria::Range(r) => Some(r.element()),
            QueryCriteria::Boolean(_) => None,
        }
    }

    /// Every element referenced anywhere in the tree
    pub fn elements(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_elements(&mut out);
        out
    }

    fn collect_elements<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            QueryCriteria::Boolean(b) => b.terms.iter().for_each(|t| t.collect_elements(out)),
            leaf => {
                if let Some(element) = leaf.element_name() {
                    if !out.contains(&element) {
                        out.push(element);
                    }
                }
            }
        }
    }

    /// Evaluate against in-memory metadata
    ///
    /// Leaves match when any value of the element satisfies them. NOT is the
    /// complement of its member, so products lacking the element satisfy it.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        match self {
            QueryCriteria::Term(t) => metadata
                .get(&t.element)
                .is_some_and(|values| values.iter().any(|v| *v == t.value)),
            QueryCriteria::Range(r) => metadata
                .get(&r.element)
                .is_some_and(|values| values.iter().any(|v| r.contains(v))),
            QueryCriteria::Boolean(b) => match b.operator {
                BooleanOperator::And => b.terms.iter().all(|t| t.matches(metadata)),
                BooleanOperator::Or => b.terms.iter().any(|t| t.matches(metadata)),
                BooleanOperator::Not => !b.terms[0].matches(metadata),
            },
        }
    }

    /// Canonical form for logical comparison
    ///
    /// Flattens nested AND/AND and OR/OR, unwraps single-term AND/OR and
    /// splits two-sided ranges into an AND of one-sided ranges.
    pub fn normalized(&self) -> QueryCriteria {
        match self {
            QueryCriteria::Term(_) => self.clone(),
            QueryCriteria::Range(r) => match (&r.start, &r.end) {
                (Some(start), Some(end)) => QueryCriteria::Boolean(BooleanCriteria {
                    operator: BooleanOperator::And,
                    terms: vec![
                        QueryCriteria::Range(RangeCriteria {
                            element: r.element.clone(),
                            start: Some(start.clone()),
                            end: None,
                            inclusive: r.inclusive,
                        }),
                        QueryCriteria::Range(RangeCriteria {
                            element: r.element.clone(),
                            start: None,
                            end: Some(end.clone()),
                            inclusive: r.inclusive,
                        }),
                    ],
                }),
                _ => self.clone(),
            },
            QueryCriteria::Boolean(b) if b.operator == BooleanOperator::Not => {
                QueryCriteria::not(b.terms[0].normalized())
            }
            QueryCriteria::Boolean(b) => {
                let mut flat = Vec::with_capacity(b.terms.len());
                for term in &b.terms {
                    match term.normalized() {
                        QueryCriteria::Boolean(inner) if inner.operator == b.operator => {
                            flat.extend(inner.terms)
                        }
                        other => flat.push(other),
                    }
                }
                if flat.len() == 1 {
                    flat.remove(0)
                } else {
                    QueryCriteria::Boolean(BooleanCriteria {
                        operator: b.operator,
                        terms: flat,
                    })
                }
            }
        }
    }
}

/// Ordered list of top-level criteria, implicitly AND-ed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub criteria: Vec<QueryCriteria>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_criteria(criteria: Vec<QueryCriteria>) -> Self {
        Self { criteria }
    }

    pub fn add_criterion(&mut self, criterion: QueryCriteria) {
        self.criteria.push(criterion);
    }

    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.criteria.iter().all(|c| c.matches(metadata))
    }

    /// The whole query as one criterion; `None` when unrestricted
    pub fn as_criterion(&self) -> Option<QueryCriteria> {
        match self.criteria.len() {
            0 => None,
            1 => Some(self.criteria[0].clone()),
            _ => Some(QueryCriteria::Boolean(BooleanCriteria {
                operator: BooleanOperator::And,
                terms: self.criteria.clone(),
            })),
        }
    }
}

/// Time-window filter algorithm selected by a FILTER argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterAlgorithmKind {
    /// Keep the chain of non-overlapping events covering the most time
    WeightedHash,
    /// Drop events overlapped by an event of higher priority
    TakeHighestPriority,
}

impl FilterAlgorithmKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterAlgorithmKind::WeightedHash => "WeightedHash",
            FilterAlgorithmKind::TakeHighestPriority => "TakeHighestPriority",
        }
    }

    /// Accepts bare names and dotted class-style names, with or without a
    /// `FilterAlgor` suffix.
    pub fn parse(name: &str) -> Result<Self> {
        let last = name.trim().rsplit('.').next().unwrap_or_default();
        let base = last.strip_suffix("FilterAlgor").unwrap_or(last);
        match base.to_ascii_lowercase().as_str() {
            "weightedhash" => Ok(FilterAlgorithmKind::WeightedHash),
            "takehighestpriority" => Ok(FilterAlgorithmKind::TakeHighestPriority),
            _ => Err(CatalogError::query_formulation(format!(
                "unknown filter algorithm: {}",
                name
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FilterAlgorithm {
    pub kind: FilterAlgorithmKind,
    /// Tolerated overlap between events, in milliseconds
    pub epsilon: i64,
}

/// FILTER argument of a complex query
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryFilter {
    pub start_key: String,
    pub end_key: String,
    pub priority_key: String,
    pub algorithm: FilterAlgorithm,
}

/// A query plus projection, type restriction, sort key, output format and filter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComplexQuery {
    pub query: Query,
    /// `None` means every element (SELECT *)
    pub reduced_metadata: Option<Vec<String>>,
    /// `None` means every product type (FROM *)
    pub reduced_product_types: Option<Vec<String>>,
    pub sort_by: Option<String>,
    pub output_format: Option<String>,
    pub filter: Option<QueryFilter>,
}
