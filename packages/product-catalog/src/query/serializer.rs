//! Query DSL serializer
//!
//! Renders criteria back into the surface syntax accepted by
//! [`parse_criteria`](crate::query::parse_criteria). Values containing a
//! single quote cannot be expressed and will not round-trip.

use std::fmt;

use crate::domain::query::{BooleanOperator, ComplexQuery, QueryCriteria, RangeCriteria};

impl fmt::Display for QueryCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryCriteria::Term(t) => write!(f, "{} == '{}'", t.element(), t.value()),
            QueryCriteria::Range(r) => write_range(f, r),
            QueryCriteria::Boolean(b) => match b.operator() {
                BooleanOperator::Not => match &b.terms()[0] {
                    QueryCriteria::Term(t) => write!(f, "{} != '{}'", t.element(), t.value()),
                    other => write!(f, "NOT({})", strip_outer_parens(&other.to_string())),
                },
                op => {
                    f.write_str("(")?;
                    for (i, term) in b.terms().iter().enumerate() {
                        if i > 0 {
                            write!(f, " {} ", op)?;
                        }
                        write!(f, "{}", term)?;
                    }
                    f.write_str(")")
                }
            },
        }
    }
}

fn write_range(f: &mut fmt::Formatter<'_>, r: &RangeCriteria) -> fmt::Result {
    let (gt, lt) = if r.inclusive() { (">=", "<=") } else { (">", "<") };
    match (r.start(), r.end()) {
        (Some(start), Some(end)) => write!(
            f,
            "({} {} '{}' AND {} {} '{}')",
            r.element(),
            gt,
            start,
            r.element(),
            lt,
            end
        ),
        (Some(start), None) => write!(f, "{} {} '{}'", r.element(), gt, start),
        (None, Some(end)) => write!(f, "{} {} '{}'", r.element(), lt, end),
        // construction guarantees a bound
        (None, None) => Ok(()),
    }
}

/// Criteria in DSL form
pub fn criteria_to_dsl(criteria: &QueryCriteria) -> String {
    criteria.to_string()
}

/// Full query-method form: `SQL (ARGS) { SELECT .. FROM .. WHERE .. }`
pub fn unparse(query: &ComplexQuery) -> String {
    let mut args = Vec::new();
    if let Some(format) = &query.output_format {
        args.push(format!("FORMAT='{}'", format));
    }
    if let Some(sort_by) = &query.sort_by {
        args.push(format!("SORT_BY='{}'", sort_by));
    }
    if let Some(filter) = &query.filter {
        args.push(format!(
            "FILTER='{},{},{},{},{}'",
            filter.start_key,
            filter.end_key,
            filter.priority_key,
            filter.algorithm.kind.as_str(),
            filter.algorithm.epsilon
        ));
    }

    let mut out = String::from("SQL ");
    if !args.is_empty() {
        out.push_str(&format!("({}) ", args.join(", ")));
    }
    out.push_str("{ SELECT ");
    out.push_str(&render_list(query.reduced_metadata.as_deref()));
    out.push_str(" FROM ");
    out.push_str(&render_list(query.reduced_product_types.as_deref()));
    if let Some(criteria) = query.query.as_criterion() {
        out.push_str(" WHERE ");
        out.push_str(strip_outer_parens(&criteria.to_string()));
    }
    out.push_str(" }");
    out
}

fn render_list(items: Option<&[String]>) -> String {
    match items {
        None => "*".to_string(),
        Some(items) => items.join(","),
    }
}

/// Drop one pair of parentheses when it encloses the whole text
fn strip_outer_parens(text: &str) -> &str {
    if !(text.starts_with('(') && text.ends_with(')')) {
        return text;
    }
    let mut depth = 0usize;
    let mut quoted = false;
    for (i, c) in text.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => {
                depth = depth.saturating_sub(1);
                if depth == 0 && i + 1 < text.len() {
                    return text;
                }
            }
            _ => {}
        }
    }
    &text[1..text.len() - 1]
}
