//! Criteria → tantivy queries
//!
//! Metadata values are indexed as `element\u{1f}value` terms of one raw
//! field, so a term is an exact `TermQuery` and a range is a string range
//! over the element's slice of the term dictionary.
//!
//! A pure `MustNot` clause matches nothing, so NOT is anchored: for a leaf
//! member on "the element is present", for a boolean member on all docs.

use std::ops::Bound;
use tantivy::query::{AllQuery, BooleanQuery, Occur, Query as IndexQuery, RangeQuery, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::Term;

use crate::domain::models::ProductType;
use crate::domain::query::{BooleanOperator, Query, QueryCriteria, RangeCriteria};
use crate::infrastructure::index::schema::{
    element_lower_bound, element_upper_bound, metadata_term, IndexFields, FIELD_METADATA,
};

pub struct IndexTranslator<'a> {
    fields: &'a IndexFields,
}

impl<'a> IndexTranslator<'a> {
    pub fn new(fields: &'a IndexFields) -> Self {
        Self { fields }
    }

    /// The whole query restricted to documents of `product_type`
    pub fn query_for(&self, query: &Query, product_type: &ProductType) -> Box<dyn IndexQuery> {
        let type_clause: Box<dyn IndexQuery> = Box::new(TermQuery::new(
            Term::from_field_text(self.fields.product_type_id, &product_type.id),
            IndexRecordOption::Basic,
        ));
        match query.as_criterion() {
            None => type_clause,
            Some(criterion) => Box::new(BooleanQuery::new(vec![
                (Occur::Must, type_clause),
                (Occur::Must, self.translate(&criterion)),
            ])),
        }
    }

    pub fn translate(&self, criteria: &QueryCriteria) -> Box<dyn IndexQuery> {
        match criteria {
            QueryCriteria::Term(t) => Box::new(TermQuery::new(
                Term::from_field_text(self.fields.metadata, &metadata_term(t.element(), t.value())),
                IndexRecordOption::Basic,
            )),
            QueryCriteria::Range(r) => self.range(r),
            QueryCriteria::Boolean(b) => match b.operator() {
                BooleanOperator::And => self.compound(b.terms(), Occur::Must),
                BooleanOperator::Or => self.compound(b.terms(), Occur::Should),
                BooleanOperator::Not => {
                    let member = &b.terms()[0];
                    let anchor: Box<dyn IndexQuery> = match member.element_name() {
                        Some(element) => self.exists(element),
                        None => Box::new(AllQuery),
                    };
                    Box::new(BooleanQuery::new(vec![
                        (Occur::Must, anchor),
                        (Occur::MustNot, self.translate(member)),
                    ]))
                }
            },
        }
    }

    fn compound(&self, terms: &[QueryCriteria], occur: Occur) -> Box<dyn IndexQuery> {
        Box::new(BooleanQuery::new(
            terms.iter().map(|t| (occur, self.translate(t))).collect(),
        ))
    }

    fn range(&self, range: &RangeCriteria) -> Box<dyn IndexQuery> {
        let element = range.element();
        let lower_key = range.start().map(|s| metadata_term(element, s));
        let upper_key = range.end().map(|e| metadata_term(element, e));
        let element_lower = element_lower_bound(element);
        let element_upper = element_upper_bound(element);

        let lower = match &lower_key {
            Some(key) if range.inclusive() => Bound::Included(key.as_str()),
            Some(key) => Bound::Excluded(key.as_str()),
            None => Bound::Included(element_lower.as_str()),
        };
        let upper = match &upper_key {
            Some(key) if range.inclusive() => Bound::Included(key.as_str()),
            Some(key) => Bound::Excluded(key.as_str()),
            None => Bound::Excluded(element_upper.as_str()),
        };
        Box::new(RangeQuery::new_str_bounds(FIELD_METADATA.to_string(), lower, upper))
    }

    /// Documents carrying any value of `element`
    fn exists(&self, element: &str) -> Box<dyn IndexQuery> {
        let lower = element_lower_bound(element);
        let upper = element_upper_bound(element);
        Box::new(RangeQuery::new_str_bounds(
            FIELD_METADATA.to_string(),
            Bound::Included(lower.as_str()),
            Bound::Excluded(upper.as_str()),
        ))
    }
}
