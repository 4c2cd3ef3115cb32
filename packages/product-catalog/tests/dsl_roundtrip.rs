//! Property-based tests for the query DSL
//!
//! Invariant: parsing the serialized form of any criteria tree yields a
//! logically equal tree (compared in normalized form).

use product_catalog::domain::{BooleanOperator, ComplexQuery, Query, QueryCriteria};
use product_catalog::query::{criteria_to_dsl, parse_criteria, parse_query, unparse};
use proptest::prelude::*;

// ============================================================================
// Generators
// ============================================================================

fn element() -> impl Strategy<Value = String> {
    "[a-zA-Z][a-zA-Z0-9_.]{0,8}".prop_filter("keywords are reserved", |e| {
        !matches!(e.as_str(), "AND" | "OR" | "NOT")
            && !["SQL", "SELECT", "FROM", "WHERE"]
                .iter()
                .any(|k| e.eq_ignore_ascii_case(k))
    })
}

fn value() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 _:.()-]{0,12}"
}

fn leaf() -> impl Strategy<Value = QueryCriteria> {
    prop_oneof![
        (element(), value()).prop_map(|(e, v)| QueryCriteria::term(e, v)),
        (
            element(),
            proptest::option::of(value()),
            proptest::option::of(value()),
            any::<bool>()
        )
            .prop_filter_map("range needs a bound", |(e, start, end, inclusive)| {
                QueryCriteria::range(e, start, end, inclusive).ok()
            }),
    ]
}

fn criteria() -> impl Strategy<Value = QueryCriteria> {
    leaf().prop_recursive(4, 24, 4, |inner| {
        prop_oneof![
            proptest::collection::vec(inner.clone(), 1..4)
                .prop_filter_map("and", |terms| QueryCriteria::and(terms).ok()),
            proptest::collection::vec(inner.clone(), 1..4)
                .prop_filter_map("or", |terms| QueryCriteria::or(terms).ok()),
            inner.prop_map(QueryCriteria::not),
        ]
    })
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_criteria_round_trip(c in criteria()) {
        let text = criteria_to_dsl(&c);
        let parsed = parse_criteria(&text)
            .map_err(|e| TestCaseError::fail(format!("'{}' failed to parse: {}", text, e)))?;
        prop_assert_eq!(parsed.normalized(), c.normalized(), "text: {}", text);
    }

    #[test]
    fn prop_serialization_is_stable(c in criteria()) {
        let once = criteria_to_dsl(&c);
        let parsed = parse_criteria(&once)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        let twice = criteria_to_dsl(&parsed.normalized());
        let reparsed = parse_criteria(&twice)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(reparsed.normalized(), parsed.normalized());
    }

    #[test]
    fn prop_complex_query_round_trip(
        c in criteria(),
        fields in proptest::option::of(proptest::collection::vec(element(), 1..3)),
        types in proptest::option::of(proptest::collection::vec(element(), 1..3)),
        sort_by in proptest::option::of(element()),
    ) {
        let query = ComplexQuery {
            query: Query::with_criteria(vec![c]),
            reduced_metadata: fields,
            reduced_product_types: types,
            sort_by,
            ..Default::default()
        };
        let text = unparse(&query);
        let parsed = parse_query(&text)
            .map_err(|e| TestCaseError::fail(format!("'{}' failed to parse: {}", text, e)))?;

        prop_assert_eq!(&parsed.reduced_metadata, &query.reduced_metadata);
        prop_assert_eq!(&parsed.reduced_product_types, &query.reduced_product_types);
        prop_assert_eq!(&parsed.sort_by, &query.sort_by);
        prop_assert_eq!(
            parsed.query.as_criterion().map(|c| c.normalized()),
            query.query.as_criterion().map(|c| c.normalized())
        );
    }
}

// ============================================================================
// Precedence
// ============================================================================

#[test]
fn test_mixed_connectives_group_and_first() {
    let parsed = parse_criteria("a == '1' OR b == '2' AND c == '3'").unwrap();
    let QueryCriteria::Boolean(or) = &parsed else {
        panic!("expected a boolean, got {:?}", parsed);
    };
    assert_eq!(or.operator(), BooleanOperator::Or);
    assert_eq!(or.terms()[0], QueryCriteria::term("a", "1"));
    assert_eq!(
        or.terms()[1],
        QueryCriteria::and(vec![QueryCriteria::term("b", "2"), QueryCriteria::term("c", "3")])
            .unwrap()
    );
}

#[test]
fn test_not_equal_is_negated_term() {
    assert_eq!(
        parse_criteria("Sensor != 'MODIS'").unwrap(),
        QueryCriteria::not(QueryCriteria::term("Sensor", "MODIS"))
    );
}
