//! Complex queries: type selection, projection, sort, output format and filters

mod common;

use std::sync::Arc;

use common::*;
use pretty_assertions::assert_eq;
use product_catalog::domain::Catalog;
use product_catalog::{ComplexQueryExecutor, ErrorKind, QueryResult};

fn populate(catalog: &dyn Catalog) {
    let window_a = [
        ("StartDateTime", "2020-01-01T00:00:00Z"),
        ("EndDateTime", "2020-01-02T00:00:00Z"),
    ];
    let mut v1 = vec![("Filename", "a-v1"), ("Sensor", "MODIS"), ("Version", "1")];
    v1.extend(window_a);
    let mut v2 = vec![("Filename", "a-v2"), ("Sensor", "MODIS"), ("Version", "2")];
    v2.extend(window_a);

    ingest(catalog, "a-v1", granule(), &v1);
    ingest(catalog, "a-v2", granule(), &v2);
    ingest(
        catalog,
        "b",
        granule(),
        &[
            ("Filename", "b"),
            ("Sensor", "MODIS"),
            ("Keyword", "ocean"),
            ("Version", "1"),
            ("StartDateTime", "2020-02-01T00:00:00Z"),
            ("EndDateTime", "2020-02-02T00:00:00Z"),
        ],
    );
    ingest(
        catalog,
        "c",
        granule(),
        &[("Filename", "c"), ("Sensor", "VIIRS"), ("Keyword", "land")],
    );
    ingest(
        catalog,
        "anc",
        ancillary(),
        &[("Filename", "anc"), ("Sensor", "MODIS")],
    );
}

fn executors() -> Vec<(&'static str, ComplexQueryExecutor)> {
    all_backends()
        .into_iter()
        .map(|(backend, catalog)| {
            populate(catalog.as_ref());
            (backend, ComplexQueryExecutor::new(Arc::clone(&catalog), bridge()))
        })
        .collect()
}

fn formatted(results: &[QueryResult]) -> Vec<String> {
    results.iter().map(|r| r.to_string()).collect()
}

#[test]
fn test_format_and_sort_across_types() {
    for (backend, executor) in executors() {
        let results = executor
            .execute_dsl(
                "SQL (FORMAT='$Filename [$Sensor]', SORT_BY='Filename') { \
                 SELECT Filename,Sensor FROM Granule,Ancillary WHERE Sensor == 'MODIS' }",
            )
            .unwrap();
        assert_eq!(
            formatted(&results),
            vec!["a-v1 [MODIS]", "a-v2 [MODIS]", "anc [MODIS]", "b [MODIS]"],
            "{}",
            backend
        );
    }
}

#[test]
fn test_projection_drops_other_elements() {
    for (backend, executor) in executors() {
        let results = executor
            .execute_dsl("SELECT Filename FROM Granule WHERE Sensor == 'VIIRS'")
            .unwrap();
        assert_eq!(results.len(), 1, "{}", backend);
        let keys: Vec<&str> = results[0].metadata.keys().collect();
        assert_eq!(keys, vec!["Filename"], "{}", backend);
        // no output format: the product name
        assert_eq!(results[0].to_string(), "c", "{}", backend);
    }
}

#[test]
fn test_filter_keeps_highest_version() {
    for (backend, executor) in executors() {
        let results = executor
            .execute_dsl(
                "SQL (SORT_BY='Filename', \
                 FILTER='StartDateTime,EndDateTime,Version,TakeHighestPriority') { \
                 SELECT Filename FROM Granule WHERE Sensor == 'MODIS' }",
            )
            .unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.product.name.as_str()).collect();
        assert_eq!(names, vec!["a-v2", "b"], "{}", backend);
    }
}

#[test]
fn test_types_without_queried_element_are_skipped() {
    for (backend, executor) in executors() {
        // Keyword is only declared for Granule
        let results = executor
            .execute_dsl("SELECT * FROM * WHERE Keyword == 'ocean'")
            .unwrap();
        let names: Vec<&str> = results.iter().map(|r| r.product.name.as_str()).collect();
        assert_eq!(names, vec!["b"], "{}", backend);
    }
}

#[test]
fn test_filter_requires_time_values() {
    for (backend, executor) in executors() {
        let err = executor
            .execute_dsl(
                "SQL (FILTER='StartDateTime,EndDateTime,Version,WeightedHash') { \
                 SELECT * FROM Granule WHERE Sensor == 'VIIRS' }",
            )
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::QueryFormulation, "{}", backend);
    }
}

#[test]
fn test_unknown_type_and_bad_dsl() {
    for (backend, executor) in executors() {
        assert!(
            executor.execute_dsl("SELECT * FROM Nowhere").is_err(),
            "{}",
            backend
        );
        assert_eq!(
            executor
                .execute_dsl("SELECT * FROM Granule WHERE Sensor ==")
                .unwrap_err()
                .kind,
            ErrorKind::QueryFormulation,
            "{}",
            backend
        );
    }
}
