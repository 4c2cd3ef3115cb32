//! NOT over products that lack the negated element

mod common;

use common::*;
use pretty_assertions::assert_eq;
use product_catalog::domain::{Catalog, Query};
use product_catalog::query::parse_criteria;

fn populate(catalog: &dyn Catalog) {
    ingest(catalog, "modis", granule(), &[("Filename", "m.hdf"), ("Sensor", "MODIS")]);
    ingest(catalog, "viirs", granule(), &[("Filename", "v.hdf"), ("Sensor", "VIIRS")]);
    ingest(catalog, "bare", granule(), &[("Filename", "b.hdf")]);
}

fn names(catalog: &dyn Catalog, criteria: &str) -> Vec<String> {
    let query = Query::with_criteria(vec![parse_criteria(criteria).unwrap()]);
    let mut names: Vec<String> = catalog
        .query(&query, &granule())
        .unwrap()
        .iter()
        .map(|id| catalog.product_by_id(id).unwrap().name)
        .collect();
    names.sort();
    names
}

#[test]
fn test_negated_term_on_missing_element() {
    for (backend, catalog) in all_backends() {
        populate(catalog.as_ref());
        let expected: &[&str] = match backend {
            // index NOT only matches documents carrying the element
            "index" => &["viirs"],
            // relational and remote NOT is the complement within the type
            _ => &["bare", "viirs"],
        };
        assert_eq!(names(catalog.as_ref(), "Sensor != 'MODIS'"), expected, "{}", backend);
    }
}

#[test]
fn test_negated_boolean_on_missing_element() {
    for (backend, catalog) in all_backends() {
        populate(catalog.as_ref());
        assert_eq!(
            names(
                catalog.as_ref(),
                "NOT(Sensor == 'MODIS' OR Sensor == 'VIIRS')"
            ),
            vec!["bare"],
            "{}",
            backend
        );
    }
}
