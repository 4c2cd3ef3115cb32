//! Narrow and wide relational layouts answer every query identically

#![cfg(feature = "sqlite")]

mod common;

use std::collections::HashMap;

use common::*;
use pretty_assertions::assert_eq;
use product_catalog::domain::{Catalog, Product, Query, QueryCriteria, TransferStatus};
use product_catalog::query::parse_criteria;
use product_catalog::{ErrorKind, Layout, SqliteCatalog};
use tempfile::TempDir;

/// The same four granules in a catalog, keyed by name
fn populate(catalog: &SqliteCatalog) -> Vec<Product> {
    vec![
        ingest(
            catalog,
            "g1",
            granule(),
            &[
                ("Filename", "g1.hdf"),
                ("Sensor", "MODIS"),
                ("Keyword", "ocean"),
                ("Keyword", "color"),
                ("StartDateTime", "2020-01-01T00:00:00Z"),
            ],
        ),
        ingest(
            catalog,
            "g2",
            granule(),
            &[
                ("Filename", "g2.hdf"),
                ("Sensor", "VIIRS"),
                ("Keyword", "ocean"),
                ("StartDateTime", "2020-06-01T00:00:00Z"),
            ],
        ),
        ingest(
            catalog,
            "g3",
            granule(),
            &[
                ("Filename", "g3.hdf"),
                ("Sensor", "MODIS"),
                ("Keyword", "land"),
                ("StartDateTime", "2021-01-01T00:00:00Z"),
            ],
        ),
        ingest(catalog, "g4", granule(), &[("Filename", "g4.hdf")]),
    ]
}

/// Names of the products matching `criteria`, sorted
fn names(catalog: &SqliteCatalog, criteria: &str) -> Vec<String> {
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

const QUERIES: &[(&str, &[&str])] = &[
    ("Sensor == 'MODIS'", &["g1", "g3"]),
    ("Keyword == 'ocean'", &["g1", "g2"]),
    ("Keyword == 'ocean' AND Keyword == 'color'", &["g1"]),
    ("Sensor == 'VIIRS' OR Keyword == 'land'", &["g2", "g3"]),
    ("Sensor == 'MODIS' AND (Keyword == 'ocean' OR Keyword == 'land')", &["g1", "g3"]),
    ("StartDateTime >= '2020-06-01T00:00:00Z'", &["g2", "g3"]),
    ("StartDateTime > '2020-06-01T00:00:00Z'", &["g3"]),
    ("StartDateTime < '2020-06-01T00:00:00Z'", &["g1"]),
    ("StartDateTime <= '2020-06-01T00:00:00Z'", &["g1", "g2"]),
    // complement within the type: g4 has no Sensor at all
    ("Sensor != 'MODIS'", &["g2", "g4"]),
    ("NOT(Keyword == 'ocean' OR Keyword == 'land')", &["g4"]),
    ("Filename == 'missing.hdf'", &[]),
];

#[test]
fn test_layouts_agree_on_every_query() {
    let narrow = sqlite_narrow();
    let wide = sqlite_wide();
    populate(&narrow);
    populate(&wide);

    for (criteria, expected) in QUERIES {
        let expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
        assert_eq!(names(&narrow, criteria), expected, "narrow: {}", criteria);
        assert_eq!(names(&wide, criteria), expected, "wide: {}", criteria);
    }
}

#[test]
fn test_two_sided_range_inclusivity() {
    for catalog in [sqlite_narrow(), sqlite_wide()] {
        populate(&catalog);
        let inclusive = QueryCriteria::range(
            "StartDateTime",
            Some("2020-01-01T00:00:00Z".into()),
            Some("2020-06-01T00:00:00Z".into()),
            true,
        )
        .unwrap();
        let exclusive = QueryCriteria::range(
            "StartDateTime",
            Some("2020-01-01T00:00:00Z".into()),
            Some("2021-01-01T00:00:00Z".into()),
            false,
        )
        .unwrap();

        let count = |c: QueryCriteria| {
            catalog
                .query(&Query::with_criteria(vec![c]), &granule())
                .unwrap()
                .len()
        };
        assert_eq!(count(inclusive), 2);
        assert_eq!(count(exclusive), 1);
    }
}

#[test]
fn test_metadata_identical_across_layouts() {
    let narrow = sqlite_narrow();
    let wide = sqlite_wide();
    let from_narrow = populate(&narrow);
    let from_wide = populate(&wide);

    for (a, b) in from_narrow.iter().zip(&from_wide) {
        assert_eq!(narrow.metadata(a).unwrap(), wide.metadata(b).unwrap());
    }
    assert_eq!(
        wide.metadata(&from_wide[0]).unwrap().get("Keyword").unwrap(),
        &["ocean", "color"]
    );
}

#[test]
fn test_queries_are_scoped_to_the_type() {
    let catalog = sqlite_narrow();
    populate(&catalog);
    ingest(&catalog, "a1", ancillary(), &[("Sensor", "MODIS")]);

    assert_eq!(names(&catalog, "Sensor == 'MODIS'"), vec!["g1", "g3"]);
    let query = Query::with_criteria(vec![QueryCriteria::term("Sensor", "MODIS")]);
    assert_eq!(catalog.query(&query, &ancillary()).unwrap().len(), 1);

    // Keyword is not declared for Ancillary
    let keyword = Query::with_criteria(vec![QueryCriteria::term("Keyword", "ocean")]);
    assert_eq!(
        catalog.query(&keyword, &ancillary()).unwrap_err().kind,
        ErrorKind::Schema
    );
}

#[test]
fn test_transfer_status_and_references() {
    let catalog = sqlite_wide();
    let mut product = populate(&catalog).remove(0);
    product.transfer_status = TransferStatus::Received;
    catalog.set_product_transfer_status(&product).unwrap();

    product.references.push(product_catalog::domain::Reference::new(
        "file:///staging/g1.xml",
        "file:///archive/g1.xml",
        10,
    ));
    catalog.add_product_references(&product).unwrap();

    let stored = catalog.product_by_id(product.id.as_deref().unwrap()).unwrap();
    assert_eq!(stored.transfer_status, TransferStatus::Received);
    assert_eq!(stored.references, product.references);
}

#[test]
fn test_mapped_types_share_tables() {
    for layout in [Layout::Narrow, Layout::wide(["Keyword"])] {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.db");
        let map: HashMap<String, String> =
            [("Ancillary".to_string(), "Granule".to_string())].into();
        let catalog = SqliteCatalog::new(&path, layout.clone(), bridge(), 10)
            .unwrap()
            .with_type_table_map(map);

        let g = ingest(&catalog, "g", granule(), &[("Filename", "g.hdf"), ("Sensor", "MODIS")]);
        let a = ingest(&catalog, "a", ancillary(), &[("Filename", "a.hdf"), ("Sensor", "MODIS")]);

        // one set of tables holds both types
        let conn = rusqlite::Connection::open(&path).unwrap();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'Ancillary%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<rusqlite::Result<_>>()
            .unwrap();
        assert!(tables.is_empty(), "{:?}: {:?}", layout, tables);
        let stored: i64 = conn
            .query_row(
                "SELECT COUNT(DISTINCT product_id) FROM \"Granule_metadata\"",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(stored, 2, "{:?}", layout);
        let references: i64 = conn
            .query_row("SELECT COUNT(*) FROM \"Granule_reference\"", [], |row| row.get(0))
            .unwrap();
        assert_eq!(references, 2, "{:?}", layout);

        // reads and queries stay scoped to each product's type
        let sensor = Query::with_criteria(vec![QueryCriteria::term("Sensor", "MODIS")]);
        assert_eq!(catalog.query(&sensor, &granule()).unwrap(), vec![g.id.clone().unwrap()]);
        assert_eq!(catalog.query(&sensor, &ancillary()).unwrap(), vec![a.id.clone().unwrap()]);
        assert_eq!(
            catalog.metadata(&a).unwrap(),
            metadata(&[("Filename", "a.hdf"), ("Sensor", "MODIS")])
        );
        assert_eq!(catalog.product_references(&a).unwrap(), a.references);
    }
}
