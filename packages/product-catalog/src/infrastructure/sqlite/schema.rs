//! Relational schema
//!
//! One shared `products` table, then per product type:
//! - `<type>_reference`: ordered file references
//! - `<type>_metadata`: narrow (EAV) or wide (column per element)
//! - `<type>_<element>_values`: wide layout vector elements

use rusqlite::Connection;
use std::collections::HashMap;

use crate::domain::models::ProductType;
use crate::error::Result;
use crate::infrastructure::sqlite::naming::{column_name_for, TypeTables};
use crate::infrastructure::sqlite::translator::Layout;
use crate::schema::SchemaBridge;

/// Create the shared tables
pub(crate) fn init_base_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS products (
            product_id INTEGER PRIMARY KEY AUTOINCREMENT,
            product_name TEXT NOT NULL,
            product_structure TEXT NOT NULL,
            product_transfer_status TEXT NOT NULL,
            product_type_id TEXT NOT NULL,
            product_received_time INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_products_type_time
         ON products(product_type_id, product_received_time)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_products_name
         ON products(product_name)",
        [],
    )?;

    Ok(())
}

/// Create (or widen) the tables of one product type
pub(crate) fn ensure_type_tables(
    conn: &Connection,
    layout: &Layout,
    bridge: &SchemaBridge,
    product_type: &ProductType,
    type_table_map: &HashMap<String, String>,
) -> Result<()> {
    let tables = TypeTables::for_type(product_type, type_table_map)?;

    conn.execute(
        &format!(
            "CREATE TABLE IF NOT EXISTS {} (
                product_id INTEGER NOT NULL,
                reference_index INTEGER NOT NULL,
                product_orig_reference TEXT NOT NULL,
                product_datastore_reference TEXT NOT NULL DEFAULT '',
                product_reference_filesize INTEGER NOT NULL DEFAULT 0,
                product_reference_mimetype TEXT,
                PRIMARY KEY (product_id, reference_index)
            )",
            tables.reference
        ),
        [],
    )?;

    match layout {
        Layout::Narrow => {
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        product_id INTEGER NOT NULL,
                        element_id TEXT NOT NULL,
                        metadata_value TEXT NOT NULL
                    )",
                    tables.metadata
                ),
                [],
            )?;
            conn.execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {}(element_id, metadata_value)",
                    tables.index_name("metadata_element"),
                    tables.metadata
                ),
                [],
            )?;
            conn.execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {}(product_id)",
                    tables.index_name("metadata_product"),
                    tables.metadata
                ),
                [],
            )?;
        }
        Layout::Wide { .. } => {
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (product_id INTEGER PRIMARY KEY)",
                    tables.metadata
                ),
                [],
            )?;

            let existing = table_columns(conn, &tables.metadata)?;
            for element in bridge.elements_for(product_type)? {
                if layout.is_vector(&element.name) {
                    let vector = tables.vector(&element.name)?;
                    conn.execute(
                        &format!(
                            "CREATE TABLE IF NOT EXISTS {} (
                                product_id INTEGER NOT NULL,
                                metadata_value TEXT NOT NULL
                            )",
                            vector
                        ),
                        [],
                    )?;
                } else if !existing.iter().any(|c| *c == element.name) {
                    tracing::debug!(
                        product_type = %product_type.name,
                        element = %element.name,
                        "adding metadata column"
                    );
                    conn.execute(
                        &format!(
                            "ALTER TABLE {} ADD COLUMN {} TEXT",
                            tables.metadata,
                            column_name_for(&element.name)?
                        ),
                        [],
                    )?;
                }
            }
        }
    }

    Ok(())
}

/// Column names of a (quoted) table
pub(crate) fn table_columns(conn: &Connection, quoted_table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quoted_table))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}
