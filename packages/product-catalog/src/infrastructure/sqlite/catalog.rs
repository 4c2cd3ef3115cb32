//! SQLite Catalog
//!
//! File-based or in-memory relational catalog. Every write path runs in one
//! transaction; queries are translated to set algebra over per-type tables
//! (see [`SqlTranslator`]).

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::CatalogConfig;
use crate::domain::models::{Metadata, Product, ProductType, Reference};
use crate::domain::page::{PageWindow, ProductPage};
use crate::domain::ports::Catalog;
use crate::domain::query::Query;
use crate::error::{CatalogError, Result};
use crate::infrastructure::sqlite::naming::{column_name_for, TypeTables};
use crate::infrastructure::sqlite::schema::{ensure_type_tables, init_base_schema};
use crate::infrastructure::sqlite::translator::{Layout, SqlTranslator, Statement};
use crate::schema::SchemaBridge;

const PRODUCT_COLUMNS: &str = "product_id, product_name, product_structure, \
     product_transfer_status, product_type_id, product_received_time";

const NEWEST_FIRST: &str = "ORDER BY product_received_time DESC, product_id DESC";

struct ProductRow {
    id: i64,
    name: String,
    structure: String,
    transfer_status: String,
    type_id: String,
    received_time: i64,
}

fn map_product_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProductRow> {
    Ok(ProductRow {
        id: row.get(0)?,
        name: row.get(1)?,
        structure: row.get(2)?,
        transfer_status: row.get(3)?,
        type_id: row.get(4)?,
        received_time: row.get(5)?,
    })
}

/// Row count for LIMIT/OFFSET; counts beyond `i64` clamp
fn sql_count(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

fn parse_id(product_id: &str) -> Result<i64> {
    product_id
        .parse::<i64>()
        .map_err(|_| CatalogError::not_found("Product", product_id))
}

fn select_ids(conn: &Connection, sql: &str, params: &[Value]) -> Result<Vec<i64>> {
    tracing::debug!(sql, params = params.len(), "executing query");
    let mut stmt = conn.prepare(sql)?;
    let ids = stmt
        .query_map(params_from_iter(params.iter()), |row| row.get::<_, i64>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(ids)
}

/// SQLite-backed catalog
#[derive(Clone)]
pub struct SqliteCatalog {
    conn: Arc<Mutex<Connection>>,
    layout: Layout,
    bridge: SchemaBridge,
    page_size: usize,
    /// product type name -> base table name
    type_table_map: Arc<HashMap<String, String>>,
}

impl SqliteCatalog {
    /// Open (or create) a catalog database at the given path
    pub fn new(
        db_path: impl AsRef<Path>,
        layout: Layout,
        bridge: SchemaBridge,
        page_size: usize,
    ) -> Result<Self> {
        let path = db_path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            CatalogError::connection(format!(
                "cannot open catalog database {}: {}",
                path.display(),
                e
            ))
            .with_source(e)
        })?;
        Self::with_connection(conn, layout, bridge, page_size)
    }

    /// In-memory catalog (for testing)
    pub fn in_memory(layout: Layout, bridge: SchemaBridge, page_size: usize) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            CatalogError::connection(format!("cannot open in-memory database: {}", e)).with_source(e)
        })?;
        Self::with_connection(conn, layout, bridge, page_size)
    }

    pub fn from_config(config: &CatalogConfig, bridge: SchemaBridge) -> Result<Self> {
        let layout = Layout::from_config(&config.sqlite);
        let catalog = match &config.sqlite.path {
            Some(path) => Self::new(path, layout, bridge, config.page_size)?,
            None => Self::in_memory(layout, bridge, config.page_size)?,
        };
        Ok(catalog.with_type_table_map(config.sqlite.type_table_map.clone()))
    }

    /// Store the listed product types in another type's tables
    pub fn with_type_table_map(mut self, type_table_map: HashMap<String, String>) -> Self {
        self.type_table_map = Arc::new(type_table_map);
        self
    }

    fn with_connection(
        conn: Connection,
        layout: Layout,
        bridge: SchemaBridge,
        page_size: usize,
    ) -> Result<Self> {
        init_base_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            layout,
            bridge,
            page_size,
            type_table_map: Arc::new(HashMap::new()),
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    fn tables(&self, product_type: &ProductType) -> Result<TypeTables> {
        TypeTables::for_type(product_type, &self.type_table_map)
    }

    fn ensure_tables(&self, conn: &Connection, product_type: &ProductType) -> Result<()> {
        ensure_type_tables(
            conn,
            &self.layout,
            &self.bridge,
            product_type,
            &self.type_table_map,
        )
    }

    /// Run `f` in one transaction; roll back on error and return the original error
    fn write<T>(&self, operation: &str, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(|e| {
            CatalogError::transaction(format!("{}: cannot begin transaction: {}", operation, e))
                .with_source(e)
        })?;

        match f(&tx) {
            Ok(value) => {
                tx.commit().map_err(|e| {
                    CatalogError::transaction(format!("{}: commit failed: {}", operation, e))
                        .with_source(e)
                })?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::error!(operation, error = %rollback_err, "rollback failed");
                }
                tracing::debug!(operation, error = %err, "write rolled back");
                Err(err)
            }
        }
    }

    fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Products
    // ═══════════════════════════════════════════════════════════════════════

    fn stored_type(&self, conn: &Connection, product_id: i64) -> Result<ProductType> {
        let type_id: Option<String> = conn
            .query_row(
                "SELECT product_type_id FROM products WHERE product_id = ?1",
                params![product_id],
                |row| row.get(0),
            )
            .optional()?;
        let type_id = type_id.ok_or_else(|| CatalogError::not_found("Product", product_id))?;
        self.bridge.type_by_id(&type_id)
    }

    fn load_product(&self, conn: &Connection, product_id: i64) -> Result<Product> {
        let row = conn
            .query_row(
                &format!("SELECT {} FROM products WHERE product_id = ?1", PRODUCT_COLUMNS),
                params![product_id],
                map_product_row,
            )
            .optional()?
            .ok_or_else(|| CatalogError::not_found("Product", product_id))?;

        let product_type = self.bridge.type_by_id(&row.type_id)?;
        let references = self.load_references(conn, &product_type, row.id)?;
        Ok(Product {
            id: Some(row.id.to_string()),
            name: row.name,
            structure: row.structure.parse()?,
            transfer_status: row.transfer_status.parse()?,
            product_type,
            references,
            received_time: DateTime::from_timestamp_millis(row.received_time),
        })
    }

    fn load_products(&self, conn: &Connection, ids: Vec<i64>) -> Result<Vec<Product>> {
        ids.into_iter()
            .map(|id| self.load_product(conn, id))
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // References
    // ═══════════════════════════════════════════════════════════════════════

    fn load_references(
        &self,
        conn: &Connection,
        product_type: &ProductType,
        product_id: i64,
    ) -> Result<Vec<Reference>> {
        let tables = self.tables(product_type)?;
        let mut stmt = conn.prepare(&format!(
            "SELECT product_orig_reference, product_datastore_reference,
                    product_reference_filesize, product_reference_mimetype
             FROM {} WHERE product_id = ?1 ORDER BY reference_index",
            tables.reference
        ))?;
        let references = stmt
            .query_map(params![product_id], |row| {
                Ok(Reference {
                    original_uri: row.get(0)?,
                    datastore_uri: row.get(1)?,
                    file_size: u64::try_from(row.get::<_, i64>(2)?).unwrap_or(0),
                    mime_type: row.get(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(references)
    }

    fn store_references(
        &self,
        conn: &Connection,
        product_type: &ProductType,
        product_id: i64,
        references: &[Reference],
    ) -> Result<()> {
        let tables = self.tables(product_type)?;
        conn.execute(
            &format!("DELETE FROM {} WHERE product_id = ?1", tables.reference),
            params![product_id],
        )?;
        let mut stmt = conn.prepare(&format!(
            "INSERT INTO {} (product_id, reference_index, product_orig_reference,
                product_datastore_reference, product_reference_filesize, product_reference_mimetype)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            tables.reference
        ))?;
        for (index, reference) in references.iter().enumerate() {
            stmt.execute(params![
                product_id,
                index as i64,
                &reference.original_uri,
                &reference.datastore_uri,
                i64::try_from(reference.file_size).unwrap_or(i64::MAX),
                &reference.mime_type,
            ])?;
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Metadata
    // ═══════════════════════════════════════════════════════════════════════

    fn load_metadata(
        &self,
        conn: &Connection,
        product_type: &ProductType,
        product_id: i64,
    ) -> Result<Metadata> {
        let tables = self.tables(product_type)?;
        let mut metadata = Metadata::new();

        match &self.layout {
            Layout::Narrow => {
                let names: HashMap<String, String> = self
                    .bridge
                    .elements_for(product_type)?
                    .into_iter()
                    .map(|e| (e.id, e.name))
                    .collect();
                let mut stmt = conn.prepare(&format!(
                    "SELECT element_id, metadata_value FROM {} WHERE product_id = ?1 ORDER BY rowid",
                    tables.metadata
                ))?;
                let rows = stmt
                    .query_map(params![product_id], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                for (element_id, value) in rows {
                    let name = match names.get(&element_id) {
                        Some(name) => name.clone(),
                        None => self.bridge.element_by_id(&element_id)?.name,
                    };
                    metadata.add(name, value);
                }
            }
            Layout::Wide { .. } => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT * FROM {} WHERE product_id = ?1",
                    tables.metadata
                ))?;
                let columns: Vec<String> =
                    stmt.column_names().into_iter().map(String::from).collect();
                let values = stmt
                    .query_row(params![product_id], |row| {
                        let mut values = Vec::new();
                        for (i, column) in columns.iter().enumerate() {
                            if column != "product_id" {
                                values.push((column.clone(), row.get::<_, Option<String>>(i)?));
                            }
                        }
                        Ok(values)
                    })
                    .optional()?
                    .unwrap_or_default();
                for (column, value) in values {
                    if let Some(value) = value {
                        metadata.add(column, value);
                    }
                }

                for element in self.bridge.elements_for(product_type)? {
                    if !self.layout.is_vector(&element.name) {
                        continue;
                    }
                    let mut stmt = conn.prepare(&format!(
                        "SELECT metadata_value FROM {} WHERE product_id = ?1 ORDER BY rowid",
                        tables.vector(&element.name)?
                    ))?;
                    let values = stmt
                        .query_map(params![product_id], |row| row.get::<_, String>(0))?
                        .collect::<rusqlite::Result<Vec<_>>>()?;
                    metadata.add_all(element.name, values);
                }
            }
        }
        Ok(metadata)
    }

    fn delete_metadata(
        &self,
        conn: &Connection,
        product_type: &ProductType,
        product_id: i64,
    ) -> Result<()> {
        let tables = self.tables(product_type)?;
        conn.execute(
            &format!("DELETE FROM {} WHERE product_id = ?1", tables.metadata),
            params![product_id],
        )?;
        if let Layout::Wide { vector_elements } = &self.layout {
            for element in self.bridge.elements_for(product_type)? {
                if vector_elements.contains(&element.name) {
                    conn.execute(
                        &format!(
                            "DELETE FROM {} WHERE product_id = ?1",
                            tables.vector(&element.name)?
                        ),
                        params![product_id],
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Replace the stored metadata of a product
    fn store_metadata(
        &self,
        conn: &Connection,
        product_type: &ProductType,
        product_id: i64,
        metadata: &Metadata,
    ) -> Result<()> {
        let tables = self.tables(product_type)?;
        self.delete_metadata(conn, product_type, product_id)?;

        match &self.layout {
            Layout::Narrow => {
                let ids: HashMap<String, String> = self
                    .bridge
                    .elements_for(product_type)?
                    .into_iter()
                    .map(|e| (e.name, e.id))
                    .collect();
                let mut stmt = conn.prepare(&format!(
                    "INSERT INTO {} (product_id, element_id, metadata_value) VALUES (?1, ?2, ?3)",
                    tables.metadata
                ))?;
                for (name, values) in metadata.iter() {
                    let Some(element_id) = ids.get(name) else {
                        continue;
                    };
                    for value in values {
                        stmt.execute(params![product_id, element_id, value])?;
                    }
                }
            }
            Layout::Wide { .. } => {
                let mut columns = vec!["product_id".to_string()];
                let mut values = vec![Value::Integer(product_id)];
                for (name, element_values) in metadata.iter() {
                    if self.layout.is_vector(name) {
                        let mut stmt = conn.prepare(&format!(
                            "INSERT INTO {} (product_id, metadata_value) VALUES (?1, ?2)",
                            tables.vector(name)?
                        ))?;
                        for value in element_values {
                            stmt.execute(params![product_id, value])?;
                        }
                        continue;
                    }
                    if element_values.len() > 1 {
                        tracing::warn!(
                            element = name,
                            values = element_values.len(),
                            "scalar column keeps only the first value"
                        );
                    }
                    if let Some(first) = element_values.first() {
                        columns.push(column_name_for(name)?);
                        values.push(Value::Text(first.clone()));
                    }
                }
                let placeholders = vec!["?"; columns.len()].join(", ");
                conn.execute(
                    &format!(
                        "INSERT INTO {} ({}) VALUES ({})",
                        tables.metadata,
                        columns.join(", "),
                        placeholders
                    ),
                    params_from_iter(values.iter()),
                )?;
            }
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════

    /// Translate before touching the database; returns the resolved type and
    /// the `FROM products WHERE ...` clause selecting the matches.
    fn matching(&self, query: &Query, product_type: &ProductType) -> Result<(ProductType, Statement)> {
        let product_type = self.bridge.resolve_type(product_type)?;
        self.bridge.check_query(query, &product_type)?;
        let ids = SqlTranslator::new(
            &self.layout,
            &self.bridge,
            &product_type,
            &self.type_table_map,
        )?
        .query_ids(query)?;

        let mut params = vec![Value::Text(product_type.id.clone())];
        params.extend(ids.params);
        let clause = Statement {
            sql: format!(
                "FROM products WHERE product_type_id = ? AND product_id IN ({})",
                ids.sql
            ),
            params,
        };
        Ok((product_type, clause))
    }
}

impl Catalog for SqliteCatalog {
    fn add_product(&self, product: &mut Product) -> Result<()> {
        if let Some(id) = &product.id {
            return Err(CatalogError::uniqueness(format!(
                "product '{}' already has id {}",
                product.name, id
            )));
        }
        let product_type = self.bridge.resolve_type(&product.product_type)?;
        let received_ms = Utc::now().timestamp_millis();

        let id = self.write("add_product", |conn| {
            self.ensure_tables(conn, &product_type)?;
            conn.execute(
                "INSERT INTO products (product_name, product_structure, product_transfer_status,
                    product_type_id, product_received_time)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    &product.name,
                    product.structure.as_str(),
                    product.transfer_status.as_str(),
                    &product_type.id,
                    received_ms
                ],
            )?;
            let id = conn.last_insert_rowid();
            self.store_references(conn, &product_type, id, &product.references)?;
            Ok(id)
        })?;

        tracing::debug!(product_id = id, name = %product.name, "product added");
        product.id = Some(id.to_string());
        product.product_type = product_type;
        product.received_time = DateTime::from_timestamp_millis(received_ms);
        Ok(())
    }

    fn modify_product(&self, product: &Product) -> Result<()> {
        let id = parse_id(product.require_id()?)?;
        self.write("modify_product", |conn| {
            let product_type = self.stored_type(conn, id)?;
            conn.execute(
                "UPDATE products SET product_name = ?1, product_structure = ?2,
                    product_transfer_status = ?3
                 WHERE product_id = ?4",
                params![
                    &product.name,
                    product.structure.as_str(),
                    product.transfer_status.as_str(),
                    id
                ],
            )?;
            self.store_references(conn, &product_type, id, &product.references)
        })
    }

    fn remove_product(&self, product: &Product) -> Result<()> {
        let id = parse_id(product.require_id()?)?;
        self.write("remove_product", |conn| {
            let product_type = self.stored_type(conn, id)?;
            let tables = self.tables(&product_type)?;
            conn.execute(
                &format!("DELETE FROM {} WHERE product_id = ?1", tables.reference),
                params![id],
            )?;
            self.delete_metadata(conn, &product_type, id)?;
            conn.execute("DELETE FROM products WHERE product_id = ?1", params![id])?;
            Ok(())
        })
    }

    fn set_product_transfer_status(&self, product: &Product) -> Result<()> {
        let id = parse_id(product.require_id()?)?;
        self.write("set_product_transfer_status", |conn| {
            let updated = conn.execute(
                "UPDATE products SET product_transfer_status = ?1 WHERE product_id = ?2",
                params![product.transfer_status.as_str(), id],
            )?;
            if updated == 0 {
                return Err(CatalogError::not_found("Product", id));
            }
            Ok(())
        })
    }

    fn add_metadata(&self, metadata: &Metadata, product: &Product) -> Result<()> {
        let id = parse_id(product.require_id()?)?;
        self.write("add_metadata", |conn| {
            let product_type = self.stored_type(conn, id)?;
            self.ensure_tables(conn, &product_type)?;
            let mut stored = self.load_metadata(conn, &product_type, id)?;
            stored.merge(&self.bridge.declared_metadata(&product_type, metadata)?);
            self.store_metadata(conn, &product_type, id, &stored)
        })
    }

    fn remove_metadata(&self, metadata: &Metadata, product: &Product) -> Result<()> {
        let id = parse_id(product.require_id()?)?;
        self.write("remove_metadata", |conn| {
            let product_type = self.stored_type(conn, id)?;
            self.ensure_tables(conn, &product_type)?;
            let mut stored = self.load_metadata(conn, &product_type, id)?;
            stored.remove_values(metadata);
            self.store_metadata(conn, &product_type, id, &stored)
        })
    }

    fn add_product_references(&self, product: &Product) -> Result<()> {
        let id = parse_id(product.require_id()?)?;
        self.write("add_product_references", |conn| {
            let product_type = self.stored_type(conn, id)?;
            self.store_references(conn, &product_type, id, &product.references)
        })
    }

    fn product_by_id(&self, product_id: &str) -> Result<Product> {
        let id = parse_id(product_id)?;
        self.read(|conn| self.load_product(conn, id))
    }

    fn product_by_name(&self, product_name: &str) -> Result<Product> {
        self.read(|conn| {
            let ids = select_ids(
                conn,
                "SELECT product_id FROM products WHERE product_name = ?",
                &[Value::Text(product_name.to_string())],
            )?;
            match ids.as_slice() {
                [] => Err(CatalogError::not_found("Product", product_name)),
                [id] => self.load_product(conn, *id),
                _ => Err(CatalogError::uniqueness(format!(
                    "{} products named '{}'",
                    ids.len(),
                    product_name
                ))),
            }
        })
    }

    fn product_references(&self, product: &Product) -> Result<Vec<Reference>> {
        let id = parse_id(product.require_id()?)?;
        self.read(|conn| {
            let product_type = self.stored_type(conn, id)?;
            self.load_references(conn, &product_type, id)
        })
    }

    fn products(&self) -> Result<Vec<Product>> {
        self.read(|conn| {
            let ids = select_ids(conn, &format!("SELECT product_id FROM products {}", NEWEST_FIRST), &[])?;
            self.load_products(conn, ids)
        })
    }

    fn products_by_type(&self, product_type: &ProductType) -> Result<Vec<Product>> {
        let product_type = self.bridge.resolve_type(product_type)?;
        self.read(|conn| {
            let ids = select_ids(
                conn,
                &format!(
                    "SELECT product_id FROM products WHERE product_type_id = ? {}",
                    NEWEST_FIRST
                ),
                &[Value::Text(product_type.id.clone())],
            )?;
            self.load_products(conn, ids)
        })
    }

    fn metadata(&self, product: &Product) -> Result<Metadata> {
        let id = parse_id(product.require_id()?)?;
        self.read(|conn| {
            let product_type = self.stored_type(conn, id)?;
            self.load_metadata(conn, &product_type, id)
        })
    }

    fn query(&self, query: &Query, product_type: &ProductType) -> Result<Vec<String>> {
        let (product_type, clause) = self.matching(query, product_type)?;
        let ids = self.read(|conn| {
            self.ensure_tables(conn, &product_type)?;
            select_ids(
                conn,
                &format!("SELECT product_id {} {}", clause.sql, NEWEST_FIRST),
                &clause.params,
            )
        })?;
        if ids.is_empty() {
            tracing::debug!(product_type = %product_type.name, "query matched no products");
        }
        Ok(ids.into_iter().map(|id| id.to_string()).collect())
    }

    fn paged_query(
        &self,
        query: &Query,
        product_type: &ProductType,
        page_num: i64,
    ) -> Result<ProductPage> {
        let (product_type, clause) = self.matching(query, product_type)?;
        self.read(|conn| {
            self.ensure_tables(conn, &product_type)?;
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) {}", clause.sql),
                params_from_iter(clause.params.iter()),
                |row| row.get(0),
            )?;
            let num_of_hits = usize::try_from(count).unwrap_or(0);

            let window = PageWindow::resolve(page_num, self.page_size, num_of_hits)?;
            let (offset, limit) = match window {
                PageWindow::Blank => return Ok(ProductPage::blank(self.page_size)),
                PageWindow::All => (0i64, -1i64),
                PageWindow::Slice { offset, .. } => (sql_count(offset), sql_count(self.page_size)),
            };

            let mut params = clause.params.clone();
            params.push(Value::Integer(limit));
            params.push(Value::Integer(offset));
            let ids = select_ids(
                conn,
                &format!("SELECT product_id {} {} LIMIT ? OFFSET ?", clause.sql, NEWEST_FIRST),
                &params,
            )?;
            let products = self.load_products(conn, ids)?;
            Ok(window.into_page(self.page_size, num_of_hits, products))
        })
    }

    fn top_n(&self, n: usize) -> Result<Vec<Product>> {
        self.read(|conn| {
            let ids = select_ids(
                conn,
                &format!("SELECT product_id FROM products {} LIMIT ?", NEWEST_FIRST),
                &[Value::Integer(sql_count(n))],
            )?;
            self.load_products(conn, ids)
        })
    }

    fn top_n_by_type(&self, n: usize, product_type: &ProductType) -> Result<Vec<Product>> {
        let product_type = self.bridge.resolve_type(product_type)?;
        self.read(|conn| {
            let ids = select_ids(
                conn,
                &format!(
                    "SELECT product_id FROM products WHERE product_type_id = ? {} LIMIT ?",
                    NEWEST_FIRST
                ),
                &[Value::Text(product_type.id.clone()), Value::Integer(sql_count(n))],
            )?;
            self.load_products(conn, ids)
        })
    }

    fn num_products(&self, product_type: &ProductType) -> Result<usize> {
        let product_type = self.bridge.resolve_type(product_type)?;
        self.read(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM products WHERE product_type_id = ?1",
                params![&product_type.id],
                |row| row.get(0),
            )?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }

    fn page_size(&self) -> usize {
        self.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Element;
    use crate::domain::query::QueryCriteria;
    use crate::error::ErrorKind;
    use crate::schema::{InMemoryRepository, InMemoryValidationLayer};
    use tempfile::TempDir;

    fn bridge() -> SchemaBridge {
        let validation = InMemoryValidationLayer::new()
            .with_element(Element::new("urn:e:Filename", "Filename"))
            .with_element(Element::new("urn:e:Keyword", "Keyword"))
            .declare("urn:t:Generic", &["Filename", "Keyword"]);
        let repository =
            InMemoryRepository::new().with_type(ProductType::new("urn:t:Generic", "Generic"));
        SchemaBridge::new(Arc::new(validation), Arc::new(repository))
    }

    fn generic() -> ProductType {
        ProductType::named("Generic")
    }

    #[test]
    fn test_add_and_fetch_product() {
        let catalog = SqliteCatalog::in_memory(Layout::Narrow, bridge(), 10).unwrap();
        let mut product = Product::new("a.dat", generic())
            .with_reference(Reference::new("file:///in/a.dat", "", 12).with_mime_type("text/plain"));
        catalog.add_product(&mut product).unwrap();

        let id = product.id.clone().unwrap();
        let fetched = catalog.product_by_id(&id).unwrap();
        assert_eq!(fetched, product);
        assert_eq!(fetched.product_type.id, "urn:t:Generic");
        assert_eq!(catalog.product_by_name("a.dat").unwrap().id, Some(id));
    }

    #[test]
    fn test_add_rejects_existing_id() {
        let catalog = SqliteCatalog::in_memory(Layout::Narrow, bridge(), 10).unwrap();
        let mut product = Product::new("a", generic());
        catalog.add_product(&mut product).unwrap();
        let err = catalog.add_product(&mut product).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UniquenessViolation);
    }

    #[test]
    fn test_unknown_type_is_schema_error() {
        let catalog = SqliteCatalog::in_memory(Layout::Narrow, bridge(), 10).unwrap();
        let mut product = Product::new("a", ProductType::named("Unregistered"));
        assert_eq!(
            catalog.add_product(&mut product).unwrap_err().kind,
            ErrorKind::Schema
        );
    }

    #[test]
    fn test_metadata_merge_preserved_by_modify() {
        for layout in [Layout::Narrow, Layout::wide(["Keyword"])] {
            let catalog = SqliteCatalog::in_memory(layout, bridge(), 10).unwrap();
            let mut product = Product::new("a", generic());
            catalog.add_product(&mut product).unwrap();

            let md: Metadata = [("Filename", "a.dat"), ("Keyword", "x"), ("Keyword", "y")]
                .into_iter()
                .collect();
            catalog.add_metadata(&md, &product).unwrap();
            catalog.add_metadata(&md, &product).unwrap();

            product.name = "renamed".into();
            product.references = vec![Reference::new("file:///a", "file:///archive/a", 1)];
            catalog.modify_product(&product).unwrap();

            let stored = catalog.metadata(&product).unwrap();
            assert_eq!(stored, md);
            assert_eq!(catalog.product_by_id(product.id.as_deref().unwrap()).unwrap().name, "renamed");
            assert_eq!(catalog.product_references(&product).unwrap().len(), 1);

            catalog
                .remove_metadata(&[("Keyword", "x")].into_iter().collect(), &product)
                .unwrap();
            assert_eq!(
                catalog.metadata(&product).unwrap().get("Keyword").unwrap(),
                &["y"]
            );
        }
    }

    #[test]
    fn test_huge_page_size_and_limit() {
        let catalog = SqliteCatalog::in_memory(Layout::Narrow, bridge(), usize::MAX).unwrap();
        for name in ["a", "b", "c"] {
            let mut product = Product::new(name, generic());
            catalog.add_product(&mut product).unwrap();
        }
        let page = catalog.paged_query(&Query::new(), &generic(), 1).unwrap();
        assert_eq!(page.products.len(), 3);
        assert_eq!(page.total_pages, 1);
        assert_eq!(catalog.top_n(usize::MAX).unwrap().len(), 3);
    }

    #[test]
    fn test_remove_product() {
        let catalog = SqliteCatalog::in_memory(Layout::Narrow, bridge(), 10).unwrap();
        let mut product = Product::new("a", generic());
        catalog.add_product(&mut product).unwrap();
        catalog
            .add_metadata(&[("Filename", "a")].into_iter().collect(), &product)
            .unwrap();
        catalog.remove_product(&product).unwrap();

        let id = product.id.as_deref().unwrap();
        assert!(catalog.product_by_id(id).unwrap_err().is_not_found());
        assert_eq!(catalog.num_products(&generic()).unwrap(), 0);
        assert!(catalog.remove_product(&product).unwrap_err().is_not_found());
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let catalog = SqliteCatalog::in_memory(Layout::Narrow, bridge(), 10).unwrap();
        let mut product = Product::new("a", generic());
        catalog.add_product(&mut product).unwrap();

        let result: Result<()> = catalog.write("test", |conn| {
            conn.execute("DELETE FROM products", [])?;
            Err(CatalogError::internal("boom"))
        });
        assert_eq!(result.unwrap_err().message, "boom");
        assert_eq!(catalog.num_products(&generic()).unwrap(), 1);
    }

    #[test]
    fn test_query_rejects_undeclared_element_before_execution() {
        let catalog = SqliteCatalog::in_memory(Layout::Narrow, bridge(), 10).unwrap();
        let query = Query::with_criteria(vec![QueryCriteria::term("Bogus", "1")]);
        assert_eq!(
            catalog.query(&query, &generic()).unwrap_err().kind,
            ErrorKind::Schema
        );
    }

    #[test]
    fn test_file_backed_catalog_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.db");
        let id = {
            let catalog = SqliteCatalog::new(&path, Layout::Narrow, bridge(), 10).unwrap();
            let mut product = Product::new("a", generic());
            catalog.add_product(&mut product).unwrap();
            catalog
                .add_metadata(&[("Filename", "a.dat")].into_iter().collect(), &product)
                .unwrap();
            product.id.unwrap()
        };

        let reopened = SqliteCatalog::new(&path, Layout::Narrow, bridge(), 10).unwrap();
        let query = Query::with_criteria(vec![QueryCriteria::term("Filename", "a.dat")]);
        assert_eq!(reopened.query(&query, &generic()).unwrap(), vec![id]);
    }
}
