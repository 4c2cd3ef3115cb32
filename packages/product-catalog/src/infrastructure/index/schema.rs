//! Index schema
//!
//! One document per complete product:
//!
//! | field                 | options            | content                         |
//! |-----------------------|--------------------|---------------------------------|
//! | `product_id`          | raw, STORED        | catalog id (delete key)         |
//! | `product_name`        | raw, STORED        |                                 |
//! | `product_type_id`     | raw, STORED        | type restriction                |
//! | `product_type_name`   | raw, STORED        |                                 |
//! | `product_structure`   | raw, STORED        |                                 |
//! | `transfer_status`     | raw, STORED        |                                 |
//! | `received_time`       | i64, STORED        | epoch millis                    |
//! | `metadata`            | raw, NOT STORED    | `element\u{1f}value` terms      |
//! | `metadata_json`       | STORED only        | full metadata                   |
//! | `references_json`     | STORED only        | ordered references              |

use tantivy::schema::{
    Field, IndexRecordOption, Schema, TextFieldIndexing, TextOptions, STORED,
};

use crate::error::Result;

pub const FIELD_PRODUCT_ID: &str = "product_id";
pub const FIELD_PRODUCT_NAME: &str = "product_name";
pub const FIELD_PRODUCT_TYPE_ID: &str = "product_type_id";
pub const FIELD_PRODUCT_TYPE_NAME: &str = "product_type_name";
pub const FIELD_STRUCTURE: &str = "product_structure";
pub const FIELD_TRANSFER_STATUS: &str = "transfer_status";
pub const FIELD_RECEIVED_TIME: &str = "received_time";
pub const FIELD_METADATA: &str = "metadata";
pub const FIELD_METADATA_JSON: &str = "metadata_json";
pub const FIELD_REFERENCES_JSON: &str = "references_json";

/// Separates element name and value inside a `metadata` term
pub const TERM_SEPARATOR: char = '\u{1f}';

/// First character after [`TERM_SEPARATOR`]; exclusive upper bound of an element's terms
const TERM_SEPARATOR_END: char = '\u{20}';

/// `element\u{1f}value`
pub fn metadata_term(element: &str, value: &str) -> String {
    format!("{}{}{}", element, TERM_SEPARATOR, value)
}

/// Inclusive lower bound of every term of `element`
pub fn element_lower_bound(element: &str) -> String {
    format!("{}{}", element, TERM_SEPARATOR)
}

/// Exclusive upper bound of every term of `element`
pub fn element_upper_bound(element: &str) -> String {
    format!("{}{}", element, TERM_SEPARATOR_END)
}

/// Build the product index schema
pub fn build_schema() -> Schema {
    let mut schema_builder = Schema::builder();

    let keyword = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer("raw")
            .set_index_option(IndexRecordOption::Basic),
    );
    let stored_keyword = keyword.clone().set_stored();

    schema_builder.add_text_field(FIELD_PRODUCT_ID, stored_keyword.clone());
    schema_builder.add_text_field(FIELD_PRODUCT_NAME, stored_keyword.clone());
    schema_builder.add_text_field(FIELD_PRODUCT_TYPE_ID, stored_keyword.clone());
    schema_builder.add_text_field(FIELD_PRODUCT_TYPE_NAME, stored_keyword.clone());
    schema_builder.add_text_field(FIELD_STRUCTURE, stored_keyword.clone());
    schema_builder.add_text_field(FIELD_TRANSFER_STATUS, stored_keyword);
    schema_builder.add_i64_field(FIELD_RECEIVED_TIME, STORED);

    // Searchable only
    schema_builder.add_text_field(FIELD_METADATA, keyword);

    // Hydration only
    schema_builder.add_text_field(FIELD_METADATA_JSON, STORED);
    schema_builder.add_text_field(FIELD_REFERENCES_JSON, STORED);

    schema_builder.build()
}

/// Field handles
#[derive(Debug, Clone)]
pub struct IndexFields {
    pub schema: Schema,
    pub product_id: Field,
    pub product_name: Field,
    pub product_type_id: Field,
    pub product_type_name: Field,
    pub structure: Field,
    pub transfer_status: Field,
    pub received_time: Field,
    pub metadata: Field,
    pub metadata_json: Field,
    pub references_json: Field,
}

impl IndexFields {
    /// Resolve handles from an index schema (fails on foreign indexes)
    pub fn from_schema(schema: Schema) -> Result<Self> {
        Ok(Self {
            product_id: schema.get_field(FIELD_PRODUCT_ID)?,
            product_name: schema.get_field(FIELD_PRODUCT_NAME)?,
            product_type_id: schema.get_field(FIELD_PRODUCT_TYPE_ID)?,
            product_type_name: schema.get_field(FIELD_PRODUCT_TYPE_NAME)?,
            structure: schema.get_field(FIELD_STRUCTURE)?,
            transfer_status: schema.get_field(FIELD_TRANSFER_STATUS)?,
            received_time: schema.get_field(FIELD_RECEIVED_TIME)?,
            metadata: schema.get_field(FIELD_METADATA)?,
            metadata_json: schema.get_field(FIELD_METADATA_JSON)?,
            references_json: schema.get_field(FIELD_REFERENCES_JSON)?,
            schema,
        })
    }
}
