//! Metadata/schema bridge and in-memory collaborators

pub mod bridge;
pub mod memory;

pub use bridge::SchemaBridge;
pub use memory::{InMemoryRepository, InMemoryValidationLayer, ProductTypeEntry, SchemaDocument};
