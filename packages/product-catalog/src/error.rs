//! Error types for product-catalog

use std::fmt;
use thiserror::Error;

/// Catalog error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Backend unreachable (database cannot be opened, index directory unusable)
    Connection,
    /// Unknown element name referenced, or a product type that cannot be resolved
    Schema,
    /// Malformed DSL text or malformed criteria tree
    QueryFormulation,
    /// Lookup by id/name yields nothing
    NotFound,
    /// Duplicate id insert, or a name lookup matching more than one record
    UniquenessViolation,
    /// Commit failed; wraps the underlying backend error
    Transaction,
    /// Serialization/deserialization errors
    Serialization,
    /// Collaborator failures that fit no other kind
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Schema => "schema",
            ErrorKind::QueryFormulation => "query_formulation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::UniquenessViolation => "uniqueness_violation",
            ErrorKind::Transaction => "transaction",
            ErrorKind::Serialization => "serialization",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Catalog error type
#[derive(Debug, Error)]
#[error("[{kind}] {message}")]
pub struct CatalogError {
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
    pub kind: ErrorKind,
    pub message: String,
}

impl CatalogError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    // Convenience constructors
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Connection, message)
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Schema, message)
    }

    pub fn query_formulation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::QueryFormulation, message)
    }

    pub fn not_found(what: &str, key: impl fmt::Display) -> Self {
        Self::new(ErrorKind::NotFound, format!("{} not found: {}", what, key))
    }

    pub fn uniqueness(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UniquenessViolation, message)
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transaction, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Serialization, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}

// SQLite error conversions
#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for CatalogError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        let kind = match &err {
            rusqlite::Error::QueryReturnedNoRows => ErrorKind::NotFound,
            rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
                ErrorCode::ConstraintViolation => ErrorKind::UniquenessViolation,
                ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::PermissionDenied => ErrorKind::Connection,
                _ => ErrorKind::Transaction,
            },
            _ => ErrorKind::Transaction,
        };
        CatalogError::new(kind, format!("SQLite error: {}", err)).with_source(err)
    }
}

// Index error conversions
#[cfg(feature = "index")]
impl From<tantivy::TantivyError> for CatalogError {
    fn from(err: tantivy::TantivyError) -> Self {
        CatalogError::connection(format!("Index error: {}", err)).with_source(err)
    }
}

// JSON error conversions
impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::serialization(format!("JSON error: {}", err)).with_source(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    // ═══════════════════════════════════════════════════════════════════════
    // Error Construction Tests
    // ═══════════════════════════════════════════════════════════════════════

    #[test]
    fn test_error_display() {
        let err = CatalogError::not_found("Product", "42");
        let msg = format!("{}", err);
        assert_eq!(msg, "[not_found] Product not found: 42");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_query_formulation_error() {
        let err = CatalogError::query_formulation("NOT requires exactly one term");
        assert_eq!(err.kind, ErrorKind::QueryFormulation);
        assert!(err.source.is_none());
        assert_eq!(
            format!("{}", err),
            "[query_formulation] NOT requires exactly one term"
        );
    }

    #[test]
    fn test_transaction_error() {
        let err = CatalogError::transaction("COMMIT failed");
        assert_eq!(err.kind, ErrorKind::Transaction);
        assert_eq!(format!("{}", err), "[transaction] COMMIT failed");
    }

    #[test]
    fn test_with_source() {
        use std::io;

        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err = CatalogError::connection("index directory missing").with_source(io_err);

        assert_eq!(err.kind, ErrorKind::Connection);
        let source = err.source().unwrap();
        assert!(source.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_kind_as_str() {
        assert_eq!(ErrorKind::Connection.as_str(), "connection");
        assert_eq!(ErrorKind::Schema.as_str(), "schema");
        assert_eq!(ErrorKind::QueryFormulation.as_str(), "query_formulation");
        assert_eq!(ErrorKind::NotFound.as_str(), "not_found");
        assert_eq!(
            ErrorKind::UniquenessViolation.as_str(),
            "uniqueness_violation"
        );
        assert_eq!(ErrorKind::Transaction.as_str(), "transaction");
        assert_eq!(ErrorKind::Serialization.as_str(), "serialization");
        assert_eq!(ErrorKind::Internal.as_str(), "internal");
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Conversion Tests
    // ═══════════════════════════════════════════════════════════════════════

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_from_rusqlite_no_rows() {
        let err: CatalogError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert!(err.message.contains("SQLite error"));
        assert!(err.source.is_some());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_from_rusqlite_constraint() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY)", [])
            .unwrap();
        conn.execute("INSERT INTO t (id) VALUES (1)", []).unwrap();
        let err: CatalogError = conn
            .execute("INSERT INTO t (id) VALUES (1)", [])
            .unwrap_err()
            .into();
        assert_eq!(err.kind, ErrorKind::UniquenessViolation);
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json")
            .err()
            .unwrap();
        let err: CatalogError = json_err.into();

        assert_eq!(err.kind, ErrorKind::Serialization);
        assert!(err.message.contains("JSON error"));
        assert!(err.source.is_some());
    }

    #[test]
    fn test_result_propagation() {
        fn inner() -> Result<()> {
            Err(CatalogError::schema("unknown element: Foo"))
        }

        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }

        let err = outer().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Schema);
    }
}
