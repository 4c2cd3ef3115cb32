//! Configuration error types

use thiserror::Error;

/// Configuration error type
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Range validation error
    #[error("Invalid range for field '{field}': {value} not in {min}..={max}. {hint}")]
    Range {
        field: String,
        value: String,
        min: String,
        max: String,
        hint: String,
    },

    /// Missing version field in YAML
    #[error("Missing 'version' field in configuration file. Add 'version: 1' to the top of your YAML file.")]
    MissingVersion,

    /// Unsupported version
    #[error("Unsupported configuration version {found}. Supported versions: {}", supported.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", "))]
    UnsupportedVersion { found: u32, supported: Vec<u32> },

    /// Backend name with no registered constructor
    #[error("Unknown catalog backend '{name}'. Registered backends: {}", known.join(", "))]
    UnknownBackend { name: String, known: Vec<String> },

    /// Backend needs a collaborator the caller did not supply
    #[error("Backend '{backend}' requires {requirement}")]
    MissingCollaborator {
        backend: String,
        requirement: String,
    },

    /// Backend constructor failed
    #[error("Backend initialization failed: {0}")]
    Backend(#[from] crate::error::CatalogError),

    /// Schema document inconsistency
    #[error("Validation error: {0}")]
    Validation(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
