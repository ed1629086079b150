//! Error handling module for stackctl
//!
//! Provides the crate-level error type for the plumbing layers (process
//! execution, SQL, configuration, manifests). The reconciler and the snapshot
//! manager wrap these into their own taxonomies at their boundaries, so a raw
//! `StackError` never reaches a caller of those components.

use thiserror::Error;

/// Main error type for the plumbing layers
#[derive(Error, Debug)]
pub enum StackError {
    /// IO errors (file operations, spawning processes)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors (loading, parsing, validation)
    #[error("Configuration error: {0}")]
    Config(String),

    /// External command errors (non-zero exit, missing binary)
    #[error("Process error: {0}")]
    Process(String),

    /// SQL execution errors reported by the database channel
    #[error("SQL error: {0}")]
    Sql(String),

    /// Unit manifest lookup and parsing errors
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// A unit is unknown to the application's catalog
    #[error("Unit not found in catalog: {0}")]
    NotFound(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for plumbing operations
pub type Result<T> = std::result::Result<T, StackError>;

impl StackError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a process error
    pub fn process(msg: impl Into<String>) -> Self {
        Self::Process(msg.into())
    }

    /// Create a SQL error
    pub fn sql(msg: impl Into<String>) -> Self {
        Self::Sql(msg.into())
    }

    /// Create a manifest error
    pub fn manifest(msg: impl Into<String>) -> Self {
        Self::Manifest(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StackError::config("database name must not be empty");
        assert_eq!(
            err.to_string(),
            "Configuration error: database name must not be empty"
        );

        let err = StackError::NotFound("sale".into());
        assert_eq!(err.to_string(), "Unit not found in catalog: sale");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: StackError = io_err.into();
        assert!(matches!(err, StackError::Io(_)));
    }

    #[test]
    fn test_error_constructors() {
        assert!(matches!(StackError::process("exit 1"), StackError::Process(_)));
        assert!(matches!(StackError::sql("syntax"), StackError::Sql(_)));
        assert!(matches!(StackError::manifest("bad"), StackError::Manifest(_)));
    }
}
