//! Error types for KPC tooling

use thiserror::Error;

/// Result type for KPC operations
pub type Result<T> = std::result::Result<T, KpcError>;

/// KPC error types
///
/// Resolution misses are not errors: the engine reports them as `None` or an
/// empty list. These variants cover the layers around it.
#[derive(Error, Debug)]
pub enum KpcError {
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Workspace walk error: {0}")]
    Walk(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(String),
}

impl From<serde_yaml::Error> for KpcError {
    fn from(err: serde_yaml::Error) -> Self {
        KpcError::Yaml(err.to_string())
    }
}

impl From<walkdir::Error> for KpcError {
    fn from(err: walkdir::Error) -> Self {
        KpcError::Walk(err.to_string())
    }
}
