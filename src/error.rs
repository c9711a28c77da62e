//! Error types for ShelfDB
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using ShelfError
pub type Result<T> = std::result::Result<T, ShelfError>;

/// Unified error type for ShelfDB operations
#[derive(Debug, Error)]
pub enum ShelfError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    // -------------------------------------------------------------------------
    // Routing / Ingest Errors
    // -------------------------------------------------------------------------
    #[error("{0} not found in record")]
    MissingPartitionField(String),

    #[error("Invalid record id: {0:?}")]
    InvalidRecordId(String),

    #[error("Invalid value in field {field}: {value}")]
    InvalidValue { field: String, value: String },

    // -------------------------------------------------------------------------
    // Catalog Errors
    // -------------------------------------------------------------------------
    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ShelfError {
    /// True for `NotFound`, including I/O errors of kind `NotFound`
    pub fn is_not_found(&self) -> bool {
        match self {
            ShelfError::NotFound(_) => true,
            ShelfError::Io(e) => e.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }
}
