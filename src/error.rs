//! Error types for the mirrored-volume operator
//!
//! Provides structured error types for request validation, topology
//! discovery, reconciliation decisions, and the array gateway.

use thiserror::Error;

/// Unified error type for the operator
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Request Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Reconciliation Errors
    // =========================================================================
    #[error("Topology conflict: {0}")]
    TopologyConflict(String),

    #[error("Unsupported transition: {0}")]
    UnsupportedTransition(String),

    // =========================================================================
    // Gateway Errors
    // =========================================================================
    #[error("Array rejected {command}: {message}")]
    Gateway { command: String, message: String },

    #[error("Object not found: {command}/{object}")]
    ObjectNotFound { command: String, object: String },

    #[error("Malformed {command} record: missing field '{field}'")]
    MalformedRecord { command: String, field: String },

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("Capacity parse error: {0}")]
    CapacityParse(String),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Check if this error means the queried object does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::ObjectNotFound { .. })
    }

    /// Check if this error is a transient transport failure worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Result type alias for the operator
pub type Result<T> = std::result::Result<T, Error>;
