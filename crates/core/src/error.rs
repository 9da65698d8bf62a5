//! Error types for the domain object store
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use thiserror::Error;

/// Result type alias for domain store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the domain object store
#[derive(Debug, Error)]
pub enum Error {
    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A type name that is not in the closed domain type registry
    ///
    /// This is a configuration/programmer error and is never absorbed.
    #[error("Unknown domain type: {0}")]
    UnknownDomainType(String),

    /// A collection name that no registered domain type maps to
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    /// Stored document violates a construction invariant (e.g. null owner
    /// or null reader/writer set)
    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    /// Caller supplied bad input (e.g. malformed reorder index array)
    ///
    /// The message is a caller-facing contract and must stay matchable.
    #[error("{0}")]
    Validation(String),

    /// A write was rejected by a per-collection unique index
    #[error("Duplicate key for unique index {collection}.{field}: {value}")]
    DuplicateKey {
        /// Collection holding the unique index
        collection: String,
        /// Indexed field
        field: String,
        /// Rejected value, rendered as JSON
        value: String,
    },

    /// Storage layer error (unreachable store, corrupt document, etc.)
    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
