//! Error types for the document store interface.
//!
//! Every backend reports failures through [`StoreError`].
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors reported by a document store or one of its sessions.
///
/// The variants carry plain strings so the error is `Clone` and can be
/// handed to every caller that observes a single failed operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be initialized or reached.
    #[error("Connect error: {0}")]
    Connect(String),

    /// A unit of work failed to commit.
    #[error("Commit error: {0}")]
    Commit(String),

    /// The store has not been initialized yet.
    #[error("Document store has not been initialized")]
    NotInitialized,

    /// The store or session has already been closed.
    #[error("Closed: {0}")]
    Closed(String),

    /// A named document, index or transformer does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A document body was rejected.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Connection settings were rejected.
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    /// A query could not be answered.
    #[error("Query error: {0}")]
    Query(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A bounded wait expired.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Internal error (bug or invariant violation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Create a connect error.
    pub fn connect(reason: impl Into<String>) -> Self {
        StoreError::Connect(reason.into())
    }

    /// Create a commit error.
    pub fn commit(reason: impl Into<String>) -> Self {
        StoreError::Commit(reason.into())
    }

    /// Create a closed error naming what was closed.
    pub fn closed(what: impl Into<String>) -> Self {
        StoreError::Closed(what.into())
    }

    /// Create a not-found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        StoreError::NotFound(what.into())
    }

    /// Create an invalid-settings error.
    pub fn invalid_settings(reason: impl Into<String>) -> Self {
        StoreError::InvalidSettings(reason.into())
    }

    /// Create an internal error.
    pub fn internal(reason: impl Into<String>) -> Self {
        StoreError::Internal(reason.into())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
