//! Error types for the harness.
//!
//! All harness failures are represented by the [`HarnessError`] enum.
//! Errors are `Clone` so that a single failed construction can be reported
//! to every caller that was waiting on it.

use std::time::Duration;

use seedbed_core::{ServerError, StoreError};

/// Result type alias for harness operations.
pub type HarnessResult<T> = std::result::Result<T, HarnessError>;

/// Harness errors.
///
/// # Categories
///
/// | Category | Variants | Description |
/// |----------|----------|-------------|
/// | Lifecycle | `ConfigurationLocked`, `Disposed`, `InitializationPanicked` | Harness state |
/// | Validation | `InvalidIndexDescriptor`, `InvalidSettings` | Bad configuration |
/// | Store | `Connect`, `Commit`, `Store` | Propagated from the store unmodified |
/// | Assertion | `ServerReportedErrors`, `StaleIndexTimeout` | Store state checks |
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HarnessError {
    // ==================== Lifecycle ====================
    /// A configuration field was set after the store was constructed.
    #[error("configuration locked: cannot set '{field}' after the document store has been created")]
    ConfigurationLocked { field: &'static str },

    /// The harness has been closed.
    #[error("harness has been disposed")]
    Disposed,

    /// The initializer panicked; the harness cannot be used.
    #[error("document store initialization panicked")]
    InitializationPanicked,

    // ==================== Validation ====================
    /// A descriptor names neither an index nor a transformer definition.
    #[error("invalid index descriptor '{descriptor}': not an index or transformer definition")]
    InvalidIndexDescriptor { descriptor: String },

    /// Harness settings could not be read or parsed.
    #[error("invalid settings: {reason}")]
    InvalidSettings { reason: String },

    // ==================== Store ====================
    /// The store failed to initialize/connect.
    #[error("connect failed: {0}")]
    Connect(#[source] StoreError),

    /// Seed data failed to commit.
    #[error("seed commit failed: {0}")]
    Commit(#[source] StoreError),

    /// Any other store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    // ==================== Assertion ====================
    /// The store reported document/index errors.
    #[error("document store reported {} server error(s):\n{}", .errors.len(), ServerError::format_all(.errors))]
    ServerReportedErrors { errors: Vec<ServerError> },

    /// Indexes did not catch up within the configured bound.
    #[error("indexes still stale after {waited:?}: {}", .indexes.join(", "))]
    StaleIndexTimeout { waited: Duration, indexes: Vec<String> },
}

impl HarnessError {
    /// Create an invalid-settings error.
    pub fn invalid_settings(reason: impl Into<String>) -> Self {
        HarnessError::InvalidSettings {
            reason: reason.into(),
        }
    }
}
