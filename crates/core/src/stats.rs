//! Store statistics and server-reported errors.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An error the store recorded while indexing or transforming a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Document being processed, if any.
    pub document_id: Option<String>,
    /// Index or transformer that failed, if any.
    pub index_name: Option<String>,
    /// Failure message.
    pub message: String,
}

impl ServerError {
    /// Create a server error.
    pub fn new(
        document_id: Option<String>,
        index_name: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            document_id,
            index_name,
            message: message.into(),
        }
    }

    /// Format a list of errors, one per line.
    pub fn format_all(errors: &[ServerError]) -> String {
        errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

fn or_placeholder<'a>(value: Option<&'a str>, placeholder: &'a str) -> &'a str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => placeholder,
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Document: {}; Index: {}; Error: {}",
            or_placeholder(self.document_id.as_deref(), "No Document Id"),
            or_placeholder(self.index_name.as_deref(), "No Index"),
            or_placeholder(Some(self.message.as_str()), "No Error message"),
        )
    }
}

/// Point-in-time statistics for one tenant database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseStatistics {
    /// Tenant (database) name.
    pub tenant: String,
    /// Stored documents, including store bookkeeping documents.
    pub document_count: u64,
    /// Built indexes.
    pub index_count: usize,
    /// Built transformers.
    pub transformer_count: usize,
    /// Names of indexes that have not caught up with the latest commit.
    pub stale_indexes: Vec<String>,
    /// Errors recorded by the store.
    pub errors: Vec<ServerError>,
}
