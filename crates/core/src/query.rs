//! Queries, query customization and query listeners.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default bound on how long a non-stale query waits for indexing.
pub const DEFAULT_NON_STALE_TIMEOUT: Duration = Duration::from_secs(15);

/// What a query reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryTarget {
    /// Every committed document of a collection.
    Collection(String),
    /// The current entries of a built index.
    Index(String),
}

/// A query against a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    /// Source of the results.
    pub target: QueryTarget,
    /// Transformer applied to every hit.
    pub transformer: Option<String>,
}

impl Query {
    /// Query a collection.
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            target: QueryTarget::Collection(name.into()),
            transformer: None,
        }
    }

    /// Query an index.
    pub fn index(name: impl Into<String>) -> Self {
        Self {
            target: QueryTarget::Index(name.into()),
            transformer: None,
        }
    }

    /// Apply a transformer to the results.
    pub fn transform_with(mut self, transformer: impl Into<String>) -> Self {
        self.transformer = Some(transformer.into());
        self
    }
}

/// Per-query knobs that listeners may adjust before execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryCustomization {
    wait_for_non_stale_results: bool,
    timeout: Duration,
}

impl Default for QueryCustomization {
    fn default() -> Self {
        Self {
            wait_for_non_stale_results: false,
            timeout: DEFAULT_NON_STALE_TIMEOUT,
        }
    }
}

impl QueryCustomization {
    /// Block until the queried index has caught up.
    pub fn wait_for_non_stale_results(&mut self) -> &mut Self {
        self.wait_for_non_stale_results = true;
        self
    }

    /// Bound the non-stale wait.
    pub fn with_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// Whether the query must see non-stale results.
    pub fn waits_for_non_stale_results(&self) -> bool {
        self.wait_for_non_stale_results
    }

    /// Bound on the non-stale wait.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Hook invoked before every query issued through a store's sessions.
pub trait QueryListener: Send + Sync {
    /// Adjust the query before it runs.
    fn before_query(&self, customization: &mut QueryCustomization);
}

/// One query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryHit {
    /// Source document; `None` for reduce results.
    pub id: Option<String>,
    /// Result body.
    pub body: Value,
}

/// Query results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Hits in result order.
    pub hits: Vec<QueryHit>,
    /// Whether the index had not caught up when the query ran.
    pub is_stale: bool,
}
