//! Core traits for the document store abstraction.
//!
//! This module defines the DocumentStore, DocumentSession and StoreConnector
//! traits that let the harness run unchanged against the embedded in-memory
//! store or any other backend.

use std::sync::Arc;

use serde_json::Value;

use crate::connection::ConnectionSettings;
use crate::definition::{IndexDefinition, TransformerDefinition};
use crate::document::Document;
use crate::error::StoreResult;
use crate::query::{Query, QueryListener, QueryResult};
use crate::stats::DatabaseStatistics;

/// A document store connection.
///
/// Thread safety: all methods must be safe to call concurrently from
/// multiple threads (requires Send + Sync). Sessions opened from the store
/// may be used concurrently with each other.
pub trait DocumentStore: Send + Sync {
    /// Tenant (database) this store talks to by default.
    fn tenant(&self) -> &str;

    /// Low-level initialization (connect/handshake).
    ///
    /// Calling it again on an initialized store is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `Connect` if the backend cannot be reached and `Closed` if the
    /// store was already closed.
    fn initialize(&self) -> StoreResult<()>;

    /// Build an index; building an index that already exists is a no-op.
    fn build_index(&self, definition: Arc<dyn IndexDefinition>) -> StoreResult<()>;

    /// Build a transformer; building one that already exists is a no-op.
    fn build_transformer(&self, definition: Arc<dyn TransformerDefinition>) -> StoreResult<()>;

    /// Open a session on the default tenant.
    fn open_session(&self) -> StoreResult<Arc<dyn DocumentSession>>;

    /// Open a session on another tenant of the same server.
    fn open_session_for(&self, tenant: &str) -> StoreResult<Arc<dyn DocumentSession>>;

    /// Statistics for the default tenant.
    fn statistics(&self) -> StoreResult<DatabaseStatistics>;

    /// Register a listener invoked before every query from this store's sessions.
    fn register_query_listener(&self, listener: Arc<dyn QueryListener>);

    /// Close the connection.
    ///
    /// Closing twice is a no-op. Sessions opened from a closed store fail to commit.
    fn close(&self) -> StoreResult<()>;

    /// Whether [`close`](Self::close) has been called.
    fn is_closed(&self) -> bool;
}

/// A unit of work against a store.
///
/// Writes are buffered until [`commit`](Self::commit). Identifiers are
/// assigned when an entity is stored, not when it is committed.
pub trait DocumentSession: Send + Sync {
    /// Store a new document in `collection`, returning its assigned identifier.
    fn store(&self, collection: &str, body: Value) -> StoreResult<String>;

    /// Store a document under an explicit identifier, replacing any existing one.
    fn store_with_id(&self, id: &str, collection: &str, body: Value) -> StoreResult<()>;

    /// Load a document, seeing this session's own pending writes.
    fn load(&self, id: &str) -> StoreResult<Option<Document>>;

    /// Run a query against committed data.
    fn query(&self, query: &Query) -> StoreResult<QueryResult>;

    /// Apply every pending write as one transaction.
    fn commit(&self) -> StoreResult<()>;

    /// Discard pending writes and release the session; closing twice is a no-op.
    fn close(&self) -> StoreResult<()>;
}

/// Creates store connections from optional connection settings.
///
/// `None` selects the backend's embedded/in-memory mode.
pub trait StoreConnector: Send + Sync {
    /// Create a store (not yet initialized).
    fn connect(&self, settings: Option<&ConnectionSettings>) -> StoreResult<Arc<dyn DocumentStore>>;
}
