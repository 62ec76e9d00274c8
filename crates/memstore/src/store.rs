//! In-memory document store connection and connector.
//!
//! # Usage
//!
//! ```ignore
//! use seedbed_core::{DocumentStore, SessionExt};
//! use seedbed_memstore::MemoryStore;
//!
//! let store = MemoryStore::new();
//! store.initialize()?;
//!
//! let session = store.open_session()?;
//! let id = session.store("Users", serde_json::json!({ "Name": "Ada" }))?;
//! session.commit()?;
//! ```

use once_cell::sync::OnceCell;
use seedbed_core::{
    ConnectionSettings, DatabaseStatistics, DocumentSession, DocumentStore, IndexDefinition,
    QueryListener, StoreConnector, StoreError, StoreResult, TransformerDefinition, DEFAULT_TENANT,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

use crate::database::Database;
use crate::registry::MemoryServer;
use crate::session::{ConnectionState, MemorySession};

/// Connection to an in-memory server.
///
/// Created unconnected; [`initialize`](DocumentStore::initialize) attaches
/// it to its tenant database and starts that database's indexer.
pub struct MemoryStore {
    server: Arc<MemoryServer>,
    tenant: String,
    database: OnceCell<Arc<Database>>,
    connection: Arc<ConnectionState>,
}

impl MemoryStore {
    /// Private store on the default tenant.
    pub fn new() -> Self {
        Self::with_tenant(DEFAULT_TENANT)
    }

    /// Private store on `tenant`.
    pub fn with_tenant(tenant: impl Into<String>) -> Self {
        Self::on_server(MemoryServer::private(), tenant.into())
    }

    /// Store on the shared server registered for `settings.url()`.
    pub fn connect(settings: &ConnectionSettings) -> Self {
        Self::on_server(MemoryServer::shared(settings.url()), settings.tenant().to_string())
    }

    fn on_server(server: Arc<MemoryServer>, tenant: String) -> Self {
        Self {
            server,
            tenant,
            database: OnceCell::new(),
            connection: Arc::new(ConnectionState::default()),
        }
    }

    /// URL of the shared server, `None` for a private store.
    pub fn url(&self) -> Option<&str> {
        self.server.url()
    }

    /// Stop background indexing on this store's tenant.
    ///
    /// Commits still succeed, but indexes stay stale until
    /// [`resume_indexing`](Self::resume_indexing).
    pub fn pause_indexing(&self) -> StoreResult<()> {
        self.database()?.pause_indexing();
        Ok(())
    }

    /// Resume background indexing on this store's tenant.
    pub fn resume_indexing(&self) -> StoreResult<()> {
        self.database()?.resume_indexing();
        Ok(())
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.connection.closed.load(Ordering::Acquire) {
            return Err(StoreError::closed("document store"));
        }
        Ok(())
    }

    fn database(&self) -> StoreResult<&Arc<Database>> {
        self.ensure_open()?;
        self.database.get().ok_or(StoreError::NotInitialized)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryStore {
    fn tenant(&self) -> &str {
        &self.tenant
    }

    fn initialize(&self) -> StoreResult<()> {
        self.ensure_open()?;
        self.database
            .get_or_try_init(|| {
                let db = self.server.database(&self.tenant)?;
                info!(
                    target: "seedbed::memstore",
                    tenant = %self.tenant,
                    url = self.server.url().unwrap_or("<private>"),
                    "Opened in-memory database"
                );
                Ok::<_, StoreError>(db)
            })
            .map(|_| ())
    }

    fn build_index(&self, definition: Arc<dyn IndexDefinition>) -> StoreResult<()> {
        self.database()?.build_index(definition);
        Ok(())
    }

    fn build_transformer(&self, definition: Arc<dyn TransformerDefinition>) -> StoreResult<()> {
        self.database()?.build_transformer(definition);
        Ok(())
    }

    fn open_session(&self) -> StoreResult<Arc<dyn DocumentSession>> {
        let db = Arc::clone(self.database()?);
        Ok(Arc::new(MemorySession::new(db, Arc::clone(&self.connection))))
    }

    fn open_session_for(&self, tenant: &str) -> StoreResult<Arc<dyn DocumentSession>> {
        self.database()?;
        let db = self.server.database(tenant)?;
        Ok(Arc::new(MemorySession::new(db, Arc::clone(&self.connection))))
    }

    fn statistics(&self) -> StoreResult<DatabaseStatistics> {
        Ok(self.database()?.statistics())
    }

    fn register_query_listener(&self, listener: Arc<dyn QueryListener>) {
        self.connection.listeners.write().push(listener);
    }

    fn close(&self) -> StoreResult<()> {
        self.connection.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.connection.closed.load(Ordering::Acquire)
    }
}

/// Connector producing [`MemoryStore`]s.
///
/// Without settings each connection gets its own private server; with
/// settings, connections to the same URL share one server.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryConnector;

impl StoreConnector for MemoryConnector {
    fn connect(&self, settings: Option<&ConnectionSettings>) -> StoreResult<Arc<dyn DocumentStore>> {
        let store = match settings {
            Some(settings) => MemoryStore::connect(settings),
            None => MemoryStore::new(),
        };
        Ok(Arc::new(store))
    }
}
