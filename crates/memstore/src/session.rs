//! Unit-of-work sessions over a tenant database.

use parking_lot::{Mutex, RwLock};
use seedbed_core::{
    Document, DocumentSession, Query, QueryCustomization, QueryListener, QueryResult, StoreError,
    StoreResult,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::database::{Database, PendingWrite};

/// State shared between a store connection and the sessions it opened.
#[derive(Default)]
pub(crate) struct ConnectionState {
    pub(crate) closed: AtomicBool,
    pub(crate) listeners: RwLock<Vec<Arc<dyn QueryListener>>>,
}

impl ConnectionState {
    fn customization(&self) -> QueryCustomization {
        let mut customization = QueryCustomization::default();
        for listener in self.listeners.read().iter() {
            listener.before_query(&mut customization);
        }
        customization
    }
}

/// A session on one tenant database.
///
/// Writes are buffered until [`commit`](DocumentSession::commit) and then
/// applied as one batch.
pub struct MemorySession {
    database: Arc<Database>,
    connection: Arc<ConnectionState>,
    pending: Mutex<Vec<PendingWrite>>,
    closed: AtomicBool,
}

impl MemorySession {
    pub(crate) fn new(database: Arc<Database>, connection: Arc<ConnectionState>) -> Self {
        Self {
            database,
            connection,
            pending: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Tenant this session writes to.
    pub fn tenant(&self) -> &str {
        self.database.tenant()
    }

    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::closed("session"));
        }
        if self.connection.closed.load(Ordering::Acquire) {
            return Err(StoreError::closed("document store"));
        }
        Ok(())
    }

    fn validate(collection: &str, body: &Value) -> StoreResult<()> {
        if collection.trim().is_empty() {
            return Err(StoreError::InvalidDocument(
                "collection name must not be blank".to_string(),
            ));
        }
        if !body.is_object() {
            return Err(StoreError::InvalidDocument(format!(
                "documents in '{}' must be JSON objects",
                collection
            )));
        }
        Ok(())
    }
}

impl DocumentSession for MemorySession {
    fn store(&self, collection: &str, body: Value) -> StoreResult<String> {
        self.ensure_open()?;
        Self::validate(collection, &body)?;
        let id = self.database.next_identity(collection);
        self.pending.lock().push(PendingWrite {
            document: Document::new(id.clone(), collection, body),
            assigned: true,
        });
        Ok(id)
    }

    fn store_with_id(&self, id: &str, collection: &str, body: Value) -> StoreResult<()> {
        self.ensure_open()?;
        Self::validate(collection, &body)?;
        if id.trim().is_empty() {
            return Err(StoreError::InvalidDocument(
                "document id must not be blank".to_string(),
            ));
        }
        self.pending.lock().push(PendingWrite {
            document: Document::new(id, collection, body),
            assigned: false,
        });
        Ok(())
    }

    fn load(&self, id: &str) -> StoreResult<Option<Document>> {
        self.ensure_open()?;
        let own = self
            .pending
            .lock()
            .iter()
            .rev()
            .find(|write| write.document.id == id)
            .map(|write| write.document.clone());
        Ok(own.or_else(|| self.database.load(id)))
    }

    fn query(&self, query: &Query) -> StoreResult<QueryResult> {
        self.ensure_open()?;
        let customization = self.connection.customization();
        self.database.query(query, &customization)
    }

    fn commit(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::closed("session"));
        }
        if self.connection.closed.load(Ordering::Acquire) {
            return Err(StoreError::commit("document store connection is closed"));
        }
        let writes = std::mem::take(&mut *self.pending.lock());
        self.database.apply(writes);
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.pending.lock().clear();
        }
        Ok(())
    }
}
