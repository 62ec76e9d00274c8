//! Scripted store for unit tests.
//!
//! Lets tests force the failure paths the in-memory store cannot produce
//! on demand: connect and commit failures, indexes that never catch up,
//! sessions that fail to close.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use seedbed_core::{
    ConnectionSettings, DatabaseStatistics, Document, DocumentSession, DocumentStore,
    IndexDefinition, Query, QueryListener, QueryResult, ServerError, StoreConnector, StoreError,
    StoreResult, TransformerDefinition,
};
use serde_json::Value;

#[derive(Default, Clone)]
pub(crate) struct Script {
    pub(crate) connect_error: Option<StoreError>,
    pub(crate) commit_error: Option<StoreError>,
    pub(crate) close_session_error: Option<StoreError>,
    /// Stale index names reported on every poll.
    pub(crate) stale_forever: Option<Vec<String>>,
    /// Polls after a commit that still report a stale index.
    pub(crate) stale_polls: usize,
    pub(crate) errors: Vec<ServerError>,
    pub(crate) existing_documents: u64,
}

/// State shared between the store and its sessions.
#[derive(Default)]
pub(crate) struct Shared {
    pub(crate) documents: AtomicU64,
    pub(crate) stored: Mutex<Vec<(String, Value)>>,
    pub(crate) stale_polls_left: AtomicUsize,
    pub(crate) sessions_closed: AtomicUsize,
}

#[derive(Default)]
pub(crate) struct ScriptedStore {
    pub(crate) script: Script,
    pub(crate) shared: Arc<Shared>,
    pub(crate) initialize_calls: AtomicUsize,
    pub(crate) built: Mutex<Vec<String>>,
    pub(crate) listeners: Mutex<Vec<Arc<dyn QueryListener>>>,
    pub(crate) sessions_opened: AtomicUsize,
    pub(crate) closed: AtomicBool,
}

impl ScriptedStore {
    pub(crate) fn new(script: Script) -> Arc<Self> {
        let shared = Arc::new(Shared {
            documents: AtomicU64::new(script.existing_documents),
            ..Default::default()
        });
        Arc::new(Self {
            script,
            shared,
            ..Default::default()
        })
    }

    pub(crate) fn built(&self) -> Vec<String> {
        self.built.lock().clone()
    }

    pub(crate) fn stored(&self) -> Vec<(String, Value)> {
        self.shared.stored.lock().clone()
    }
}

impl DocumentStore for ScriptedStore {
    fn tenant(&self) -> &str {
        "Scripted"
    }

    fn initialize(&self) -> StoreResult<()> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        match &self.script.connect_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn build_index(&self, definition: Arc<dyn IndexDefinition>) -> StoreResult<()> {
        self.built.lock().push(definition.name().to_string());
        Ok(())
    }

    fn build_transformer(&self, definition: Arc<dyn TransformerDefinition>) -> StoreResult<()> {
        self.built.lock().push(definition.name().to_string());
        Ok(())
    }

    fn open_session(&self) -> StoreResult<Arc<dyn DocumentSession>> {
        self.sessions_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedSession {
            shared: Arc::clone(&self.shared),
            pending: Mutex::new(Vec::new()),
            stale_polls: self.script.stale_polls,
            commit_error: self.script.commit_error.clone(),
            close_error: self.script.close_session_error.clone(),
        }))
    }

    fn open_session_for(&self, _tenant: &str) -> StoreResult<Arc<dyn DocumentSession>> {
        self.open_session()
    }

    fn statistics(&self) -> StoreResult<DatabaseStatistics> {
        let stale_indexes = match &self.script.stale_forever {
            Some(names) => names.clone(),
            None => {
                let left = self.shared.stale_polls_left.load(Ordering::SeqCst);
                if left > 0 {
                    self.shared.stale_polls_left.store(left - 1, Ordering::SeqCst);
                    vec!["Scripted/Index".to_string()]
                } else {
                    Vec::new()
                }
            }
        };
        Ok(DatabaseStatistics {
            tenant: "Scripted".to_string(),
            document_count: self.shared.documents.load(Ordering::SeqCst),
            index_count: self.built.lock().len(),
            transformer_count: 0,
            stale_indexes,
            errors: self.script.errors.clone(),
        })
    }

    fn register_query_listener(&self, listener: Arc<dyn QueryListener>) {
        self.listeners.lock().push(listener);
    }

    fn close(&self) -> StoreResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

pub(crate) struct ScriptedSession {
    shared: Arc<Shared>,
    pending: Mutex<Vec<(String, Value)>>,
    stale_polls: usize,
    commit_error: Option<StoreError>,
    close_error: Option<StoreError>,
}

impl DocumentSession for ScriptedSession {
    fn store(&self, collection: &str, body: Value) -> StoreResult<String> {
        let mut pending = self.pending.lock();
        pending.push((collection.to_string(), body));
        Ok(format!("{}/{}", collection, pending.len()))
    }

    fn store_with_id(&self, _id: &str, collection: &str, body: Value) -> StoreResult<()> {
        self.pending.lock().push((collection.to_string(), body));
        Ok(())
    }

    fn load(&self, _id: &str) -> StoreResult<Option<Document>> {
        Ok(None)
    }

    fn query(&self, _query: &Query) -> StoreResult<QueryResult> {
        Ok(QueryResult::default())
    }

    fn commit(&self) -> StoreResult<()> {
        if let Some(err) = &self.commit_error {
            return Err(err.clone());
        }
        let writes = std::mem::take(&mut *self.pending.lock());
        self.shared
            .documents
            .fetch_add(writes.len() as u64, Ordering::SeqCst);
        self.shared
            .stale_polls_left
            .store(self.stale_polls, Ordering::SeqCst);
        self.shared.stored.lock().extend(writes);
        Ok(())
    }

    fn close(&self) -> StoreResult<()> {
        self.shared.sessions_closed.fetch_add(1, Ordering::SeqCst);
        match &self.close_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// Connector handing out one pre-built scripted store.
pub(crate) struct ScriptedConnector {
    pub(crate) store: Arc<ScriptedStore>,
    pub(crate) connects: AtomicUsize,
}

impl ScriptedConnector {
    pub(crate) fn new(store: Arc<ScriptedStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            connects: AtomicUsize::new(0),
        })
    }
}

impl StoreConnector for ScriptedConnector {
    fn connect(&self, _settings: Option<&ConnectionSettings>) -> StoreResult<Arc<dyn DocumentStore>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.store) as Arc<dyn DocumentStore>)
    }
}
