//! Tenant database: documents, identities and the background indexer.
//!
//! One [`Database`] holds the committed state of a tenant. Commits bump a
//! per-collection etag; an index is stale while its `indexed_etag` trails
//! the etag of the collection it maps. A dedicated worker thread re-runs
//! stale indexes, so staleness is observable between a commit and the next
//! indexing pass, the same way it is on a real server.

use parking_lot::{Condvar, Mutex};
use seedbed_core::{
    DatabaseStatistics, Document, IndexDefinition, Query, QueryCustomization, QueryHit,
    QueryResult, QueryTarget, ServerError, StoreError, StoreResult, TransformerDefinition,
};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::{debug, error};

/// Collection holding identity bookkeeping documents.
pub const IDENTITY_COLLECTION: &str = "@identities";

/// Identifier prefix of identity bookkeeping documents.
pub const IDENTITY_PREFIX: &str = "seedbed/identities/";

/// A write buffered by a session until commit.
#[derive(Debug, Clone)]
pub(crate) struct PendingWrite {
    pub(crate) document: Document,
    /// Whether the identifier came from the collection's identity counter.
    pub(crate) assigned: bool,
}

struct StoredDocument {
    document: Document,
    etag: u64,
}

struct IndexState {
    definition: Arc<dyn IndexDefinition>,
    indexed_etag: u64,
    entries: Vec<QueryHit>,
}

impl IndexState {
    fn is_stale(&self, collection_etags: &HashMap<String, u64>) -> bool {
        collection_etags
            .get(self.definition.collection())
            .copied()
            .unwrap_or(0)
            > self.indexed_etag
    }
}

#[derive(Default)]
struct DatabaseState {
    documents: HashMap<String, StoredDocument>,
    last_etag: u64,
    identities: HashMap<String, u64>,
    collection_etags: HashMap<String, u64>,
    indexes: Vec<IndexState>,
    transformers: BTreeMap<String, Arc<dyn TransformerDefinition>>,
    errors: Vec<ServerError>,
}

impl DatabaseState {
    fn has_stale_indexes(&self) -> bool {
        self.indexes
            .iter()
            .any(|index| index.is_stale(&self.collection_etags))
    }

    fn index_position(&self, name: &str) -> Option<usize> {
        self.indexes
            .iter()
            .position(|index| index.definition.name() == name)
    }

    fn put(&mut self, document: Document) {
        self.last_etag += 1;
        self.collection_etags
            .insert(document.collection.clone(), self.last_etag);
        let etag = self.last_etag;
        self.documents
            .insert(document.id.clone(), StoredDocument { document, etag });
    }

    fn collection_hits(&self, collection: &str) -> Vec<QueryHit> {
        let mut stored: Vec<&StoredDocument> = self
            .documents
            .values()
            .filter(|d| d.document.collection == collection)
            .collect();
        stored.sort_by_key(|d| d.etag);
        stored
            .into_iter()
            .map(|d| QueryHit {
                id: Some(d.document.id.clone()),
                body: d.document.body.clone(),
            })
            .collect()
    }

    /// Re-run every stale index; returns how many were rebuilt.
    fn run_indexing_pass(&mut self) -> usize {
        let DatabaseState {
            documents,
            collection_etags,
            indexes,
            errors,
            ..
        } = self;

        let mut rebuilt = 0;
        for index in indexes.iter_mut() {
            if !index.is_stale(collection_etags) {
                continue;
            }
            let definition = Arc::clone(&index.definition);
            let target_etag = collection_etags
                .get(definition.collection())
                .copied()
                .unwrap_or(0);
            let name = definition.name().to_string();
            errors.retain(|e| e.index_name.as_deref() != Some(name.as_str()));

            let mut source: Vec<&StoredDocument> = documents
                .values()
                .filter(|d| d.document.collection == definition.collection())
                .collect();
            source.sort_by_key(|d| d.etag);

            let mut hits = Vec::new();
            for stored in source {
                match guarded(|| definition.map(&stored.document)) {
                    Ok(entries) => hits.extend(entries.into_iter().map(|body| QueryHit {
                        id: Some(stored.document.id.clone()),
                        body,
                    })),
                    Err(message) => errors.push(ServerError::new(
                        Some(stored.document.id.clone()),
                        Some(name.clone()),
                        message,
                    )),
                }
            }

            if definition.is_map_reduce() {
                let mapped: Vec<Value> = hits.into_iter().map(|hit| hit.body).collect();
                hits = match guarded(|| definition.reduce(mapped)) {
                    Ok(reduced) => reduced
                        .into_iter()
                        .map(|body| QueryHit { id: None, body })
                        .collect(),
                    Err(message) => {
                        errors.push(ServerError::new(None, Some(name.clone()), message));
                        Vec::new()
                    }
                };
            }

            index.entries = hits;
            index.indexed_etag = target_etag;
            rebuilt += 1;
        }
        rebuilt
    }
}

/// Run user-supplied definition code, turning a panic into an error message.
fn guarded<T>(f: impl FnOnce() -> Result<T, String>) -> Result<T, String> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let detail = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(format!("definition panicked: {}", detail))
        }
    }
}

struct DatabaseInner {
    tenant: String,
    state: Mutex<DatabaseState>,
    work_ready: Condvar,
    indexed: Condvar,
    shutdown: AtomicBool,
    indexing_paused: AtomicBool,
}

/// Committed state of one tenant plus its indexing worker.
pub(crate) struct Database {
    inner: Arc<DatabaseInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Database {
    /// Create the database and start its indexing worker.
    ///
    /// The worker is named `seedbed-indexer-<tenant>`.
    pub(crate) fn open(tenant: &str) -> StoreResult<Arc<Self>> {
        let inner = Arc::new(DatabaseInner {
            tenant: tenant.to_string(),
            state: Mutex::new(DatabaseState::default()),
            work_ready: Condvar::new(),
            indexed: Condvar::new(),
            shutdown: AtomicBool::new(false),
            indexing_paused: AtomicBool::new(false),
        });

        let inner_clone = Arc::clone(&inner);
        let handle = std::thread::Builder::new()
            .name(format!("seedbed-indexer-{}", tenant))
            .spawn(move || indexing_loop(&inner_clone))
            .map_err(|e| {
                StoreError::connect(format!(
                    "failed to start indexer for tenant '{}': {}",
                    tenant, e
                ))
            })?;

        Ok(Arc::new(Self {
            inner,
            worker: Mutex::new(Some(handle)),
        }))
    }

    pub(crate) fn tenant(&self) -> &str {
        &self.inner.tenant
    }

    /// Allocate the next identifier of `collection`.
    pub(crate) fn next_identity(&self, collection: &str) -> String {
        let mut state = self.inner.state.lock();
        let counter = state.identities.entry(collection.to_string()).or_insert(0);
        *counter += 1;
        format!("{}/{}", collection, counter)
    }

    /// Apply a batch of writes atomically.
    pub(crate) fn apply(&self, writes: Vec<PendingWrite>) {
        if writes.is_empty() {
            return;
        }
        let mut state = self.inner.state.lock();
        let mut touched: Vec<String> = Vec::new();
        for write in writes {
            if write.assigned && !touched.contains(&write.document.collection) {
                touched.push(write.document.collection.clone());
            }
            state.put(write.document);
        }
        for collection in touched {
            let last = state.identities.get(&collection).copied().unwrap_or(0);
            let identity = Document::new(
                format!("{}{}", IDENTITY_PREFIX, collection),
                IDENTITY_COLLECTION,
                json!({ "collection": collection, "last": last }),
            );
            state.put(identity);
        }
        drop(state);
        self.inner.work_ready.notify_all();
    }

    pub(crate) fn load(&self, id: &str) -> Option<Document> {
        let state = self.inner.state.lock();
        state.documents.get(id).map(|d| d.document.clone())
    }

    pub(crate) fn build_index(&self, definition: Arc<dyn IndexDefinition>) {
        let mut state = self.inner.state.lock();
        if state.index_position(definition.name()).is_some() {
            return;
        }
        debug!(target: "seedbed::memstore", tenant = %self.inner.tenant, index = definition.name(), "Building index");
        state.indexes.push(IndexState {
            definition,
            indexed_etag: 0,
            entries: Vec::new(),
        });
        drop(state);
        self.inner.work_ready.notify_all();
    }

    pub(crate) fn build_transformer(&self, definition: Arc<dyn TransformerDefinition>) {
        let mut state = self.inner.state.lock();
        state
            .transformers
            .entry(definition.name().to_string())
            .or_insert(definition);
    }

    pub(crate) fn statistics(&self) -> DatabaseStatistics {
        let state = self.inner.state.lock();
        DatabaseStatistics {
            tenant: self.inner.tenant.clone(),
            document_count: state.documents.len() as u64,
            index_count: state.indexes.len(),
            transformer_count: state.transformers.len(),
            stale_indexes: state
                .indexes
                .iter()
                .filter(|index| index.is_stale(&state.collection_etags))
                .map(|index| index.definition.name().to_string())
                .collect(),
            errors: state.errors.clone(),
        }
    }

    pub(crate) fn query(
        &self,
        query: &Query,
        customization: &QueryCustomization,
    ) -> StoreResult<QueryResult> {
        let mut state = self.inner.state.lock();
        let (hits, is_stale) = match &query.target {
            QueryTarget::Collection(collection) => (state.collection_hits(collection), false),
            QueryTarget::Index(name) => {
                let position = state
                    .index_position(name)
                    .ok_or_else(|| StoreError::not_found(format!("index '{}'", name)))?;

                if customization.waits_for_non_stale_results() {
                    let deadline = Instant::now() + customization.timeout();
                    while state.indexes[position].is_stale(&state.collection_etags) {
                        if self
                            .inner
                            .indexed
                            .wait_until(&mut state, deadline)
                            .timed_out()
                        {
                            break;
                        }
                    }
                    if state.indexes[position].is_stale(&state.collection_etags) {
                        return Err(StoreError::Timeout(format!(
                            "index '{}' still stale after {:?}",
                            name,
                            customization.timeout()
                        )));
                    }
                }

                let index = &state.indexes[position];
                (index.entries.clone(), index.is_stale(&state.collection_etags))
            }
        };

        let transformer = match &query.transformer {
            Some(name) => Some(
                state
                    .transformers
                    .get(name)
                    .cloned()
                    .ok_or_else(|| StoreError::not_found(format!("transformer '{}'", name)))?,
            ),
            None => None,
        };
        drop(state);

        let hits = match transformer {
            Some(transformer) => hits
                .into_iter()
                .map(|hit| {
                    let body = guarded(|| transformer.transform(&hit.body)).map_err(|m| {
                        StoreError::Query(format!(
                            "transformer '{}' failed: {}",
                            transformer.name(),
                            m
                        ))
                    })?;
                    Ok(QueryHit { id: hit.id, body })
                })
                .collect::<StoreResult<Vec<_>>>()?,
            None => hits,
        };

        Ok(QueryResult { hits, is_stale })
    }

    /// Stop the worker from picking up new work.
    pub(crate) fn pause_indexing(&self) {
        self.inner.indexing_paused.store(true, Ordering::Release);
    }

    pub(crate) fn resume_indexing(&self) {
        self.inner.indexing_paused.store(false, Ordering::Release);
        let _state = self.inner.state.lock();
        self.inner.work_ready.notify_all();
    }

    fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);

        // Notify under the lock so a worker between its shutdown check and
        // its wait cannot miss the wakeup.
        {
            let _state = self.inner.state.lock();
            self.inner.work_ready.notify_all();
            self.inner.indexed.notify_all();
        }

        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                error!(target: "seedbed::memstore", tenant = %self.inner.tenant, "Indexer thread panicked");
            }
        }
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn indexing_loop(inner: &DatabaseInner) {
    let mut state = inner.state.lock();
    loop {
        if inner.shutdown.load(Ordering::Acquire) {
            break;
        }
        if inner.indexing_paused.load(Ordering::Acquire) || !state.has_stale_indexes() {
            inner.work_ready.wait(&mut state);
            continue;
        }
        let rebuilt = state.run_indexing_pass();
        debug!(target: "seedbed::memstore", tenant = %inner.tenant, rebuilt, "Indexing pass complete");
        inner.indexed.notify_all();
    }
}
