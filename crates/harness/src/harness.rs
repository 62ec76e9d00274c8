//! Lazily constructed test store.
//!
//! [`TestStore`] owns a harness configuration and, on first use, connects
//! a document store and runs the [`ResourceInitializer`] against it exactly
//! once, no matter how many threads ask concurrently. After that the
//! configuration is frozen and every caller shares the same store, plus a
//! registry of named sessions.
//!
//! # Lifecycle
//!
//! ```text
//! Unconstructed --document_store()--> Constructing --ok--> Ready
//!       |                                  |
//!       |                                  +--err/panic--> Failed
//!       |
//!       +---------------- close() --------------------------> Disposed
//! ```
//!
//! `Failed` memoizes the construction error; every later call observes it
//! without re-running initialization.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use seedbed_core::{
    ConnectionSettings, DefinitionCatalog, DocumentSession, DocumentStore, StoreConnector,
    StoreError, StoreResult,
};
use seedbed_memstore::MemoryConnector;
use tracing::warn;

use crate::config::{ConsistencyPolicy, HarnessConfig, SeedCollection};
use crate::error::{HarnessError, HarnessResult};
use crate::initializer::{InitializationSummary, ResourceInitializer};
use crate::observe::{LifecycleEvent, LifecycleSink, TracingSink};
use crate::settings::HarnessSettings;

/// Key used by [`TestStore::default_session`].
pub const DEFAULT_SESSION_KEY: &str = "default";

enum Lifecycle {
    Unconstructed,
    Constructing,
    Ready {
        store: Arc<dyn DocumentStore>,
        summary: InitializationSummary,
    },
    Failed {
        /// Store that was connected before initialization failed, if any.
        store: Option<Arc<dyn DocumentStore>>,
        error: HarnessError,
    },
    Disposed,
}

struct Inner {
    config: HarnessConfig,
    lifecycle: Lifecycle,
}

/// Builder for [`TestStore`].
///
/// ```ignore
/// let harness = TestStore::builder()
///     .catalog(catalog)
///     .seed_data(vec![SeedCollection::from_entities(&users)?])
///     .index_descriptors(["Users/Search"])
///     .build();
/// ```
pub struct TestStoreBuilder {
    connector: Arc<dyn StoreConnector>,
    sink: Arc<dyn LifecycleSink>,
    config: HarnessConfig,
    poll_interval: Option<Duration>,
}

impl TestStoreBuilder {
    /// Builder with the in-memory connector and tracing sink.
    pub fn new() -> Self {
        Self {
            connector: Arc::new(MemoryConnector),
            sink: Arc::new(TracingSink),
            config: HarnessConfig::default(),
            poll_interval: None,
        }
    }

    /// Obtain stores through `connector`.
    pub fn connector(mut self, connector: Arc<dyn StoreConnector>) -> Self {
        self.connector = connector;
        self
    }

    /// Report lifecycle events to `sink`.
    pub fn sink(mut self, sink: Arc<dyn LifecycleSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: HarnessConfig) -> Self {
        self.config = config;
        self
    }

    /// Definitions available to descriptors and module scans.
    pub fn catalog(mut self, catalog: DefinitionCatalog) -> Self {
        self.config.catalog = catalog;
        self
    }

    /// Collections to seed.
    pub fn seed_data(mut self, seed_data: Vec<SeedCollection>) -> Self {
        self.config.seed_data = seed_data;
        self
    }

    /// Definitions to build, by name.
    pub fn index_descriptors<I, S>(mut self, descriptors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.index_descriptors = descriptors.into_iter().map(Into::into).collect();
        self
    }

    /// Catalog modules to build when no descriptors are given.
    pub fn scan_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.scan_modules = modules.into_iter().map(Into::into).collect();
        self
    }

    /// Connect to an existing store instead of a private one.
    pub fn connection(mut self, settings: ConnectionSettings) -> Self {
        self.config.connection = Some(settings);
        self
    }

    /// Apply settings loaded from `seedbed.toml`.
    pub fn settings(mut self, settings: &HarnessSettings) -> HarnessResult<Self> {
        settings.apply_to(&mut self.config)?;
        Ok(self)
    }

    /// Override the stale-index poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Create the harness; nothing is connected until first use.
    pub fn build(self) -> TestStore {
        let mut initializer = ResourceInitializer::new(Arc::clone(&self.sink));
        if let Some(interval) = self.poll_interval {
            initializer = initializer.with_poll_interval(interval);
        }
        TestStore {
            connector: self.connector,
            initializer,
            sink: self.sink,
            inner: Mutex::new(Inner {
                config: self.config,
                lifecycle: Lifecycle::Unconstructed,
            }),
            constructed: Condvar::new(),
            sessions: DashMap::new(),
        }
    }
}

impl Default for TestStoreBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazily initialized document store shared by a test suite.
///
/// Thread-safe: share it behind an `Arc` (or a `static`) and call
/// [`document_store`](Self::document_store) or [`session`](Self::session)
/// from any thread. Dropping the harness closes it; call
/// [`close`](Self::close) explicitly to observe dispose-time errors.
pub struct TestStore {
    connector: Arc<dyn StoreConnector>,
    initializer: ResourceInitializer,
    sink: Arc<dyn LifecycleSink>,
    inner: Mutex<Inner>,
    constructed: Condvar,
    sessions: DashMap<String, Arc<dyn DocumentSession>>,
}

impl TestStore {
    /// Harness over a private in-memory store with default configuration.
    pub fn new() -> Self {
        TestStoreBuilder::new().build()
    }

    /// Start building a harness.
    pub fn builder() -> TestStoreBuilder {
        TestStoreBuilder::new()
    }

    /// Harness configured from a `seedbed.toml`, with environment fallbacks
    /// for the connection.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSettings` if the file cannot be read or is invalid.
    pub fn from_settings(path: &std::path::Path) -> HarnessResult<Self> {
        let settings = HarnessSettings::from_file(path)?.with_env_overrides();
        Ok(TestStoreBuilder::new().settings(&settings)?.build())
    }

    // ========================================================================
    // Configuration (until first use)
    // ========================================================================

    /// Replace the seed data.
    pub fn set_seed_data(&self, seed_data: Vec<SeedCollection>) -> HarnessResult<()> {
        self.configure("seed_data", |config| config.seed_data = seed_data)
    }

    /// Replace the index descriptors.
    pub fn set_index_descriptors<I, S>(&self, descriptors: I) -> HarnessResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let descriptors = descriptors.into_iter().map(Into::into).collect();
        self.configure("index_descriptors", |config| {
            config.index_descriptors = descriptors
        })
    }

    /// Replace the scan modules.
    pub fn set_scan_modules<I, S>(&self, modules: I) -> HarnessResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let modules = modules.into_iter().map(Into::into).collect();
        self.configure("scan_modules", |config| config.scan_modules = modules)
    }

    /// Replace the definition catalog.
    pub fn set_catalog(&self, catalog: DefinitionCatalog) -> HarnessResult<()> {
        self.configure("catalog", |config| config.catalog = catalog)
    }

    /// Connect to an existing store.
    pub fn set_connection_settings(&self, settings: ConnectionSettings) -> HarnessResult<()> {
        self.configure("connection", |config| config.connection = Some(settings))
    }

    /// Change the query consistency policy.
    pub fn set_consistency_policy(&self, policy: ConsistencyPolicy) -> HarnessResult<()> {
        self.configure("consistency", |config| config.consistency = policy)
    }

    /// Report server errors as warnings instead of failing.
    pub fn set_server_errors_as_warnings(&self, as_warnings: bool) -> HarnessResult<()> {
        self.configure("server_errors_as_warnings", |config| {
            config.server_errors_as_warnings = as_warnings
        })
    }

    /// Bound the post-seed stale-index wait.
    pub fn set_stale_index_timeout(&self, timeout: Duration) -> HarnessResult<()> {
        self.configure("stale_index_timeout", |config| {
            config.stale_index_timeout = timeout
        })
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> HarnessConfig {
        self.inner.lock().config.clone()
    }

    fn configure(
        &self,
        field: &'static str,
        apply: impl FnOnce(&mut HarnessConfig),
    ) -> HarnessResult<()> {
        let mut inner = self.inner.lock();
        match inner.lifecycle {
            Lifecycle::Unconstructed => {
                apply(&mut inner.config);
                Ok(())
            }
            _ => Err(HarnessError::ConfigurationLocked { field }),
        }
    }

    // ========================================================================
    // Access
    // ========================================================================

    /// The shared document store, constructing it on first call.
    ///
    /// Exactly one caller runs construction; concurrent callers block until
    /// it finishes and then observe the same store or the same error.
    ///
    /// # Errors
    ///
    /// - the memoized construction error, if construction failed
    /// - `Disposed` after [`close`](Self::close)
    pub fn document_store(&self) -> HarnessResult<Arc<dyn DocumentStore>> {
        let mut inner = self.inner.lock();
        while matches!(inner.lifecycle, Lifecycle::Constructing) {
            self.constructed.wait(&mut inner);
        }
        match &inner.lifecycle {
            Lifecycle::Ready { store, .. } => return Ok(Arc::clone(store)),
            Lifecycle::Failed { error, .. } => return Err(error.clone()),
            Lifecycle::Disposed => return Err(HarnessError::Disposed),
            Lifecycle::Unconstructed | Lifecycle::Constructing => {}
        }
        inner.lifecycle = Lifecycle::Constructing;
        let config = inner.config.clone();
        drop(inner);

        self.construct(&config)
    }

    fn construct(&self, config: &HarnessConfig) -> HarnessResult<Arc<dyn DocumentStore>> {
        let mut guard = ConstructionGuard {
            harness: self,
            store: None,
            completed: false,
        };

        let outcome = match self.connector.connect(config.connection.as_ref()) {
            Ok(store) => {
                guard.store = Some(Arc::clone(&store));
                self.initializer
                    .initialize(store.as_ref(), config)
                    .map(|summary| (store, summary))
            }
            Err(err) => Err(HarnessError::Connect(err)),
        };

        match outcome {
            Ok((store, summary)) => {
                guard.complete(Lifecycle::Ready {
                    store: Arc::clone(&store),
                    summary,
                });
                Ok(store)
            }
            Err(error) => {
                let store = guard.store.take();
                guard.complete(Lifecycle::Failed {
                    store,
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    fn publish(&self, lifecycle: Lifecycle) {
        self.inner.lock().lifecycle = lifecycle;
        self.constructed.notify_all();
    }

    /// Session registered under `key`, opened on first reference.
    pub fn session(&self, key: &str) -> HarnessResult<Arc<dyn DocumentSession>> {
        let store = self.document_store()?;
        let session = self
            .sessions
            .entry(key.to_string())
            .or_try_insert_with(|| {
                let session = store.open_session()?;
                self.sink.record(&LifecycleEvent::SessionOpened {
                    key: key.to_string(),
                });
                Ok::<_, StoreError>(session)
            })
            .map(|entry| Arc::clone(entry.value()))?;

        // close() may have drained the registry between our store lookup
        // and the insert above.
        if matches!(self.inner.lock().lifecycle, Lifecycle::Disposed) {
            if let Some((key, session)) = self.sessions.remove(key) {
                // the caller gets Disposed; a close failure is only recorded
                let _ = self.close_session(key, session.as_ref());
            }
            return Err(HarnessError::Disposed);
        }
        Ok(session)
    }

    /// The session under [`DEFAULT_SESSION_KEY`].
    pub fn default_session(&self) -> HarnessResult<Arc<dyn DocumentSession>> {
        self.session(DEFAULT_SESSION_KEY)
    }

    /// Number of open keyed sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Summary of the completed initialization, if the store is ready.
    pub fn initialization_summary(&self) -> Option<InitializationSummary> {
        match &self.inner.lock().lifecycle {
            Lifecycle::Ready { summary, .. } => Some(summary.clone()),
            _ => None,
        }
    }

    // ========================================================================
    // Dispose
    // ========================================================================

    /// Release the store.
    ///
    /// A ready store is first checked for server errors (honouring
    /// `server_errors_as_warnings`), then every keyed session is closed,
    /// then the store. Cleanup runs even when the check fails; the check's
    /// error wins over cleanup errors. A store left by a failed
    /// construction is only closed. Idempotent.
    pub fn close(&self) -> HarnessResult<()> {
        let mut inner = self.inner.lock();
        while matches!(inner.lifecycle, Lifecycle::Constructing) {
            self.constructed.wait(&mut inner);
        }
        let as_warnings = inner.config.server_errors_as_warnings;
        let lifecycle = std::mem::replace(&mut inner.lifecycle, Lifecycle::Disposed);
        drop(inner);

        let (store, check_errors) = match lifecycle {
            Lifecycle::Ready { store, .. } => (store, true),
            Lifecycle::Failed {
                store: Some(store),
                ..
            } => (store, false),
            Lifecycle::Disposed => return Ok(()),
            _ => {
                self.sink.record(&LifecycleEvent::Disposed);
                return Ok(());
            }
        };

        let assertion = if check_errors {
            self.initializer
                .assert_no_server_errors(store.as_ref(), as_warnings)
        } else {
            Ok(())
        };
        let sessions = self.close_sessions();
        let closed = store.close().map_err(HarnessError::from);
        self.sink.record(&LifecycleEvent::Disposed);

        assertion.and(sessions).and(closed)
    }

    /// Close and forget every keyed session, reporting the first failure.
    fn close_sessions(&self) -> HarnessResult<()> {
        let mut keys: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        keys.sort();

        let mut first_error = None;
        for key in keys {
            let Some((key, session)) = self.sessions.remove(&key) else {
                continue;
            };
            if let Err(err) = self.close_session(key, session.as_ref()) {
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Close one session, recording a failure before returning it.
    fn close_session(&self, key: String, session: &dyn DocumentSession) -> StoreResult<()> {
        session.close().map_err(|err| {
            self.sink.record(&LifecycleEvent::SessionCloseFailed {
                key,
                reason: err.to_string(),
            });
            err
        })
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestStore {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(target: "seedbed::harness", error = %err, "Failed to dispose test store");
        }
    }
}

/// Publishes the construction outcome, or `InitializationPanicked` if the
/// constructing thread unwinds first, so waiters are always released.
struct ConstructionGuard<'a> {
    harness: &'a TestStore,
    store: Option<Arc<dyn DocumentStore>>,
    completed: bool,
}

impl ConstructionGuard<'_> {
    fn complete(mut self, lifecycle: Lifecycle) {
        self.completed = true;
        self.harness.publish(lifecycle);
    }
}

impl Drop for ConstructionGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.harness.publish(Lifecycle::Failed {
                store: self.store.take(),
                error: HarnessError::InitializationPanicked,
            });
        }
    }
}
