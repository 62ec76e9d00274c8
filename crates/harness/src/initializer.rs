//! One-shot store initialization.
//!
//! [`ResourceInitializer::initialize`] runs the fixed setup sequence against
//! a freshly connected store:
//!
//! 1. low-level initialization (and the non-stale query listener)
//! 2. index/transformer builds, resolved before anything is built
//! 3. seed data, only into an empty store, then a bounded stale-index wait
//! 4. server-error assertion
//! 5. summary
//!
//! Nothing is rolled back on failure; the store is left as the completed
//! steps made it and can still be closed.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use seedbed_core::{DatabaseStatistics, Definition, DocumentSession, DocumentStore};
use serde::{Deserialize, Serialize};

use crate::config::{total_entities, ConsistencyPolicy, HarnessConfig};
use crate::error::{HarnessError, HarnessResult};
use crate::listener::NoStaleQueriesListener;
use crate::observe::{LifecycleEvent, LifecycleSink};

/// Interval between stale-index polls.
pub const STALE_INDEX_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Store state observed at the end of initialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializationSummary {
    /// Tenant the store talks to.
    pub tenant: String,
    /// Documents, including bookkeeping documents.
    pub document_count: u64,
    /// Built indexes.
    pub index_count: usize,
    /// Indexes still stale.
    pub stale_index_count: usize,
}

impl From<&DatabaseStatistics> for InitializationSummary {
    fn from(stats: &DatabaseStatistics) -> Self {
        Self {
            tenant: stats.tenant.clone(),
            document_count: stats.document_count,
            index_count: stats.index_count,
            stale_index_count: stats.stale_indexes.len(),
        }
    }
}

/// Runs the setup sequence and reports progress to a sink.
#[derive(Clone)]
pub struct ResourceInitializer {
    sink: Arc<dyn LifecycleSink>,
    poll_interval: Duration,
}

impl ResourceInitializer {
    /// Create an initializer reporting to `sink`.
    pub fn new(sink: Arc<dyn LifecycleSink>) -> Self {
        Self {
            sink,
            poll_interval: STALE_INDEX_POLL_INTERVAL,
        }
    }

    /// Override the stale-index poll interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Initialize `store` according to `config`.
    ///
    /// # Errors
    ///
    /// - `Connect` if the store fails to initialize
    /// - `InvalidIndexDescriptor` if a descriptor names no known definition
    /// - `Commit` if the seed batch fails to commit
    /// - `StaleIndexTimeout` if indexes do not catch up after seeding
    /// - `ServerReportedErrors` if the store reports errors and they are not
    ///   downgraded to warnings.
    pub fn initialize(
        &self,
        store: &dyn DocumentStore,
        config: &HarnessConfig,
    ) -> HarnessResult<InitializationSummary> {
        store.initialize().map_err(HarnessError::Connect)?;
        self.sink.record(&LifecycleEvent::StoreInitialized {
            tenant: store.tenant().to_string(),
        });

        // Test stores only: every query waits for indexing to catch up.
        if config.consistency == ConsistencyPolicy::WaitForNonStaleResults {
            store.register_query_listener(Arc::new(NoStaleQueriesListener::with_timeout(
                config.stale_index_timeout,
            )));
        }

        let definitions = Self::resolve_definitions(config)?;
        self.build_definitions(store, &definitions)?;

        if !config.seed_data.is_empty() {
            self.seed(store, config)?;
        }

        let statistics = store.statistics()?;
        self.check_server_errors(&statistics, config.server_errors_as_warnings)?;

        let summary = InitializationSummary::from(&statistics);
        self.sink
            .record(&LifecycleEvent::Initialized(summary.clone()));
        Ok(summary)
    }

    /// Fail (or warn, when `as_warnings`) if the store reports server errors.
    pub fn assert_no_server_errors(
        &self,
        store: &dyn DocumentStore,
        as_warnings: bool,
    ) -> HarnessResult<()> {
        let statistics = store.statistics()?;
        self.check_server_errors(&statistics, as_warnings)
    }

    /// Descriptors win over scan modules; unknown descriptors fail before
    /// anything is built.
    fn resolve_definitions(config: &HarnessConfig) -> HarnessResult<Vec<Definition>> {
        if !config.index_descriptors.is_empty() {
            config
                .index_descriptors
                .iter()
                .map(|descriptor| {
                    config.catalog.resolve(descriptor).cloned().ok_or_else(|| {
                        HarnessError::InvalidIndexDescriptor {
                            descriptor: descriptor.clone(),
                        }
                    })
                })
                .collect()
        } else if !config.scan_modules.is_empty() {
            Ok(config.catalog.definitions_in(&config.scan_modules))
        } else {
            Ok(Vec::new())
        }
    }

    fn build_definitions(
        &self,
        store: &dyn DocumentStore,
        definitions: &[Definition],
    ) -> HarnessResult<()> {
        if definitions.is_empty() {
            self.sink.record(&LifecycleEvent::NoDefinitions);
            return Ok(());
        }

        let (mut indexes, mut transformers) = (0, 0);
        for definition in definitions {
            match definition {
                Definition::Index(index) => {
                    store.build_index(Arc::clone(index))?;
                    indexes += 1;
                }
                Definition::Transformer(transformer) => {
                    store.build_transformer(Arc::clone(transformer))?;
                    transformers += 1;
                }
            }
        }
        self.sink.record(&LifecycleEvent::DefinitionsBuilt {
            indexes,
            transformers,
        });
        Ok(())
    }

    fn seed(&self, store: &dyn DocumentStore, config: &HarnessConfig) -> HarnessResult<()> {
        let session = store.open_session()?;
        let outcome = self.seed_with(store, session.as_ref(), config);
        let closed = session.close();
        outcome?;
        closed?;
        Ok(())
    }

    fn seed_with(
        &self,
        store: &dyn DocumentStore,
        session: &dyn DocumentSession,
        config: &HarnessConfig,
    ) -> HarnessResult<()> {
        let existing = store.statistics()?.document_count;
        if existing > 0 {
            self.sink.record(&LifecycleEvent::SeedingSkipped {
                existing_documents: existing,
            });
            return Ok(());
        }

        for collection in &config.seed_data {
            for body in &collection.documents {
                session.store(&collection.name, body.clone())?;
            }
            self.sink.record(&LifecycleEvent::CollectionSeeded {
                collection: collection.name.clone(),
                documents: collection.len(),
            });
        }

        session.commit().map_err(HarnessError::Commit)?;
        self.sink
            .record(&LifecycleEvent::SeedCommitted {
                documents: total_entities(&config.seed_data),
            });

        self.wait_for_non_stale_indexes(store, config.stale_index_timeout)
    }

    /// Poll at a fixed interval until no index is stale or `timeout` passes.
    fn wait_for_non_stale_indexes(
        &self,
        store: &dyn DocumentStore,
        timeout: Duration,
    ) -> HarnessResult<()> {
        let started = Instant::now();
        loop {
            let stale = store.statistics()?.stale_indexes;
            if stale.is_empty() {
                return Ok(());
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(HarnessError::StaleIndexTimeout {
                    waited,
                    indexes: stale,
                });
            }
            self.sink
                .record(&LifecycleEvent::WaitingForStaleIndexes { indexes: stale });
            thread::sleep(self.poll_interval.min(timeout - waited));
        }
    }

    fn check_server_errors(
        &self,
        statistics: &DatabaseStatistics,
        as_warnings: bool,
    ) -> HarnessResult<()> {
        if statistics.errors.is_empty() {
            return Ok(());
        }
        if as_warnings {
            self.sink.record(&LifecycleEvent::ServerErrorsDowngraded {
                errors: statistics.errors.clone(),
            });
            return Ok(());
        }
        Err(HarnessError::ServerReportedErrors {
            errors: statistics.errors.clone(),
        })
    }
}
