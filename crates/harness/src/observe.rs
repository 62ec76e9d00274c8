//! Lifecycle events and observability sinks.
//!
//! The initializer and harness never log directly. They report
//! [`LifecycleEvent`]s to an injected [`LifecycleSink`]; the default
//! [`TracingSink`] turns them into `tracing` events under the
//! `seedbed::harness` target.

use parking_lot::Mutex;
use seedbed_core::ServerError;
use tracing::{debug, info, warn};

use crate::initializer::InitializationSummary;

/// Something that happened during the harness lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    /// The store finished its low-level initialization.
    StoreInitialized { tenant: String },
    /// Index and transformer definitions were built.
    DefinitionsBuilt { indexes: usize, transformers: usize },
    /// Neither descriptors nor scan modules were configured.
    NoDefinitions,
    /// The store already held documents, so seed data was not stored.
    SeedingSkipped { existing_documents: u64 },
    /// One seed collection was stored (not yet committed).
    CollectionSeeded { collection: String, documents: usize },
    /// The seed batch was committed.
    SeedCommitted { documents: usize },
    /// Still waiting on stale indexes after seeding.
    WaitingForStaleIndexes { indexes: Vec<String> },
    /// Server errors were downgraded to warnings.
    ServerErrorsDowngraded { errors: Vec<ServerError> },
    /// Initialization completed.
    Initialized(InitializationSummary),
    /// A keyed session was opened.
    SessionOpened { key: String },
    /// Closing a keyed session failed.
    SessionCloseFailed { key: String, reason: String },
    /// The harness released its store.
    Disposed,
}

/// Receives lifecycle events.
pub trait LifecycleSink: Send + Sync {
    /// Record one event.
    fn record(&self, event: &LifecycleEvent);
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LifecycleSink for TracingSink {
    fn record(&self, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::StoreInitialized { tenant } => {
                info!(target: "seedbed::harness", tenant = %tenant, "Document store initialized");
            }
            LifecycleEvent::DefinitionsBuilt {
                indexes,
                transformers,
            } => {
                info!(target: "seedbed::harness", indexes, transformers, "Built definitions");
            }
            LifecycleEvent::NoDefinitions => {
                info!(target: "seedbed::harness", "No indexes or transformers configured");
            }
            LifecycleEvent::SeedingSkipped { existing_documents } => {
                info!(
                    target: "seedbed::harness",
                    existing_documents,
                    "Store already has documents; skipping seed data"
                );
            }
            LifecycleEvent::CollectionSeeded {
                collection,
                documents,
            } => {
                debug!(target: "seedbed::harness", collection = %collection, documents, "Seeded collection");
            }
            LifecycleEvent::SeedCommitted { documents } => {
                info!(target: "seedbed::harness", documents, "Seed data committed");
            }
            LifecycleEvent::WaitingForStaleIndexes { indexes } => {
                debug!(target: "seedbed::harness", ?indexes, "Waiting for indexes to stop being stale");
            }
            LifecycleEvent::ServerErrorsDowngraded { errors } => {
                for error in errors {
                    warn!(target: "seedbed::harness", error = %error, "Server error reported as warning");
                }
            }
            LifecycleEvent::Initialized(summary) => {
                info!(
                    target: "seedbed::harness",
                    tenant = %summary.tenant,
                    documents = summary.document_count,
                    indexes = summary.index_count,
                    stale_indexes = summary.stale_index_count,
                    "Document store ready"
                );
            }
            LifecycleEvent::SessionOpened { key } => {
                debug!(target: "seedbed::harness", key = %key, "Opened session");
            }
            LifecycleEvent::SessionCloseFailed { key, reason } => {
                warn!(target: "seedbed::harness", key = %key, reason = %reason, "Failed to close session");
            }
            LifecycleEvent::Disposed => {
                debug!(target: "seedbed::harness", "Harness disposed");
            }
        }
    }
}

/// Captures events in memory, for tests.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().clone()
    }

    /// Number of recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&LifecycleEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }
}

impl LifecycleSink for RecordingSink {
    fn record(&self, event: &LifecycleEvent) {
        self.events.lock().push(event.clone());
    }
}
