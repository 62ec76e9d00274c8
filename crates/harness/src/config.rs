//! Harness configuration.
//!
//! [`HarnessConfig`] is the snapshot the initializer runs against. The
//! harness owns one and lets tests change it only until the document store
//! is first created.

use std::time::Duration;

use seedbed_core::{ConnectionSettings, DefinitionCatalog, Entity, StoreResult};
use serde_json::Value;

/// Default bound on the post-seed stale-index wait.
pub const DEFAULT_STALE_INDEX_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether queries must block until indexing catches up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsistencyPolicy {
    /// Every query waits for non-stale results (test default).
    #[default]
    WaitForNonStaleResults,
    /// Queries may observe stale indexes.
    AllowStaleResults,
}

/// A named collection of entities to seed.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedCollection {
    /// Collection the entities are stored in.
    pub name: String,
    /// Entity bodies, stored in order.
    pub documents: Vec<Value>,
}

impl SeedCollection {
    /// Create a collection from raw bodies.
    pub fn new(name: impl Into<String>, documents: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            documents,
        }
    }

    /// Serialize typed entities into their own collection.
    pub fn from_entities<T: Entity>(entities: &[T]) -> StoreResult<Self> {
        let documents = entities
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(T::COLLECTION, documents))
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Whether the collection has no entities.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Total entities across seed collections.
pub fn total_entities(seed_data: &[SeedCollection]) -> usize {
    seed_data.iter().map(SeedCollection::len).sum()
}

/// Everything the initializer needs to build the store.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Collections stored once, only into an empty store.
    pub seed_data: Vec<SeedCollection>,
    /// Names of definitions to build, resolved against `catalog`.
    pub index_descriptors: Vec<String>,
    /// Modules whose definitions are all built when no descriptors are given.
    pub scan_modules: Vec<String>,
    /// Definitions available to descriptors and module scans.
    pub catalog: DefinitionCatalog,
    /// Existing store to connect to; `None` means a private in-memory store.
    pub connection: Option<ConnectionSettings>,
    /// Query staleness policy.
    pub consistency: ConsistencyPolicy,
    /// Report server errors as warnings instead of failing.
    pub server_errors_as_warnings: bool,
    /// Bound on the post-seed stale-index wait.
    pub stale_index_timeout: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            seed_data: Vec::new(),
            index_descriptors: Vec::new(),
            scan_modules: Vec::new(),
            catalog: DefinitionCatalog::new(),
            connection: None,
            consistency: ConsistencyPolicy::default(),
            server_errors_as_warnings: false,
            stale_index_timeout: DEFAULT_STALE_INDEX_TIMEOUT,
        }
    }
}
