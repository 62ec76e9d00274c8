//! Seedbed - lazily initialized document store harness for integration tests.
//!
//! Seedbed hands a test suite one shared, seeded document store and a set of
//! named sessions drawn from it. The store is built on first use, exactly
//! once, after which its configuration is frozen.
//!
//! # Quick Start
//!
//! ```ignore
//! use seedbed::{DefinitionCatalog, FnIndex, SeedCollection, TestStore};
//!
//! let harness = TestStore::builder()
//!     .catalog(DefinitionCatalog::new().with_index("users", users_by_name))
//!     .seed_data(vec![SeedCollection::from_entities(&users)?])
//!     .index_descriptors(["Users/Search"])
//!     .build();
//!
//! let session = harness.default_session()?;
//! let hits = session.query(&Query::index("Users/Search"))?;
//! harness.close()?;
//! ```
//!
//! # Architecture
//!
//! - `seedbed-core`: the document store traits the harness is written against
//! - `seedbed-memstore`: the embedded in-memory backend
//! - `seedbed-harness`: [`TestStore`] and [`ResourceInitializer`]

pub use seedbed_core::*;
pub use seedbed_harness::{
    ConsistencyPolicy, HarnessConfig, HarnessError, HarnessResult, HarnessSettings,
    InitializationSummary, LifecycleEvent, LifecycleSink, NoStaleQueriesListener, RecordingSink,
    ResourceInitializer, SeedCollection, TestStore, TestStoreBuilder, TracingSink,
    DEFAULT_SESSION_KEY, DEFAULT_STALE_INDEX_TIMEOUT, SETTINGS_FILE_NAME,
};
pub use seedbed_memstore::{
    forget_server, MemoryConnector, MemorySession, MemoryStore, IDENTITY_COLLECTION, IDENTITY_PREFIX,
};
