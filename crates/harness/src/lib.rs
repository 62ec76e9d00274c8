//! Test harness around a lazily initialized document store.
//!
//! A [`TestStore`] is configured up front (seed data, index descriptors or
//! scan modules, connection settings) and constructs its store on first use:
//!
//! ```ignore
//! use seedbed_harness::{SeedCollection, TestStore};
//!
//! let harness = TestStore::builder()
//!     .catalog(catalog)
//!     .seed_data(vec![SeedCollection::from_entities(&users)?])
//!     .index_descriptors(["Users/Search"])
//!     .build();
//!
//! let session = harness.default_session()?;
//! // ...
//! harness.close()?;
//! ```
//!
//! Construction runs once, under a lock, through [`ResourceInitializer`].
//! Progress is reported as [`LifecycleEvent`]s to a [`LifecycleSink`],
//! `tracing` by default.

#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod harness;
pub mod initializer;
pub mod listener;
pub mod observe;
pub mod settings;

#[cfg(test)]
mod testing;

pub use config::{
    total_entities, ConsistencyPolicy, HarnessConfig, SeedCollection, DEFAULT_STALE_INDEX_TIMEOUT,
};
pub use error::{HarnessError, HarnessResult};
pub use harness::{TestStore, TestStoreBuilder, DEFAULT_SESSION_KEY};
pub use initializer::{InitializationSummary, ResourceInitializer, STALE_INDEX_POLL_INTERVAL};
pub use listener::NoStaleQueriesListener;
pub use observe::{LifecycleEvent, LifecycleSink, RecordingSink, TracingSink};
pub use settings::{HarnessSettings, SETTINGS_FILE_NAME};
